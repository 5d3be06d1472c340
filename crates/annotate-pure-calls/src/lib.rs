//! Marks calls that run during module initialization with `/*#__PURE__*/`.
//!
//! Only calls of configured names are considered, and only when the call
//! - is not itself invoked (`f()()`) or part of what is invoked (`(0, f())()`),
//! - is not inside a function that is merely defined rather than invoked on the spot,
//! - has its result assigned, declared or exported by default.
//!
//! Bundlers and minifiers may then drop the call when its result ends up unused.

pub mod ancestry;
pub mod classify;
pub mod config;
pub mod marker;
pub mod transforms;

pub use config::Config;
pub use transforms::annotate_pure_calls::{annotate_program, annotate_pure_calls};
