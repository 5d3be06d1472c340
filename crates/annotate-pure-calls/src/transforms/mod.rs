pub mod annotate_pure_calls;
