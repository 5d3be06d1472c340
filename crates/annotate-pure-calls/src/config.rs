use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use swc_core::atoms::Atom;

/// Options of the pure call annotator.
///
/// Unknown keys are ignored so the options object of a host plugin can be
/// passed through unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Names of the functions and constructors whose calls may be annotated.
    pub annotate_calls: Vec<String>,
}

impl Config {
    pub fn new<I, S>(annotate_calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Config {
            annotate_calls: annotate_calls.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse annotate-pure-calls options")
    }

    pub(crate) fn eligible_callees(&self) -> FxHashSet<Atom> {
        self.annotate_calls
            .iter()
            .map(|name| Atom::from(name.as_str()))
            .collect()
    }
}
