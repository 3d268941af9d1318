//! Scenario file loading
//!
//! Reads a YAML scenario document into a [`ScenarioSet`] plus the globally
//! declared variables.

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::scenario::{Scenario, ScenarioSet};

/// Scenario loading errors
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate scenario key: {0}")]
    DuplicateKey(String),

    #[error("scenario key must not be empty")]
    EmptyKey,
}

/// Top-level shape of a scenario document.
#[derive(Debug, Deserialize)]
struct Document {
    /// Globally declared variables, applied to every scenario that does
    /// not define the same name itself
    #[serde(default)]
    variables: IndexMap<String, String>,

    #[serde(default)]
    scenarios: Vec<Scenario>,
}

/// Load scenarios and global variables from a YAML string.
pub fn load_str(source: &str) -> Result<(ScenarioSet, IndexMap<String, String>), LoadError> {
    let doc: Document = serde_yaml::from_str(source)?;

    let mut set = ScenarioSet::new();
    for scenario in doc.scenarios {
        set.push(scenario)?;
    }

    debug!(
        "Loaded {} scenarios, {} global variables",
        set.len(),
        doc.variables.len()
    );

    Ok((set, doc.variables))
}

/// Load scenarios and global variables from a file path.
pub fn load_file(
    path: impl AsRef<Path>,
) -> Result<(ScenarioSet, IndexMap<String, String>), LoadError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    load_str(&content)
}
