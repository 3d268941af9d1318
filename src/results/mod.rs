//! Scenario outcomes
//!
//! Per-scenario results, the ordered error taxonomy, and the keyed
//! aggregate whose severity predicates drive the process exit code.

#![allow(dead_code)]

mod report;

pub use report::{json_report, summary, write_report};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error classification, ordered by severity.
///
/// The aggregate severity is a `max` reduction over all results, so the
/// ordering here is contractual: fatal dominates expectation dominates
/// non-fatal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Any other error (extraction failure, malformed expression);
    /// recorded without necessarily aborting
    NonFatal,
    /// A step assertion failed
    Expectation,
    /// Transport failure or extension-triggered abort; terminates the
    /// owning scenario only
    Fatal,
}

impl ErrorKind {
    /// Exit code the caller maps this severity to.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Fatal => 65,
            ErrorKind::Expectation => 64,
            ErrorKind::NonFatal => 66,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Fatal => write!(f, "fatal"),
            ErrorKind::Expectation => write!(f, "expectation"),
            ErrorKind::NonFatal => write!(f, "error"),
        }
    }
}

/// Terminal error of one scenario run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ScenarioError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn expectation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Expectation,
            message: message.into(),
        }
    }

    pub fn non_fatal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NonFatal,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Immutable outcome of one scenario run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Key of the originating scenario
    pub key: String,

    /// Extracted variables, in extraction order
    pub values: IndexMap<String, String>,

    /// Terminal error, if any
    pub error: Option<ScenarioError>,
}

impl ScenarioResult {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: IndexMap::new(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: ScenarioError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }

    pub fn severity(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "✓ {}", self.key),
            Some(e) => write!(f, "✗ {} - {}", self.key, e),
        }
    }
}

/// Keyed, insertion-ordered collection of scenario results.
///
/// Exactly one entry per scenario in the originating set; insertion order
/// matches set iteration order, not completion order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Results {
    entries: IndexMap<String, ScenarioResult>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: ScenarioResult) {
        self.entries.insert(result.key.clone(), result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ScenarioResult> {
        self.entries.get(key)
    }

    /// (key, result) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScenarioResult)> {
        self.entries.iter()
    }

    /// Worst severity across all results.
    pub fn severity(&self) -> Option<ErrorKind> {
        self.entries.values().filter_map(|r| r.severity()).max()
    }

    /// Any result carries a fatal-class error. Highest severity.
    pub fn is_fatal_error(&self) -> bool {
        self.entries
            .values()
            .any(|r| r.severity() == Some(ErrorKind::Fatal))
    }

    /// Any result carries an expectation-class error.
    pub fn is_expectation_error(&self) -> bool {
        self.entries
            .values()
            .any(|r| r.severity() == Some(ErrorKind::Expectation))
    }

    /// Any result carries any error at all. Lowest severity that still
    /// indicates failure.
    pub fn is_errored(&self) -> bool {
        self.entries.values().any(|r| r.is_errored())
    }

    /// Process exit code: fatal 65 > expectation 64 > errored 66 > 0.
    pub fn exit_code(&self) -> i32 {
        self.severity().map_or(0, ErrorKind::exit_code)
    }

    pub fn errored_count(&self) -> usize {
        self.entries.values().filter(|r| r.is_errored()).count()
    }
}
