//! Scenario data model
//!
//! Scenarios, their steps, and the ordered set handed to the player.

#![allow(dead_code)]

mod loader;

pub use loader::{load_file, load_str, LoadError};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One request/assertion/extraction unit inside a scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    /// Human-readable step name, used in logs and trace files
    pub name: String,

    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,

    /// Request URL template; relative paths are joined onto the
    /// scenario's resolved endpoint
    pub url: String,

    /// Request header templates
    #[serde(default)]
    pub headers: IndexMap<String, String>,

    /// Request body template
    #[serde(default)]
    pub body: Option<String>,

    /// Assertion expressions evaluated against the response
    #[serde(default)]
    pub expect: Vec<String>,

    /// Variable extractions: name -> extraction expression
    #[serde(default)]
    pub set: IndexMap<String, String>,

    /// Whether a failed expectation aborts the remaining steps
    #[serde(default = "default_fatal")]
    pub fatal: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_fatal() -> bool {
    true
}

impl Step {
    pub fn new(name: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            url: url.into(),
            headers: IndexMap::new(),
            body: None,
            expect: Vec::new(),
            set: IndexMap::new(),
            fatal: true,
        }
    }

    pub fn get(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, "GET", url)
    }

    pub fn expect(mut self, expr: impl Into<String>) -> Self {
        self.expect.push(expr.into());
        self
    }

    pub fn extract(mut self, var: impl Into<String>, expr: impl Into<String>) -> Self {
        self.set.insert(var.into(), expr.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} {}]", self.name, self.method, self.url)
    }
}

/// One named sequence of steps plus its own variable/endpoint/profiler
/// configuration.
///
/// A scenario is mutated exactly once, by variable resolution, before it
/// enters the runner; it is read-only during execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique key, used as the results map key
    pub key: String,

    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,

    /// Base URL requests are made against; overridable by the caller
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Profiling target id for the profiler-bridge extension
    #[serde(default)]
    pub profiler_env: Option<String>,

    /// Scenario-local variables, insertion order preserved
    #[serde(default)]
    pub variables: IndexMap<String, String>,

    /// Steps in declaration order
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Set once variable/endpoint resolution has run
    #[serde(skip)]
    pub(crate) resolved: bool,
}

impl Scenario {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
            endpoint: None,
            profiler_env: None,
            variables: IndexMap::new(),
            steps: Vec::new(),
            resolved: false,
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn profiler_env(mut self, env: impl Into<String>) -> Self {
        self.profiler_env = Some(env.into());
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Display name, falling back to the key
    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }

    /// Whether variable/endpoint resolution already ran
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} steps)", self.title(), self.steps.len())
    }
}

/// Ordered collection of scenarios with unique keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScenarioSet {
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scenario; returns an error if the key is already taken.
    pub fn push(&mut self, scenario: Scenario) -> Result<(), LoadError> {
        if scenario.key.is_empty() {
            return Err(LoadError::EmptyKey);
        }
        if self.scenarios.iter().any(|s| s.key == scenario.key) {
            return Err(LoadError::DuplicateKey(scenario.key));
        }
        self.scenarios.push(scenario);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Scenario> {
        self.scenarios.iter_mut()
    }

    pub fn get(&self, key: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_builder() {
        let step = Step::get("home", "/")
            .expect("status == 200")
            .extract("title", "regex(\"<title>(.*)</title>\")")
            .header("Accept", "text/html");

        assert_eq!(step.method, "GET");
        assert_eq!(step.expect.len(), 1);
        assert_eq!(step.set.len(), 1);
        assert!(step.fatal);
    }

    #[test]
    fn scenario_title_falls_back_to_key() {
        let scenario = Scenario::new("checkout");
        assert_eq!(scenario.title(), "checkout");

        let mut named = Scenario::new("checkout");
        named.name = Some("Checkout flow".to_string());
        assert_eq!(named.title(), "Checkout flow");
    }

    #[test]
    fn set_rejects_duplicate_keys() {
        let mut set = ScenarioSet::new();
        set.push(Scenario::new("a")).unwrap();
        let err = set.push(Scenario::new("a")).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateKey(k) if k == "a"));
    }

    #[test]
    fn set_preserves_insertion_order() {
        let mut set = ScenarioSet::new();
        for key in ["c", "a", "b"] {
            set.push(Scenario::new(key)).unwrap();
        }
        let keys: Vec<_> = set.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }
}
