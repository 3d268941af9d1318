//! Variable and endpoint resolution
//!
//! Merges global variables, per-scenario definitions and caller overrides
//! into each scenario, exactly once, before it enters the runner.
//!
//! Precedence, highest first:
//! 1. Endpoint: caller override > scenario's own endpoint > global
//!    `endpoint` variable.
//! 2. Profiler environment: caller override only fills the gap when the
//!    scenario declares none.
//! 3. Variables: caller `--variable k=v` overrides win outright and are
//!    inserted as quoted string literals; otherwise scenario-local
//!    definitions win over globals.

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

use crate::scenario::{Scenario, ScenarioSet};

/// Caller-supplied overrides from the CLI surface.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub profiler_env: Option<String>,
    pub variables: Vec<(String, String)>,
}

/// Wrap a caller-supplied value as a single-quoted string literal, so the
/// expression language treats it as a string constant regardless of
/// apparent numeric/boolean shape. Deliberate contract of the CLI surface,
/// never type-coerced.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value)
}

/// Resolves effective variables, endpoint and profiler environment for
/// every scenario in a set.
pub struct VariableResolver {
    globals: IndexMap<String, String>,
    forced: HashSet<String>,
    endpoint: Option<String>,
    profiler_env: Option<String>,
}

impl VariableResolver {
    /// Build a resolver from parser-level globals and caller overrides.
    /// Caller variable overrides are quoted and merged into the globals up
    /// front; they beat scenario-local definitions at resolution time.
    pub fn new(mut globals: IndexMap<String, String>, overrides: Overrides) -> Self {
        let mut forced = HashSet::new();
        for (key, value) in overrides.variables {
            globals.insert(key.clone(), quote_literal(&value));
            forced.insert(key);
        }

        Self {
            globals,
            forced,
            endpoint: overrides.endpoint,
            profiler_env: overrides.profiler_env,
        }
    }

    /// Resolve one scenario, mutating it in place. A second call is a
    /// no-op: precedence is applied exactly once.
    pub fn resolve(&self, scenario: &mut Scenario) {
        if scenario.resolved {
            debug!("Scenario {} already resolved, skipping", scenario.key);
            return;
        }

        // 1. Endpoint: caller > scenario > global `endpoint` variable.
        if let Some(endpoint) = &self.endpoint {
            scenario.endpoint = Some(endpoint.clone());
        } else if scenario.endpoint.is_none() {
            if let Some(endpoint) = self.globals.get("endpoint") {
                scenario.endpoint = Some(strip_quotes(endpoint).to_string());
            }
        }

        // 2. Profiler environment: scenario's own declaration wins.
        if scenario.profiler_env.is_none() {
            scenario.profiler_env = self.profiler_env.clone();
        }

        // 3. Variables: forced overrides always, globals only as defaults.
        for (key, value) in &self.globals {
            if self.forced.contains(key) || !scenario.variables.contains_key(key) {
                scenario.variables.insert(key.clone(), value.clone());
            }
        }

        scenario.resolved = true;
    }

    /// Resolve every scenario in a set.
    pub fn resolve_set(&self, set: &mut ScenarioSet) {
        for scenario in set.iter_mut() {
            self.resolve(scenario);
        }
    }
}
