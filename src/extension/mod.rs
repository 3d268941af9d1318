//! Lifecycle extension pipeline
//!
//! An ordered chain of observers/interceptors invoked around scenario and
//! step boundaries. Before-style hooks run highest priority first,
//! after/end-style hooks run lowest priority first, so a high-priority
//! extension wraps all lower-priority ones (enter first, exit last).

#![allow(dead_code)]

mod profiler;
mod progress;
mod tracer;

pub use profiler::{ProfilerExtension, ProfilerSignal, SignalSink, TracingSink};
pub use progress::ProgressExtension;
pub use tracer::TracerExtension;

use std::sync::Arc;
use thiserror::Error;

use crate::http::HttpResponse;
use crate::results::{ScenarioError, ScenarioResult};
use crate::scenario::{Scenario, Step};

/// Abort signal raised by an extension; converted to a fatal result for
/// the current scenario only.
#[derive(Error, Debug, Clone)]
#[error("aborted by extension: {reason}")]
pub struct Abort {
    pub reason: String,
}

impl Abort {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type HookResult = Result<(), Abort>;

/// A lifecycle observer/interceptor.
///
/// Hooks take `&self`; extensions keep whatever internal state they need
/// behind their own interior mutability. The pipeline guarantees delivery
/// order, nothing about extension state.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn on_scenario_start(&self, _scenario: &Scenario) {}

    /// May abort, skipping remaining extensions and the step itself.
    fn on_step_before(&self, _scenario: &Scenario, _step: &Step) -> HookResult {
        Ok(())
    }

    fn on_step_after(&self, _scenario: &Scenario, _step: &Step, _response: &HttpResponse) {}

    fn on_scenario_end(&self, _scenario: &Scenario, _result: &ScenarioResult) {}

    /// Observes the terminal error; may abort, upgrading it to fatal.
    fn on_error(&self, _scenario: &Scenario, _error: &ScenarioError) -> HookResult {
        Ok(())
    }
}

struct Registered {
    priority: i32,
    extension: Arc<dyn Extension>,
}

/// Ordered chain of extensions.
///
/// Held sorted by priority, descending; registration order breaks ties.
/// Forward traversal serves before-hooks, reverse traversal serves
/// after/end-hooks.
#[derive(Default)]
pub struct ExtensionPipeline {
    registered: Vec<Registered>,
}

impl ExtensionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension. Higher priority runs earlier on before-hooks
    /// and later on after-hooks.
    pub fn register(&mut self, priority: i32, extension: Arc<dyn Extension>) {
        self.registered.push(Registered {
            priority,
            extension,
        });
        // Stable sort keeps registration order among equal priorities.
        self.registered.sort_by_key(|r| std::cmp::Reverse(r.priority));
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    pub fn scenario_start(&self, scenario: &Scenario) {
        for r in &self.registered {
            r.extension.on_scenario_start(scenario);
        }
    }

    /// First abort wins; remaining extensions are skipped.
    pub fn step_before(&self, scenario: &Scenario, step: &Step) -> HookResult {
        for r in &self.registered {
            r.extension.on_step_before(scenario, step)?;
        }
        Ok(())
    }

    pub fn step_after(&self, scenario: &Scenario, step: &Step, response: &HttpResponse) {
        for r in self.registered.iter().rev() {
            r.extension.on_step_after(scenario, step, response);
        }
    }

    pub fn scenario_end(&self, scenario: &Scenario, result: &ScenarioResult) {
        for r in self.registered.iter().rev() {
            r.extension.on_scenario_end(scenario, result);
        }
    }

    pub fn error(&self, scenario: &Scenario, error: &ScenarioError) -> HookResult {
        for r in &self.registered {
            r.extension.on_error(scenario, error)?;
        }
        Ok(())
    }
}
