//! Progress-feedback extension
//!
//! Live scenario/step status on the log stream. Pure observer; never
//! touches control flow.

use std::sync::Mutex;
use tracing::{info, warn};

use crate::extension::Extension;
use crate::http::HttpResponse;
use crate::results::{ScenarioError, ScenarioResult};
use crate::scenario::{Scenario, Step};

#[derive(Default)]
struct Counters {
    started: usize,
    finished: usize,
}

/// Renders run progress as scenarios and steps go by.
#[derive(Default)]
pub struct ProgressExtension {
    total: usize,
    counters: Mutex<Counters>,
}

impl ProgressExtension {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            counters: Mutex::new(Counters::default()),
        }
    }
}

impl Extension for ProgressExtension {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_scenario_start(&self, scenario: &Scenario) {
        let mut counters = self.counters.lock().unwrap();
        counters.started += 1;
        info!(
            "[{}/{}] Running scenario {}",
            counters.started,
            self.total,
            scenario.title()
        );
    }

    fn on_step_before(&self, scenario: &Scenario, step: &Step) -> crate::extension::HookResult {
        info!("  {} > {}", scenario.key, step);
        Ok(())
    }

    fn on_step_after(&self, scenario: &Scenario, step: &Step, response: &HttpResponse) {
        info!(
            "  {} < {} {} [{}ms]",
            scenario.key, step.name, response.status_code, response.duration_ms
        );
    }

    fn on_scenario_end(&self, scenario: &Scenario, result: &ScenarioResult) {
        let mut counters = self.counters.lock().unwrap();
        counters.finished += 1;
        match &result.error {
            None => info!(
                "[{}/{}] Scenario {} passed",
                counters.finished,
                self.total,
                scenario.title()
            ),
            Some(e) => warn!(
                "[{}/{}] Scenario {} failed: {}",
                counters.finished,
                self.total,
                scenario.title(),
                e
            ),
        }
    }

    fn on_error(
        &self,
        scenario: &Scenario,
        error: &ScenarioError,
    ) -> crate::extension::HookResult {
        warn!("  {} ! {}", scenario.key, error);
        Ok(())
    }
}
