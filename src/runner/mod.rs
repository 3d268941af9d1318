//! Scenario runner
//!
//! Executes one scenario's steps against one client handle: substitutes
//! live variables into the request template, invokes the extension
//! pipeline around each boundary, evaluates assertions and extractions,
//! and classifies the terminal error.

use indexmap::IndexMap;
use tracing::{debug, error};

use crate::expr;
use crate::extension::ExtensionPipeline;
use crate::http::{ClientHandle, HttpRequest};
use crate::results::{ScenarioError, ScenarioResult};
use crate::scenario::{Scenario, Step};

/// Drives one scenario on one handle. Scenarios must be resolved before
/// they get here; the runner never re-resolves.
pub struct ScenarioRunner<'a> {
    pipeline: &'a ExtensionPipeline,
}

/// Outcome of one step, steering the step loop.
enum StepOutcome {
    Continue,
    AbortScenario,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(pipeline: &'a ExtensionPipeline) -> Self {
        Self { pipeline }
    }

    /// Run all steps in declaration order; errors land in the result,
    /// never escape.
    pub async fn run(&self, scenario: &Scenario, client: &ClientHandle) -> ScenarioResult {
        debug!("Running scenario {}", scenario.key);
        self.pipeline.scenario_start(scenario);

        let mut vars = scenario.variables.clone();
        let mut values = IndexMap::new();
        let mut terminal: Option<ScenarioError> = None;

        for step in &scenario.steps {
            let outcome = self
                .run_step(scenario, step, client, &mut vars, &mut values, &mut terminal)
                .await;
            if matches!(outcome, StepOutcome::AbortScenario) {
                break;
            }
        }

        if let Some(err) = &terminal {
            error!("Scenario {} failed: {}", scenario.key, err);
            if let Err(abort) = self.pipeline.error(scenario, err) {
                // An abort raised while handling the error upgrades it to
                // fatal without re-entering the pipeline.
                terminal = Some(ScenarioError::fatal(abort.to_string()));
            }
        }

        let mut result = ScenarioResult::new(&scenario.key);
        result.values = values;
        result.error = terminal;

        self.pipeline.scenario_end(scenario, &result);
        result
    }

    async fn run_step(
        &self,
        scenario: &Scenario,
        step: &Step,
        client: &ClientHandle,
        vars: &mut IndexMap<String, String>,
        values: &mut IndexMap<String, String>,
        terminal: &mut Option<ScenarioError>,
    ) -> StepOutcome {
        let request = match build_request(scenario, step, vars) {
            Ok(request) => request,
            Err(e) => {
                // A step whose request cannot be built cannot run; record
                // and stop this scenario.
                record(terminal, ScenarioError::non_fatal(format!("step {step}: {e}")));
                return StepOutcome::AbortScenario;
            }
        };

        if let Err(abort) = self.pipeline.step_before(scenario, step) {
            record(terminal, ScenarioError::fatal(abort.to_string()));
            return StepOutcome::AbortScenario;
        }

        let response = match client.send(request).await {
            Ok(response) => response,
            Err(e) => {
                record(terminal, ScenarioError::fatal(format!("step {step}: {e}")));
                return StepOutcome::AbortScenario;
            }
        };

        self.pipeline.step_after(scenario, step, &response);

        for expectation in &step.expect {
            match expr::evaluate(expectation, &response, vars) {
                Ok(true) => {}
                Ok(false) => {
                    record(
                        terminal,
                        ScenarioError::expectation(format!(
                            "step {step}: expectation failed: {expectation} (status {})",
                            response.status_code
                        )),
                    );
                    // A failed expectation skips this step's extractions;
                    // step fatality decides whether the scenario goes on.
                    return if step.fatal {
                        StepOutcome::AbortScenario
                    } else {
                        StepOutcome::Continue
                    };
                }
                Err(e) => {
                    record(terminal, ScenarioError::non_fatal(format!("step {step}: {e}")));
                    return if step.fatal {
                        StepOutcome::AbortScenario
                    } else {
                        StepOutcome::Continue
                    };
                }
            }
        }

        for (name, extraction) in &step.set {
            match expr::extract(extraction, &response, vars) {
                Ok(value) => {
                    debug!("Extracted {name} = {value}");
                    vars.insert(name.clone(), value.clone());
                    values.insert(name.clone(), value);
                }
                Err(e) => {
                    record(
                        terminal,
                        ScenarioError::non_fatal(format!("step {step}: extracting {name}: {e}")),
                    );
                }
            }
        }

        StepOutcome::Continue
    }
}

/// Keep the worst error as the terminal one.
fn record(terminal: &mut Option<ScenarioError>, error: ScenarioError) {
    match terminal {
        Some(existing) if existing.kind >= error.kind => {}
        _ => *terminal = Some(error),
    }
}

/// Substitute live variables into the step template and join relative
/// URLs onto the scenario's resolved endpoint.
fn build_request(
    scenario: &Scenario,
    step: &Step,
    vars: &IndexMap<String, String>,
) -> Result<HttpRequest, expr::ExprError> {
    let path = expr::substitute(&step.url, vars)?;

    let url = if path.starts_with("http://") || path.starts_with("https://") {
        path
    } else {
        match &scenario.endpoint {
            Some(endpoint) => format!("{}{}", endpoint.trim_end_matches('/'), path),
            None => path,
        }
    };

    let mut request = HttpRequest::new(step.method.clone(), url);

    for (key, value) in &step.headers {
        request = request.header(key.clone(), expr::substitute(value, vars)?);
    }

    if let Some(body) = &step.body {
        request = request.body(expr::substitute(body, vars)?);
    }

    Ok(request)
}
