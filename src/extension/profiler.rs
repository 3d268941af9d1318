//! Profiler-bridge extension
//!
//! Wraps scenario execution with start/stop signals to an external
//! profiling service, keyed by the scenario's resolved profiler
//! environment. Scenarios without an environment are left alone.

use std::sync::Arc;
use tracing::info;

use crate::extension::Extension;
use crate::results::ScenarioResult;
use crate::scenario::Scenario;

/// A signal emitted to the profiling service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfilerSignal {
    Start { scenario: String, env: String },
    Stop { scenario: String, env: String },
}

/// Receives profiler signals. The default sink logs them; tests record
/// them.
pub trait SignalSink: Send + Sync {
    fn emit(&self, signal: ProfilerSignal);
}

/// Sink that forwards signals to the log stream.
#[derive(Default)]
pub struct TracingSink;

impl SignalSink for TracingSink {
    fn emit(&self, signal: ProfilerSignal) {
        match signal {
            ProfilerSignal::Start { scenario, env } => {
                info!("Profiling started for {scenario} (env {env})");
            }
            ProfilerSignal::Stop { scenario, env } => {
                info!("Profiling stopped for {scenario} (env {env})");
            }
        }
    }
}

/// Pipeline member bridging scenario boundaries to a profiling service.
pub struct ProfilerExtension {
    sink: Arc<dyn SignalSink>,
}

impl ProfilerExtension {
    pub fn new(sink: Arc<dyn SignalSink>) -> Self {
        Self { sink }
    }
}

impl Default for ProfilerExtension {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl Extension for ProfilerExtension {
    fn name(&self) -> &str {
        "profiler"
    }

    fn on_scenario_start(&self, scenario: &Scenario) {
        if let Some(env) = &scenario.profiler_env {
            self.sink.emit(ProfilerSignal::Start {
                scenario: scenario.key.clone(),
                env: env.clone(),
            });
        }
    }

    fn on_scenario_end(&self, scenario: &Scenario, _result: &ScenarioResult) {
        if let Some(env) = &scenario.profiler_env {
            self.sink.emit(ProfilerSignal::Stop {
                scenario: scenario.key.clone(),
                env: env.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ScenarioResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        signals: Mutex<Vec<ProfilerSignal>>,
    }

    impl SignalSink for RecordingSink {
        fn emit(&self, signal: ProfilerSignal) {
            self.signals.lock().unwrap().push(signal);
        }
    }

    #[test]
    fn emits_start_and_stop_for_profiled_scenarios() {
        let sink = Arc::new(RecordingSink::default());
        let ext = ProfilerExtension::new(sink.clone());

        let scenario = Scenario::new("checkout").profiler_env("staging");
        let result = ScenarioResult::new("checkout");

        ext.on_scenario_start(&scenario);
        ext.on_scenario_end(&scenario, &result);

        let signals = sink.signals.lock().unwrap();
        assert_eq!(
            *signals,
            vec![
                ProfilerSignal::Start {
                    scenario: "checkout".to_string(),
                    env: "staging".to_string()
                },
                ProfilerSignal::Stop {
                    scenario: "checkout".to_string(),
                    env: "staging".to_string()
                },
            ]
        );
    }

    #[test]
    fn silent_without_environment() {
        let sink = Arc::new(RecordingSink::default());
        let ext = ProfilerExtension::new(sink.clone());

        let scenario = Scenario::new("plain");
        ext.on_scenario_start(&scenario);
        ext.on_scenario_end(&scenario, &ScenarioResult::new("plain"));

        assert!(sink.signals.lock().unwrap().is_empty());
    }
}
