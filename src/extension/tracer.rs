//! Tracer extension
//!
//! Persists a JSON snapshot of every request/response exchange under a
//! target directory, one file per step, for post-mortem debugging.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::extension::Extension;
use crate::http::HttpResponse;
use crate::scenario::{Scenario, Step};

#[derive(Serialize)]
struct StepSnapshot<'a> {
    scenario: &'a str,
    step: &'a str,
    method: &'a str,
    url: &'a str,
    recorded_at: String,
    response: &'a HttpResponse,
}

/// Writes `<dir>/<scenario-key>/<nn>-<step>.json` per executed step.
pub struct TracerExtension {
    dir: PathBuf,
    // Step counters per scenario key; hooks take &self
    counters: Mutex<std::collections::HashMap<String, usize>>,
}

impl TracerExtension {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counters: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn snapshot_path(&self, scenario: &Scenario, step: &Step) -> PathBuf {
        let mut counters = self.counters.lock().unwrap();
        let counter = counters.entry(scenario.key.clone()).or_insert(0);
        *counter += 1;

        let safe_step: String = step
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();

        self.dir
            .join(&scenario.key)
            .join(format!("{:02}-{}.json", counter, safe_step))
    }
}

impl Extension for TracerExtension {
    fn name(&self) -> &str {
        "tracer"
    }

    fn on_step_after(&self, scenario: &Scenario, step: &Step, response: &HttpResponse) {
        let path = self.snapshot_path(scenario, step);

        let snapshot = StepSnapshot {
            scenario: &scenario.key,
            step: &step.name,
            method: &step.method,
            url: &step.url,
            recorded_at: Utc::now().to_rfc3339(),
            response,
        };

        // Tracing is best-effort; a failed write never disturbs the run.
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create trace directory: {e}");
                return;
            }
        }

        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&path, bytes) {
                    warn!("Failed to write trace snapshot: {e}");
                }
            }
            Err(e) => warn!("Failed to serialize trace snapshot: {e}"),
        }
    }
}
