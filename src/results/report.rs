//! Report generation
//!
//! JSON report for downstream tooling and a human console summary.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;

use crate::results::{Results, ScenarioResult};

#[derive(Serialize)]
struct ReportError<'a> {
    message: &'a str,
    code: i32,
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    values: &'a IndexMap<String, String>,
    error: Option<ReportError<'a>>,
}

fn entry(result: &ScenarioResult) -> ReportEntry<'_> {
    ReportEntry {
        values: &result.values,
        error: result.error.as_ref().map(|e| ReportError {
            message: &e.message,
            code: e.kind.exit_code(),
        }),
    }
}

/// Serialize the results as a JSON document keyed by scenario key, in
/// insertion order: `{key: {values: {...}, error: {message, code}|null}}`.
pub fn json_report(results: &Results) -> Result<String> {
    let report: IndexMap<&String, ReportEntry<'_>> =
        results.iter().map(|(key, r)| (key, entry(r))).collect();

    serde_json::to_string_pretty(&report).context("Failed to serialize report")
}

/// Write the JSON report to a file.
pub fn write_report(results: &Results, path: impl AsRef<Path>) -> Result<()> {
    let json = json_report(results)?;
    std::fs::write(path.as_ref(), json).context("Failed to write report file")?;
    Ok(())
}

/// Human-readable run summary for the console.
pub fn summary(results: &Results) -> String {
    let mut output = String::new();

    writeln!(output, "\n{:=^60}", " Scenario Run Report ").unwrap();
    writeln!(output, "Completed: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")).unwrap();
    writeln!(output).unwrap();

    for (_, result) in results.iter() {
        writeln!(output, "  {result}").unwrap();
        for (name, value) in &result.values {
            writeln!(output, "      {name} = {value}").unwrap();
        }
    }

    writeln!(output, "{:-^60}", "").unwrap();
    writeln!(
        output,
        "Total: {} | Failed: {} | Exit: {}",
        results.len(),
        results.errored_count(),
        results.exit_code()
    )
    .unwrap();

    output
}
