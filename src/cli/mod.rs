//! CLI argument parsing
//!
//! Defines the command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Declarative HTTP scenario player
#[derive(Parser, Debug)]
#[command(name = "webplay")]
#[command(version)]
#[command(about = "Play declarative HTTP scenarios with assertions and extractions")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scenarios in a file
    Run(RunArgs),

    /// List the scenarios in a file without running them
    List(ListArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario file to play
    pub file: PathBuf,

    /// Override the base endpoint for every scenario
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Override a variable (repeatable); values are injected as string
    /// literals
    #[arg(long = "variable", value_name = "KEY=VALUE")]
    pub variables: Vec<String>,

    /// Number of concurrent clients (scenarios beyond this queue)
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// Profiler environment for scenarios that do not declare one
    #[arg(long)]
    pub profiler_env: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Print a JSON report to stdout instead of the text summary
    #[arg(long)]
    pub json: bool,

    /// Write the JSON report to a file
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Persist per-step request/response snapshots under this directory
    #[arg(long, value_name = "DIR")]
    pub trace_dir: Option<PathBuf>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Scenario file to inspect
    pub file: PathBuf,

    /// Show steps for each scenario
    #[arg(short, long)]
    pub detailed: bool,
}

/// Split a `KEY=VALUE` override into its parts.
pub fn parse_variable(raw: &str) -> anyhow::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => anyhow::bail!("invalid variable override {raw:?}, expected KEY=VALUE"),
    }
}
