//! webplay - declarative HTTP scenario player
//!
//! Executes multi-step web-interaction scenarios (request sequences with
//! assertions and variable extraction) against a target endpoint, in
//! parallel across a bounded pool of client sessions, and derives the
//! process exit code from the worst per-scenario outcome.
//!
//! ## Usage
//!
//! ```bash
//! # Play a scenario file sequentially
//! webplay run scenarios.yaml
//!
//! # Override the endpoint and a variable, four clients in parallel
//! webplay run scenarios.yaml --endpoint http://staging.local \
//!     --variable user=bob --concurrency 4
//!
//! # JSON report plus per-step trace snapshots
//! webplay run scenarios.yaml --json --trace-dir ./traces
//!
//! # Inspect a file without running it
//! webplay list scenarios.yaml --detailed
//! ```
//!
//! Exit codes: 0 success, 64 expectation failure, 65 fatal error,
//! 66 other scenario error (fatal dominates).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

mod cli;
mod expr;
mod extension;
mod http;
mod player;
mod results;
mod runner;
mod scenario;
mod utils;
mod vars;

use cli::{Args, Command, ListArgs, RunArgs};
use extension::{ExtensionPipeline, ProfilerExtension, ProgressExtension, TracerExtension};
use http::ClientPool;
use player::Player;
use vars::{Overrides, VariableResolver};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::init_logger(args.verbose);

    match args.command {
        Command::Run(run_args) => {
            let code = run_scenarios(run_args).await?;
            std::process::exit(code);
        }
        Command::List(list_args) => list_scenarios(list_args),
    }
}

/// Load, resolve and play a scenario file; returns the exit code derived
/// from the aggregated results.
async fn run_scenarios(args: RunArgs) -> Result<i32> {
    let (mut set, globals) = scenario::load_file(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    if set.is_empty() {
        warn!("No scenarios found in {}", args.file.display());
        return Ok(0);
    }

    let mut variables = Vec::new();
    for raw in &args.variables {
        variables.push(cli::parse_variable(raw)?);
    }

    let resolver = VariableResolver::new(
        globals,
        Overrides {
            endpoint: args.endpoint.clone(),
            profiler_env: args.profiler_env.clone(),
            variables,
        },
    );
    resolver.resolve_set(&mut set);

    let mut pipeline = ExtensionPipeline::new();
    pipeline.register(100, Arc::new(ProfilerExtension::default()));
    pipeline.register(50, Arc::new(ProgressExtension::new(set.len())));
    if let Some(dir) = &args.trace_dir {
        pipeline.register(10, Arc::new(TracerExtension::new(dir.clone())));
    }

    let pool = ClientPool::new(args.concurrency, args.timeout)?;
    let player = Player::new(pool, pipeline);

    let results = player.run(&set).await;

    if let Some(path) = &args.output {
        results::write_report(&results, path)?;
    }
    if args.json {
        println!("{}", results::json_report(&results)?);
    } else {
        print!("{}", results::summary(&results));
    }

    Ok(results.exit_code())
}

/// Print the scenarios in a file without running them.
fn list_scenarios(args: ListArgs) -> Result<()> {
    let (set, globals) = scenario::load_file(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    println!("{} scenarios, {} global variables", set.len(), globals.len());

    for scenario in set.iter() {
        println!("  {scenario}");
        if args.detailed {
            for step in &scenario.steps {
                println!("    - {step}");
            }
        }
    }

    Ok(())
}
