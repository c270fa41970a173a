//! Top-level application orchestration.
//!
//! `src/main.rs` only initialises tracing and maps errors to exit codes; this
//! module is the "real main" that:
//! - parses CLI arguments
//! - resolves the run environment
//! - reads and validates the parameter grid
//! - runs the selected pipeline (or a dry run)
//! - prints the summary and writes the optional JSON report

use std::num::NonZeroUsize;
use std::path::Path;

use chrono::Local;
use clap::Parser;

use crate::cli::{BracketArgs, Cli, Command, RunArgs};
use crate::config::{reference_grid_from_env, RunEnv};
use crate::domain::Pipeline;
use crate::error::{AppError, EXIT_ABORTED};
use crate::exec::SystemRunner;
use crate::grid::{read_grid, GridFile};

pub mod pipeline;

use pipeline::PipelineOptions;

/// Entry point for the `tsgrid` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let env_file = cli.env_file.as_deref();

    match cli.command {
        Command::Interpolate(args) => handle_run(env_file, Pipeline::Interpolate, &args),
        Command::Synth(args) => handle_run(env_file, Pipeline::Synthesize, &args),
        Command::Bracket(args) => handle_bracket(env_file, &args),
    }
}

fn handle_run(env_file: Option<&Path>, pipeline: Pipeline, args: &RunArgs) -> Result<(), AppError> {
    let env = RunEnv::from_env(env_file)?;
    let grid = load_grid(&args.grid)?;
    let options = PipelineOptions {
        pipeline,
        policy: args.on_failure.unwrap_or_else(|| pipeline.default_policy()),
        workers: worker_count(args.jobs),
        force: args.force,
    };

    println!("{}", crate::report::format_run_header(&options, &args.grid, &grid, &env));
    let jobs = pipeline::jobs(&env, &grid.rows, pipeline);

    if args.dry_run {
        let planned = pipeline::plan(&env, &jobs, options);
        println!("{}", crate::report::format_plan(&planned));
        return Ok(());
    }

    let started_at = Local::now();
    tracing::info!(pipeline = pipeline.tag(), rows = jobs.len(), workers = options.workers, "run started");
    let report = pipeline::run_pipeline(&env, &jobs, options, &SystemRunner)?;
    tracing::info!(elapsed_secs = report.elapsed_secs, aborted = report.aborted, "run finished");

    println!("{}", crate::report::format_summary(&jobs, &report, &env));

    if let Some(path) = &args.summary_json {
        let summary = crate::io::RunSummary::new(started_at, &options, &args.grid, &jobs, &report);
        crate::io::write_summary_json(path, &summary)?;
    }

    if report.aborted {
        return Err(AppError::new(
            EXIT_ABORTED,
            format!(
                "Run aborted after a failed job; see logs in {}",
                env.dirs.logs.display()
            ),
        ));
    }
    Ok(())
}

fn handle_bracket(env_file: Option<&Path>, args: &BracketArgs) -> Result<(), AppError> {
    let reference = reference_grid_from_env(env_file)?;
    let grid = load_grid(&args.grid)?;
    print!("{}", crate::report::format_brackets(&grid.rows, &reference));
    Ok(())
}

fn load_grid(path: &Path) -> Result<GridFile, AppError> {
    let grid = read_grid(path)?;
    for (dropped, kept) in &grid.duplicates {
        tracing::warn!(line = dropped, duplicate_of = kept, "dropping duplicate grid row");
    }
    Ok(grid)
}

/// `--jobs`, else the host's logical CPU count.
fn worker_count(jobs: Option<u16>) -> usize {
    match jobs {
        Some(n) => usize::from(n).max(1),
        None => std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1),
    }
}
