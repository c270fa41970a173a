//! Command-line parsing for the grid orchestrator.
//!
//! Parsing and dispatch are kept apart: this module only describes the
//! arguments, `app` turns them into runs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::FailurePolicy;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "tsgrid",
    version,
    about = "Grid-driven model interpolation and spectral synthesis"
)]
pub struct Cli {
    /// Dotenv file to load before reading the environment (default: ./.env).
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ensure every row's model atmosphere exists, interpolating missing ones.
    ///
    /// Stops dispatching at the first failure unless `--on-failure continue`.
    Interpolate(RunArgs),
    /// Synthesize a spectrum for every row, interpolating models as needed.
    ///
    /// Rows whose spectrum already exists are skipped. Failed rows are
    /// recorded and the grid continues unless `--on-failure abort`.
    Synth(RunArgs),
    /// Print the reference brackets and the eight corner models for every row.
    Bracket(BracketArgs),
}

/// Options shared by the pipelines.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Parameter grid CSV.
    #[arg(long, value_name = "CSV")]
    pub grid: PathBuf,

    /// Failure policy (default depends on the pipeline).
    #[arg(long = "on-failure", value_enum)]
    pub on_failure: Option<FailurePolicy>,

    /// Maximum concurrent jobs (default: logical CPU count).
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Write a JSON run summary.
    #[arg(long = "summary-json", value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Plan only: report what would be skipped or dispatched, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Rebuild targets that already exist (interpolated models or spectra).
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args, Clone)]
pub struct BracketArgs {
    /// Parameter grid CSV.
    #[arg(long, value_name = "CSV")]
    pub grid: PathBuf,
}
