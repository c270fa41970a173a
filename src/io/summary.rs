//! JSON run summary (`--summary-json`).
//!
//! One object per run: when and how it ran, aggregate counts, and one entry
//! per grid row with its target, log file and terminal status.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::app::pipeline::{Job, PipelineOptions};
use crate::domain::{FailurePolicy, Pipeline};
use crate::error::AppError;
use crate::scheduler::{RowStatus, RunReport, StatusCounts};

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tool: String,
    pub started_at: DateTime<Local>,
    pub pipeline: Pipeline,
    pub policy: FailurePolicy,
    pub grid: PathBuf,
    pub workers: usize,
    pub peak_in_flight: usize,
    pub elapsed_secs: f64,
    pub aborted: bool,
    pub counts: StatusCounts,
    pub rows: Vec<RowSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowSummary {
    pub line: usize,
    pub grid_version: Option<String>,
    pub target: PathBuf,
    pub log: PathBuf,
    #[serde(flatten)]
    pub status: RowStatus,
}

impl RunSummary {
    pub fn new(
        started_at: DateTime<Local>,
        options: &PipelineOptions,
        grid: &Path,
        jobs: &[Job<'_>],
        report: &RunReport,
    ) -> Self {
        let rows = jobs
            .iter()
            .zip(&report.outcomes)
            .map(|(job, status)| RowSummary {
                line: job.row.line,
                grid_version: job.row.grid_version.clone(),
                target: job.paths.target(options.pipeline).to_path_buf(),
                log: job.paths.log.clone(),
                status: status.clone(),
            })
            .collect();

        Self {
            tool: "tsgrid".to_string(),
            started_at,
            pipeline: options.pipeline,
            policy: report.policy,
            grid: grid.to_path_buf(),
            workers: report.workers,
            peak_in_flight: report.peak_in_flight,
            elapsed_secs: report.elapsed_secs,
            aborted: report.aborted,
            counts: report.counts(),
            rows,
        }
    }
}

/// Write a run summary JSON file.
pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::config(format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}
