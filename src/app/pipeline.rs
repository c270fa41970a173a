//! Shared pipeline logic used by the `interpolate` and `synth` commands.
//!
//! grid rows -> job paths -> skip rule -> bounded dispatch -> per-job stages
//!
//! Keeping this apart from `app` lets integration tests drive a full run with
//! a substitute `ProcessRunner` and no CLI parsing.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::RunEnv;
use crate::domain::{FailurePolicy, ParameterGridRow, Pipeline};
use crate::error::{AppError, JobError};
use crate::exec::{ArtifactClaims, ProcessRunner};
use crate::joblog::JobLog;
use crate::protocol::model_file_is_marcs;
use crate::scheduler::{run_grid, RunReport, SchedulerConfig};
use crate::stages::{corner_paths, ensure_model, synthesize, JobContext, JobPaths, ModelSource};

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub pipeline: Pipeline,
    pub policy: FailurePolicy,
    pub workers: usize,
    /// Ignore the skip rule for the pipeline's target artifact.
    pub force: bool,
}

/// One schedulable row.
#[derive(Debug, Clone)]
pub struct Job<'a> {
    pub row: &'a ParameterGridRow,
    pub paths: JobPaths,
}

pub fn jobs<'a>(env: &RunEnv, rows: &'a [ParameterGridRow], pipeline: Pipeline) -> Vec<Job<'a>> {
    rows.iter()
        .map(|row| Job {
            row,
            paths: JobPaths::new(env, row, pipeline),
        })
        .collect()
}

/// Execute a pipeline over `jobs`.
pub fn run_pipeline(
    env: &RunEnv,
    jobs: &[Job<'_>],
    options: PipelineOptions,
    runner: &dyn ProcessRunner,
) -> Result<RunReport, AppError> {
    let claims = ArtifactClaims::new();
    let ctx = JobContext {
        env,
        runner,
        claims: &claims,
    };
    let pipeline = options.pipeline;
    let force = options.force;

    run_grid(
        jobs,
        SchedulerConfig {
            workers: options.workers,
            policy: options.policy,
        },
        |_, job| !options.force && is_complete(pipeline, job),
        |_, job| run_job(&ctx, pipeline, force, job),
    )
}

/// Skip rule: the target exists. Logged to the console and the job log.
fn is_complete(pipeline: Pipeline, job: &Job<'_>) -> bool {
    let target = job.paths.target(pipeline);
    if !target.exists() {
        return false;
    }
    tracing::info!(line = job.row.line, target = %target.display(), "skipping, output exists");
    match JobLog::open(&job.paths.log) {
        Ok(mut log) => log.info(format!("skipping: {} exists", target.display())),
        Err(e) => tracing::warn!(log = %job.paths.log.display(), error = %e, "cannot open job log"),
    }
    true
}

/// Run one job and always leave a terminal line in its log.
///
/// `force` rebuilds the pipeline's target artifact even when it exists.
pub fn run_job(ctx: &JobContext<'_>, pipeline: Pipeline, force: bool, job: &Job<'_>) -> Result<(), JobError> {
    let mut log = JobLog::open(&job.paths.log)
        .map_err(|e| JobError::io(format!("opening job log {}", job.paths.log.display()), e))?;
    let target = job.paths.target(pipeline);
    log.info(format!(
        "job start: {} pipeline, grid line {}, target {}",
        pipeline.tag(),
        job.row.line,
        target.display()
    ));

    let result = run_stages(ctx, pipeline, force, job, &mut log);
    match &result {
        Ok(()) => {
            log.info(format!("job succeeded: {}", target.display()));
            tracing::info!(line = job.row.line, target = %target.display(), "done");
        }
        Err(err) => {
            log.error(format!("job failed ({}): {err}", err.kind()));
            tracing::error!(
                line = job.row.line,
                log = %job.paths.log.display(),
                "failed: {err}"
            );
        }
    }
    result
}

fn run_stages(
    ctx: &JobContext<'_>,
    pipeline: Pipeline,
    force: bool,
    job: &Job<'_>,
    log: &mut JobLog,
) -> Result<(), JobError> {
    let modes = job.row.modes()?;
    let rebuild_model = force && pipeline == Pipeline::Interpolate;
    let source = ensure_model(ctx, job.row, modes, &job.paths, rebuild_model, log)?;
    if source == ModelSource::Interpolated {
        log.info(format!("model ready: {}", job.paths.model.display()));
    }
    match pipeline {
        Pipeline::Interpolate => Ok(()),
        Pipeline::Synthesize => synthesize(ctx, job.row, modes, &job.paths, force, log),
    }
}

/// What a dry run reports for one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    Skip,
    /// The model exists; only the pipeline's own stages would run.
    Run,
    Interpolate { missing_corners: Vec<PathBuf> },
    Invalid { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedRow {
    pub line: usize,
    pub target: PathBuf,
    #[serde(flatten)]
    pub action: PlannedAction,
}

/// Classify every row without running anything.
pub fn plan(env: &RunEnv, jobs: &[Job<'_>], options: PipelineOptions) -> Vec<PlannedRow> {
    jobs.iter()
        .map(|job| {
            let target = job.paths.target(options.pipeline).to_path_buf();
            let action = plan_action(env, job, options, &target);
            PlannedRow {
                line: job.row.line,
                target,
                action,
            }
        })
        .collect()
}

fn plan_action(env: &RunEnv, job: &Job<'_>, options: PipelineOptions, target: &std::path::Path) -> PlannedAction {
    if !options.force && target.exists() {
        return PlannedAction::Skip;
    }
    if let Err(err) = job.row.modes() {
        return PlannedAction::Invalid {
            reason: err.to_string(),
        };
    }
    if job.paths.model.exists() {
        if options.pipeline == Pipeline::Synthesize {
            return PlannedAction::Run;
        }
        if model_file_is_marcs(&job.paths.model) {
            return PlannedAction::Skip;
        }
    }
    match corner_paths(env, job.row, &job.paths.key) {
        Ok(corners) => PlannedAction::Interpolate {
            missing_corners: corners.into_iter().filter(|p| !p.exists()).collect(),
        },
        Err(err) => PlannedAction::Invalid {
            reason: err.to_string(),
        },
    }
}
