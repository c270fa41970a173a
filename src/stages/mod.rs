//! Job stages.
//!
//! A job is a strictly sequential chain of external invocations:
//! interpolation (only when the model is missing), then continuum opacity and
//! line synthesis for the synthesis pipeline. Stages report failures as
//! `JobError`; turning those into a job status is the caller's business.

pub mod resolve;
pub mod synth;

pub use resolve::*;
pub use synth::*;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::RunEnv;
use crate::domain::{
    interpolation_scratch_name, job_log_name, opacity_file_name, row_mode_suffix, spectrum_file_name, ModelKey,
    ParameterGridRow, Pipeline,
};
use crate::error::JobError;
use crate::exec::{ArtifactClaims, Invocation, ProcessRunner};
use crate::joblog::JobLog;

/// Shared, read-only state every job borrows.
pub struct JobContext<'a> {
    pub env: &'a RunEnv,
    pub runner: &'a dyn ProcessRunner,
    pub claims: &'a ArtifactClaims,
}

/// Every path a row's job reads or writes.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPaths {
    pub key: ModelKey,
    pub model: PathBuf,
    pub scratch: PathBuf,
    pub opacity: PathBuf,
    pub spectrum: PathBuf,
    pub log: PathBuf,
}

impl JobPaths {
    pub fn new(env: &RunEnv, row: &ParameterGridRow, pipeline: Pipeline) -> Self {
        let key = ModelKey::from_row(row);
        let suffix = row_mode_suffix(row);
        Self {
            model: env.dirs.models.join(key.file_name()),
            scratch: env.dirs.scratch.join(interpolation_scratch_name(&key)),
            opacity: env.dirs.opacities.join(opacity_file_name(&key, &suffix)),
            spectrum: env.dirs.spectra.join(spectrum_file_name(&key, &suffix)),
            log: env.dirs.logs.join(job_log_name(&key, &suffix, pipeline)),
            key,
        }
    }

    /// The artifact whose existence means the row is done.
    pub fn target(&self, pipeline: Pipeline) -> &Path {
        match pipeline {
            Pipeline::Interpolate => &self.model,
            Pipeline::Synthesize => &self.spectrum,
        }
    }
}

/// Log the script, run the process, and translate the exit status.
///
/// On failure the stage's partial `output` is removed so that existence keeps
/// meaning "complete".
pub(crate) fn run_stage(
    ctx: &JobContext<'_>,
    invocation: Invocation<'_>,
    output: &Path,
    log: &mut JobLog,
) -> Result<(), JobError> {
    log.info(format!(
        "{} starting: {} (cwd {})",
        invocation.stage,
        invocation.program.display(),
        invocation.cwd.display()
    ));
    log.block(&format!("{} script", invocation.stage), &invocation.script);

    let started = Instant::now();
    let exit = ctx.runner.run(&invocation, log).map_err(|source| JobError::Spawn {
        stage: invocation.stage,
        program: invocation.program.to_path_buf(),
        source,
    })?;
    let elapsed = started.elapsed().as_secs_f64();

    if !exit.success() {
        remove_partial(output, log);
        return Err(JobError::Process {
            stage: invocation.stage,
            code: exit.code,
        });
    }

    log.info(format!("{} finished in {elapsed:.1}s", invocation.stage));
    if !output.exists() {
        log.warn(format!(
            "{} exited 0 but did not write {}",
            invocation.stage,
            output.display()
        ));
    }
    Ok(())
}

fn remove_partial(path: &Path, log: &mut JobLog) {
    match fs::remove_file(path) {
        Ok(()) => log.warn(format!("removed partial output {}", path.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log.warn(format!("could not remove partial output {}: {e}", path.display())),
    }
}
