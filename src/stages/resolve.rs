//! Input resolution: make sure a row's model atmosphere exists.
//!
//! Missing models are interpolated from the 8 reference corners that bracket
//! the row on (teff, logg, feh). All corners must already exist; a missing
//! corner is never interpolated recursively.

use std::path::PathBuf;

use crate::config::RunEnv;
use crate::domain::{ModelKey, Modes, ParameterGridRow};
use crate::error::JobError;
use crate::exec::{Invocation, LockFile, Stage};
use crate::joblog::JobLog;
use crate::protocol::{model_file_is_marcs, InterpolScript, NlteInterpolation};

use super::{run_stage, JobContext, JobPaths};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// The model was already on disk.
    Existing,
    /// The model was produced by this job.
    Interpolated,
}

/// Corner model paths for a row, in interpolator order.
pub fn corner_paths(env: &RunEnv, row: &ParameterGridRow, key: &ModelKey) -> Result<[PathBuf; 8], JobError> {
    let corners = env
        .reference
        .corners(row.teff, row.logg, row.feh)
        .map_err(|e| JobError::Config(format!("cannot bracket row on the reference grid: {e}")))?;
    Ok(corners.keys(key).map(|corner| env.dirs.models.join(corner.file_name())))
}

/// Make sure the row's model exists, interpolating it if needed.
///
/// With `rebuild`, an interpolated model already on disk is interpolated
/// again, once per run even when several rows share it. Reference models are
/// never replaced.
pub fn ensure_model(
    ctx: &JobContext<'_>,
    row: &ParameterGridRow,
    modes: Modes,
    paths: &JobPaths,
    rebuild: bool,
    log: &mut JobLog,
) -> Result<ModelSource, JobError> {
    if paths.model.exists() {
        if !rebuild {
            log.info(format!("model exists: {}", paths.model.display()));
            return Ok(ModelSource::Existing);
        }
        if model_file_is_marcs(&paths.model) {
            log.info(format!("reference model kept: {}", paths.model.display()));
            return Ok(ModelSource::Existing);
        }
    }

    // Another row of this run may be producing the same model.
    let claim = ctx.claims.claim(&paths.model);
    if paths.model.exists() && (!rebuild || claim.produced()) {
        log.info(format!("model produced by another job: {}", paths.model.display()));
        return Ok(ModelSource::Existing);
    }

    let nlte = if modes.calculation.is_nlte() {
        Some(nlte_inputs(ctx)?)
    } else {
        None
    };
    let program = ctx.env.binaries.interpolator(modes);

    let corners = corner_paths(ctx.env, row, &paths.key)?;
    let missing: Vec<PathBuf> = corners.iter().filter(|p| !p.exists()).cloned().collect();
    if !missing.is_empty() {
        return Err(JobError::Precondition {
            what: format!("{} of 8 corner models", missing.len()),
            missing,
        });
    }

    let Some(_lock) = LockFile::acquire_to_produce(&paths.model, rebuild)? else {
        log.info(format!("model produced by another run: {}", paths.model.display()));
        return Ok(ModelSource::Existing);
    };
    log.info(format!(
        "interpolating {} ({modes}) at teff={} logg={} feh={}",
        paths.model.display(),
        row.teff,
        row.logg,
        row.feh
    ));

    let script = InterpolScript {
        corners: &corners,
        output: &paths.model,
        scratch: &paths.scratch,
        teff: row.teff,
        logg: row.logg,
        feh: row.feh,
        nlte: nlte.as_ref(),
    }
    .render();

    run_stage(
        ctx,
        Invocation {
            stage: Stage::Interpolation,
            program,
            cwd: &ctx.env.root,
            script,
        },
        &paths.model,
        log,
    )?;
    claim.mark_produced();
    Ok(ModelSource::Interpolated)
}

fn nlte_inputs(ctx: &JobContext<'_>) -> Result<NlteInterpolation, JobError> {
    let nlte = &ctx.env.nlte;
    match (&nlte.departure_grid, &nlte.aux_file) {
        (Some(departure_grid), Some(aux_file)) => Ok(NlteInterpolation {
            departure_grid: departure_grid.clone(),
            aux_file: aux_file.clone(),
        }),
        _ => Err(JobError::Config(
            "NLTE interpolation needs TS_NLTE_DEPARTURE_GRID and TS_NLTE_AUX_FILE".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Abundances, OutputMode, Pipeline, Wavelengths};
    use crate::exec::ArtifactClaims;
    use crate::stages::test_support::{env, FakeRunner};
    use std::fs;

    fn row(calculation: &str) -> ParameterGridRow {
        ParameterGridRow {
            line: 2,
            grid_version: None,
            teff: 5625.0,
            logg: 4.2,
            feh: -0.3,
            wavelengths: Wavelengths {
                min: 6000.0,
                max: 6100.0,
                step: 0.01,
            },
            microturbulence: 1.0,
            turbulence_tag: "01".to_string(),
            abundances: Abundances::default(),
            output_mode: OutputMode::Flux,
            geometry: "1D".to_string(),
            calculation: calculation.to_string(),
        }
    }

    fn seed_corners(ctx: &JobContext<'_>, row: &ParameterGridRow, paths: &JobPaths) -> [PathBuf; 8] {
        let corners = corner_paths(ctx.env, row, &paths.key).unwrap();
        for corner in &corners {
            fs::write(corner, "MARCS\n").unwrap();
        }
        corners
    }

    #[test]
    fn corners_follow_the_bracketing() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("LTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        let names: Vec<String> = corner_paths(ctx.env, &row, &paths.key)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names[0].starts_with("p5500_g+4.0_m0.0_t01_st_z-0.50_"));
        assert!(names[1].starts_with("p5500_g+4.0_m0.0_t01_st_z+0.00_"));
        assert!(names[2].starts_with("p5500_g+4.5_m0.0_t01_st_z-0.50_"));
        assert!(names[7].starts_with("p5750_g+4.5_m0.0_t01_st_z+0.00_"));
    }

    #[test]
    fn existing_model_needs_no_process() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("LTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        fs::write(&paths.model, "MARCS\n").unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        let source = ensure_model(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap();
        assert_eq!(source, ModelSource::Existing);
        assert!(runner.stages().is_empty());
    }

    #[test]
    fn missing_corners_are_all_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("LTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        let corners = seed_corners(&ctx, &row, &paths);
        fs::remove_file(&corners[3]).unwrap();
        fs::remove_file(&corners[6]).unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        match ensure_model(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log) {
            Err(JobError::Precondition { missing, .. }) => {
                assert_eq!(missing, vec![corners[3].clone(), corners[6].clone()]);
            }
            other => panic!("expected precondition failure, got {other:?}"),
        }
        assert!(runner.stages().is_empty());
    }

    #[test]
    fn interpolates_when_corners_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("LTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        let corners = seed_corners(&ctx, &row, &paths);
        let mut log = JobLog::open(&paths.log).unwrap();

        let source = ensure_model(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap();
        assert_eq!(source, ModelSource::Interpolated);
        assert!(paths.model.exists());
        assert!(!LockFile::lock_path(&paths.model).exists());

        let calls = runner.calls.lock();
        assert_eq!(calls.len(), 1);
        let first = format!("'{}'", corners[0].display());
        assert_eq!(calls[0].1.lines().next(), Some(first.as_str()));
    }

    #[test]
    fn failed_interpolation_removes_partial_model() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::failing(Stage::Interpolation, 2);
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("LTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        seed_corners(&ctx, &row, &paths);
        let mut log = JobLog::open(&paths.log).unwrap();

        let err = ensure_model(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap_err();
        assert!(matches!(err, JobError::Process { stage: Stage::Interpolation, code: Some(2) }));
        assert!(!paths.model.exists());
    }

    #[test]
    fn nlte_without_auxiliary_data_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("NLTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        seed_corners(&ctx, &row, &paths);
        let mut log = JobLog::open(&paths.log).unwrap();

        let err = ensure_model(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap_err();
        assert!(matches!(err, JobError::Config(_)));
        assert!(runner.stages().is_empty());
    }

    #[test]
    fn held_lock_fails_the_job() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("LTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        seed_corners(&ctx, &row, &paths);
        let _other_run = LockFile::acquire(&paths.model).unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        let err = ensure_model(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap_err();
        assert!(matches!(err, JobError::Locked { .. }));
        assert!(runner.stages().is_empty());
    }

    #[test]
    fn rebuild_reinterpolates_once_per_run() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("LTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        seed_corners(&ctx, &row, &paths);
        fs::write(&paths.model, " INTERPOL stale\n").unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        let first = ensure_model(&ctx, &row, row.modes().unwrap(), &paths, true, &mut log).unwrap();
        assert_eq!(first, ModelSource::Interpolated);
        assert_eq!(fs::read_to_string(&paths.model).unwrap(), " INTERPOL model\n");

        let second = ensure_model(&ctx, &row, row.modes().unwrap(), &paths, true, &mut log).unwrap();
        assert_eq!(second, ModelSource::Existing);
        assert_eq!(runner.stages(), vec![Stage::Interpolation]);
    }

    #[test]
    fn rebuild_keeps_reference_models() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row("LTE");
        let paths = JobPaths::new(&env, &row, Pipeline::Interpolate);
        fs::write(&paths.model, "MARCS reference\n").unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        let source = ensure_model(&ctx, &row, row.modes().unwrap(), &paths, true, &mut log).unwrap();
        assert_eq!(source, ModelSource::Existing);
        assert!(runner.stages().is_empty());
        assert_eq!(fs::read_to_string(&paths.model).unwrap(), "MARCS reference\n");
    }
}
