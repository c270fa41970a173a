//! Synthesis: continuum opacity (`babsma`), then line synthesis (`bsyn`).

use crate::domain::{Modes, ParameterGridRow};
use crate::error::JobError;
use crate::exec::{Invocation, LockFile, Stage};
use crate::joblog::JobLog;
use crate::protocol::{model_file_is_marcs, BabsmaScript, BsynScript};

use super::{run_stage, JobContext, JobPaths};

/// Run both synthesis stages for a row whose model exists.
///
/// A spectrum that appears before the lock is taken is kept unless
/// `overwrite` is set.
pub fn synthesize(
    ctx: &JobContext<'_>,
    row: &ParameterGridRow,
    modes: Modes,
    paths: &JobPaths,
    overwrite: bool,
    log: &mut JobLog,
) -> Result<(), JobError> {
    if !paths.model.exists() {
        return Err(JobError::Precondition {
            what: "input model".to_string(),
            missing: vec![paths.model.clone()],
        });
    }

    let marcs_file = model_file_is_marcs(&paths.model);
    let Some(_lock) = LockFile::acquire_to_produce(&paths.spectrum, overwrite)? else {
        log.info(format!("spectrum produced by another run: {}", paths.spectrum.display()));
        return Ok(());
    };
    log.info(format!(
        "synthesizing {} ({modes}, {})",
        paths.spectrum.display(),
        row.output_mode.script_value()
    ));

    let babsma = BabsmaScript {
        wavelengths: row.wavelengths,
        model: &paths.model,
        marcs_file,
        opacity: &paths.opacity,
        metallicity: row.feh,
        alpha: row.abundances.alpha,
        microturbulence: row.microturbulence,
    }
    .render();
    run_stage(
        ctx,
        Invocation {
            stage: Stage::Continuum,
            program: &ctx.env.binaries.babsma,
            cwd: &ctx.env.root,
            script: babsma,
        },
        &paths.opacity,
        log,
    )?;

    let bsyn = BsynScript {
        nlte: modes.calculation.is_nlte(),
        nlte_info_file: &ctx.env.nlte.info_file,
        wavelengths: row.wavelengths,
        output_mode: row.output_mode,
        opacity: &paths.opacity,
        result: &paths.spectrum,
        metallicity: row.feh,
        alpha: row.abundances.alpha,
        linelist_file: &ctx.env.linelist_file,
        geometry: modes.geometry,
        microturbulence: row.microturbulence,
    }
    .render();
    run_stage(
        ctx,
        Invocation {
            stage: Stage::LineSynthesis,
            program: &ctx.env.binaries.bsyn,
            cwd: &ctx.env.root,
            script: bsyn,
        },
        &paths.spectrum,
        log,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Abundances, OutputMode, Pipeline, Wavelengths};
    use crate::exec::ArtifactClaims;
    use crate::stages::test_support::{env, FakeRunner};
    use std::fs;

    fn row() -> ParameterGridRow {
        ParameterGridRow {
            line: 2,
            grid_version: Some("v1".to_string()),
            teff: 5500.0,
            logg: 4.0,
            feh: 0.0,
            wavelengths: Wavelengths {
                min: 6000.0,
                max: 6100.0,
                step: 0.01,
            },
            microturbulence: 1.3,
            turbulence_tag: "01".to_string(),
            abundances: Abundances {
                alpha: 0.4,
                ..Abundances::default()
            },
            output_mode: OutputMode::Intensity,
            geometry: "3D".to_string(),
            calculation: "NLTE".to_string(),
        }
    }

    #[test]
    fn runs_babsma_then_bsyn() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row();
        let paths = JobPaths::new(&env, &row, Pipeline::Synthesize);
        fs::write(&paths.model, " INTERPOL 8 models\n").unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        synthesize(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap();

        assert_eq!(runner.stages(), vec![Stage::Continuum, Stage::LineSynthesis]);
        assert!(paths.spectrum.exists());
        let calls = runner.calls.lock();
        assert!(calls[0].1.contains("'MARCS-FILE:' '.false.'"));
        assert!(calls[0].1.contains("'ALPHA/Fe   :'    '0.40'"));
        assert!(calls[1].1.contains("'NLTE :'          '.true.'"));
        assert!(calls[1].1.contains("'SPHERICAL:'  'T'"));
        assert!(calls[1].1.ends_with("  1.30\n"));
    }

    #[test]
    fn continuum_failure_stops_before_line_synthesis() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::failing(Stage::Continuum, 1);
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row();
        let paths = JobPaths::new(&env, &row, Pipeline::Synthesize);
        fs::write(&paths.model, "MARCS\n").unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        let err = synthesize(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap_err();
        assert!(matches!(err, JobError::Process { stage: Stage::Continuum, .. }));
        assert_eq!(runner.stages(), vec![Stage::Continuum]);
        assert!(!paths.opacity.exists());
        assert!(!LockFile::lock_path(&paths.spectrum).exists());
    }

    #[test]
    fn line_synthesis_failure_removes_partial_spectrum() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::failing(Stage::LineSynthesis, 5);
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row();
        let paths = JobPaths::new(&env, &row, Pipeline::Synthesize);
        fs::write(&paths.model, "MARCS\n").unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        let err = synthesize(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap_err();
        assert_eq!(err.to_string(), "bsyn failed with exit code 5");
        assert!(!paths.spectrum.exists());
        assert!(paths.opacity.exists());
    }

    #[test]
    fn missing_model_is_a_precondition_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row();
        let paths = JobPaths::new(&env, &row, Pipeline::Synthesize);
        let mut log = JobLog::open(&paths.log).unwrap();

        let err = synthesize(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap_err();
        assert!(err.to_string().contains(&paths.model.display().to_string()));
        assert!(runner.stages().is_empty());
    }

    #[test]
    fn spectrum_finished_elsewhere_is_kept_unless_overwriting() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        let runner = FakeRunner::default();
        let claims = ArtifactClaims::new();
        let ctx = JobContext {
            env: &env,
            runner: &runner,
            claims: &claims,
        };
        let row = row();
        let paths = JobPaths::new(&env, &row, Pipeline::Synthesize);
        fs::write(&paths.model, "MARCS\n").unwrap();
        fs::write(&paths.spectrum, "from another run\n").unwrap();
        let mut log = JobLog::open(&paths.log).unwrap();

        synthesize(&ctx, &row, row.modes().unwrap(), &paths, false, &mut log).unwrap();
        assert!(runner.stages().is_empty());
        assert_eq!(fs::read_to_string(&paths.spectrum).unwrap(), "from another run\n");
        assert!(!LockFile::lock_path(&paths.spectrum).exists());

        synthesize(&ctx, &row, row.modes().unwrap(), &paths, true, &mut log).unwrap();
        assert_eq!(runner.stages(), vec![Stage::Continuum, Stage::LineSynthesis]);
        assert_eq!(fs::read_to_string(&paths.spectrum).unwrap(), "done\n");
    }
}
