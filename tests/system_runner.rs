#![cfg(unix)]

mod common;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use common::{base_vars, read, HEADER};
use ts_grid::app::pipeline::{jobs, run_pipeline, PipelineOptions};
use ts_grid::config::RunEnv;
use ts_grid::domain::{ModelKey, Pipeline};
use ts_grid::exec::SystemRunner;
use ts_grid::grid::read_grid_from;
use ts_grid::scheduler::RowStatus;
use ts_grid::stages::corner_paths;

const INTERPOL: &str = r#"#!/bin/sh
i=0
while IFS= read -r line; do
  i=$((i+1))
  if [ "$i" -eq 9 ]; then out=$(printf '%s' "$line" | tr -d "'"); fi
done
echo "interpolating into $out"
echo " INTERPOL stand-in" > "$out"
"#;

const BABSMA: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    "'MODELOPAC:'"*) out=$(printf '%s' "$line" | sed "s/^'MODELOPAC:' '\(.*\)'$/\1/") ;;
  esac
done
echo "babsma stand-in wrote $out"
echo opacity > "$out"
"#;

const BSYN: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    "'RESULTFILE :'"*) out=$(printf '%s' "$line" | sed "s/^'RESULTFILE :' '\(.*\)'$/\1/") ;;
  esac
done
echo "bsyn stand-in wrote $out" >&2
echo "6000.0 1.0" > "$out"
"#;

const FAILING: &str = "#!/bin/sh\ncat > /dev/null\necho 'fatal: opacity table missing'\nexit 3\n";

fn install(bin: &Path, name: &str, body: &str) -> PathBuf {
    let path = bin.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn env(root: &Path, babsma: &'static str) -> RunEnv {
    let vars = base_vars(root, |bin, name| {
        let body = match name {
            "babsma_lu" => babsma,
            "bsyn_lu" => BSYN,
            _ => INTERPOL,
        };
        install(bin, name, body)
    });
    RunEnv::from_lookup(|k| vars.get(k).cloned()).unwrap()
}

const ROW: &str = "v1,5625,4.2,-0.3,6000,6100,0.01,1.0,01,0.0,0.0,0.0,0.0,0.0,0.0,Flux,1D,LTE";

#[test]
fn real_processes_produce_artifacts_and_verbatim_logs() {
    let tmp = tempfile::tempdir().unwrap();
    let env = env(tmp.path(), BABSMA);
    let grid = read_grid_from(format!("{HEADER}\n{ROW}\n").as_bytes()).unwrap();
    let row = &grid.rows[0];
    for corner in corner_paths(&env, row, &ModelKey::from_row(row)).unwrap() {
        fs::write(corner, "MARCS\n").unwrap();
    }
    let jobs = jobs(&env, &grid.rows, Pipeline::Synthesize);

    let report = run_pipeline(
        &env,
        &jobs,
        PipelineOptions {
            pipeline: Pipeline::Synthesize,
            policy: Pipeline::Synthesize.default_policy(),
            workers: 1,
            force: false,
        },
        &SystemRunner,
    )
    .unwrap();

    assert_eq!(report.outcomes, vec![RowStatus::Succeeded]);
    let paths = &jobs[0].paths;
    assert_eq!(read(&paths.model), " INTERPOL stand-in\n");
    assert_eq!(read(&paths.opacity), "opacity\n");
    assert_eq!(read(&paths.spectrum), "6000.0 1.0\n");

    let log = read(&paths.log);
    assert!(log.contains(&format!("interpolating into {}", paths.model.display())));
    assert!(log.contains(&format!("babsma stand-in wrote {}", paths.opacity.display())));
    assert!(log.contains(&format!("bsyn stand-in wrote {}", paths.spectrum.display())));
}

#[test]
fn failing_stage_output_is_captured() {
    let tmp = tempfile::tempdir().unwrap();
    let env = env(tmp.path(), FAILING);
    let grid = read_grid_from(format!("{HEADER}\n{ROW}\n").as_bytes()).unwrap();
    let jobs = jobs(&env, &grid.rows, Pipeline::Synthesize);
    fs::write(&jobs[0].paths.model, "MARCS\n").unwrap();

    let report = run_pipeline(
        &env,
        &jobs,
        PipelineOptions {
            pipeline: Pipeline::Synthesize,
            policy: Pipeline::Synthesize.default_policy(),
            workers: 1,
            force: false,
        },
        &SystemRunner,
    )
    .unwrap();

    match &report.outcomes[0] {
        RowStatus::Failed { message, .. } => assert_eq!(message, "babsma failed with exit code 3"),
        other => panic!("expected failure, got {other:?}"),
    }
    let log = read(&jobs[0].paths.log);
    assert!(log.contains("fatal: opacity table missing"));
    assert!(log.contains("[ERROR] job failed (process): babsma failed with exit code 3"));
    assert!(!jobs[0].paths.spectrum.exists());
}
