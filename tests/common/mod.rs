#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use ts_grid::config::RunEnv;
use ts_grid::domain::ParameterGridRow;
use ts_grid::exec::{Invocation, ProcessExit, ProcessRunner, Stage};
use ts_grid::grid::{read_grid_from, GridFile};
use ts_grid::joblog::JobLog;
use ts_grid::stages::corner_paths;

pub const HEADER: &str =
    "grid_version,teff,logg,feh,lam_min,lam_max,lam_step,turbvel,t_value,a,c,n,o,r,s,output_mode,mode,calculation_mode";

pub struct Workspace {
    pub dir: TempDir,
    pub env: RunEnv,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_vars(|_| {})
    }

    pub fn with_vars(edit: impl FnOnce(&mut HashMap<String, String>)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = base_vars(dir.path(), |bin, name| {
            let path = bin.join(name);
            fs::write(&path, "").unwrap();
            path
        });
        edit(&mut vars);
        let env = RunEnv::from_lookup(|k| vars.get(k).cloned()).unwrap();
        Self { dir, env }
    }

    pub fn grid(&self, body: &str) -> GridFile {
        read_grid_from(format!("{HEADER}\n{body}").as_bytes()).unwrap()
    }

    pub fn seed_corners(&self, row: &ParameterGridRow) -> [PathBuf; 8] {
        let key = ts_grid::domain::ModelKey::from_row(row);
        let corners = corner_paths(&self.env, row, &key).unwrap();
        for corner in &corners {
            fs::write(corner, "MARCS reference model\n").unwrap();
        }
        corners
    }
}

/// Environment variables for a workspace rooted at `root`; `make_bin` creates
/// each binary and returns its path.
pub fn base_vars(root: &Path, make_bin: impl Fn(&Path, &str) -> PathBuf) -> HashMap<String, String> {
    let bin = root.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let mut vars = HashMap::new();
    for (key, dir) in [
        ("TS_MODEL_DIR", "models"),
        ("TS_OPAC_DIR", "opac"),
        ("TS_SPECTRA_DIR", "spectra"),
        ("TS_LINELIST_DIR", "linelists"),
        ("TS_LOG_DIR", "logs"),
        ("TS_SCRATCH_DIR", "tmp"),
    ] {
        vars.insert(key.to_string(), root.join(dir).display().to_string());
    }
    for (key, name) in [
        ("TS_INTERPOL_1D_LTE", "interpol_1d_lte"),
        ("TS_INTERPOL_1D_NLTE", "interpol_1d_nlte"),
        ("TS_INTERPOL_3D_LTE", "interpol_3d_lte"),
        ("TS_INTERPOL_3D_NLTE", "interpol_3d_nlte"),
        ("TS_BABSMA", "babsma_lu"),
        ("TS_BSYN", "bsyn_lu"),
    ] {
        vars.insert(key.to_string(), make_bin(&bin, name).display().to_string());
    }
    vars.insert("TS_ROOT".to_string(), root.display().to_string());
    vars.insert("TS_TEFF_GRID".to_string(), "5000,5250,5500,5750,6000,6250".to_string());
    vars.insert("TS_LOGG_GRID".to_string(), "3.5,4.0,4.5,5.0".to_string());
    vars.insert("TS_FEH_GRID".to_string(), "-1.0,-0.5,0.0,0.5".to_string());
    vars
}

type FailRule = Box<dyn Fn(&Invocation<'_>) -> Option<i32> + Send + Sync>;

/// Stand-in for the scientific binaries.
///
/// Records every invocation, writes the stage's output file (so skip and
/// reuse logic sees real files), and can be told to fail selected calls.
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: Mutex<Vec<Recorded>>,
    fail: Option<FailRule>,
    delay: Option<Duration>,
    inside: AtomicUsize,
    pub peak: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub stage: Stage,
    pub program: PathBuf,
    pub script: String,
}

impl RecordingRunner {
    pub fn failing(rule: impl Fn(&Invocation<'_>) -> Option<i32> + Send + Sync + 'static) -> Self {
        Self {
            fail: Some(Box::new(rule)),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls.lock().iter().map(|c| c.stage).collect()
    }

    pub fn count(&self, stage: Stage) -> usize {
        self.calls.lock().iter().filter(|c| c.stage == stage).count()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation<'_>, _log: &mut JobLog) -> io::Result<ProcessExit> {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().push(Recorded {
            stage: invocation.stage,
            program: invocation.program.to_path_buf(),
            script: invocation.script.clone(),
        });
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let code = self.fail.as_ref().and_then(|rule| rule(invocation)).unwrap_or(0);
        if code == 0 {
            if let Some(path) = output_of(invocation) {
                let body = match invocation.stage {
                    Stage::Interpolation => " INTERPOL 8 models\n",
                    _ => "output\n",
                };
                fs::write(path, body)?;
            }
        }
        self.inside.fetch_sub(1, Ordering::SeqCst);
        Ok(ProcessExit { code: Some(code) })
    }
}

/// Output path named by a stage script.
pub fn output_of(invocation: &Invocation<'_>) -> Option<PathBuf> {
    let line = match invocation.stage {
        Stage::Interpolation => invocation.script.lines().nth(8)?,
        Stage::Continuum => invocation.script.lines().find(|l| l.starts_with("'MODELOPAC:'"))?,
        Stage::LineSynthesis => invocation.script.lines().find(|l| l.starts_with("'RESULTFILE :'"))?,
    };
    let value = line.trim_end().strip_suffix('\'')?;
    let (_, path) = value.rsplit_once('\'')?;
    Some(PathBuf::from(path))
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
