//! Run-time environment.
//!
//! Every path the orchestrator touches is resolved here, once, into an
//! immutable `RunEnv` that is passed by reference to every component. Nothing
//! else reads environment variables.
//!
//! Variables (a `.env` file is honoured via `dotenvy`):
//!
//! | variable | meaning |
//! | - | - |
//! | `TS_MODEL_DIR` | model atmospheres (reference + interpolated) |
//! | `TS_OPAC_DIR` | continuum opacity files |
//! | `TS_SPECTRA_DIR` | synthesized spectra |
//! | `TS_LINELIST_DIR` | line lists |
//! | `TS_LOG_DIR` | per-job logs |
//! | `TS_SCRATCH_DIR` | interpolation scratch + generated line-list file |
//! | `TS_INTERPOL_{1D,3D}_{LTE,NLTE}` | the four interpolator binaries |
//! | `TS_BABSMA`, `TS_BSYN` | continuum and line-synthesis binaries |
//! | `TS_ROOT` | working directory for external processes (optional) |
//! | `TS_NLTE_INFO_FILE` | NLTE species file (optional) |
//! | `TS_NLTE_DEPARTURE_GRID`, `TS_NLTE_AUX_FILE` | NLTE interpolation data (optional) |
//! | `TS_LINELISTS` | comma-separated line list names (optional) |
//! | `TS_TEFF_GRID`, `TS_LOGG_GRID`, `TS_FEH_GRID` | reference axes (optional) |
//!
//! Directories are created on demand. A missing binary is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{CalculationMode, GeometryMode, Modes};
use crate::error::AppError;
use crate::grid::ReferenceGrid;

const DEFAULT_NLTE_INFO_FILE: &str = "DATA/SPECIES_LTE_NLTE.dat";
const DEFAULT_LINELIST: &str = "nlte_ges_linelist_jmg6may2025_I_II";
const LINELIST_FILE_NAME: &str = "linelists.txt";

#[derive(Debug, Clone)]
pub struct Directories {
    pub models: PathBuf,
    pub opacities: PathBuf,
    pub spectra: PathBuf,
    pub linelists: PathBuf,
    pub logs: PathBuf,
    pub scratch: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Binaries {
    pub interpol_1d_lte: PathBuf,
    pub interpol_1d_nlte: PathBuf,
    pub interpol_3d_lte: PathBuf,
    pub interpol_3d_nlte: PathBuf,
    pub babsma: PathBuf,
    pub bsyn: PathBuf,
}

impl Binaries {
    /// Interpolator for a geometry × calculation combination.
    pub fn interpolator(&self, modes: Modes) -> &Path {
        match (modes.geometry, modes.calculation) {
            (GeometryMode::OneD, CalculationMode::Lte) => &self.interpol_1d_lte,
            (GeometryMode::OneD, CalculationMode::Nlte) => &self.interpol_1d_nlte,
            (GeometryMode::ThreeD, CalculationMode::Lte) => &self.interpol_3d_lte,
            (GeometryMode::ThreeD, CalculationMode::Nlte) => &self.interpol_3d_nlte,
        }
    }
}

/// Auxiliary data for NLTE runs.
#[derive(Debug, Clone)]
pub struct NlteData {
    pub info_file: PathBuf,
    pub departure_grid: Option<PathBuf>,
    pub aux_file: Option<PathBuf>,
}

/// Immutable run configuration.
#[derive(Debug, Clone)]
pub struct RunEnv {
    pub root: PathBuf,
    pub dirs: Directories,
    pub binaries: Binaries,
    pub nlte: NlteData,
    /// File listing the resolved line lists, referenced by every
    /// line-synthesis script.
    pub linelist_file: PathBuf,
    pub reference: ReferenceGrid,
}

impl RunEnv {
    /// Load `.env` (or `env_file`) and build the environment from the process.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self, AppError> {
        load_dotenv(env_file)?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key)
                .map(PathBuf::from)
                .ok_or_else(|| AppError::config(format!("Missing {key} in environment (.env).")))
        };

        let root = match get("TS_ROOT") {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir()
                .map_err(|e| AppError::config(format!("Failed to resolve working directory: {e}")))?,
        };

        let dirs = Directories {
            models: require("TS_MODEL_DIR")?,
            opacities: require("TS_OPAC_DIR")?,
            spectra: require("TS_SPECTRA_DIR")?,
            linelists: require("TS_LINELIST_DIR")?,
            logs: require("TS_LOG_DIR")?,
            scratch: require("TS_SCRATCH_DIR")?,
        };
        for dir in [
            &dirs.models,
            &dirs.opacities,
            &dirs.spectra,
            &dirs.linelists,
            &dirs.logs,
            &dirs.scratch,
        ] {
            fs::create_dir_all(dir)
                .map_err(|e| AppError::config(format!("Failed to create directory '{}': {e}", dir.display())))?;
        }

        let binaries = Binaries {
            interpol_1d_lte: require_binary(&get, "TS_INTERPOL_1D_LTE")?,
            interpol_1d_nlte: require_binary(&get, "TS_INTERPOL_1D_NLTE")?,
            interpol_3d_lte: require_binary(&get, "TS_INTERPOL_3D_LTE")?,
            interpol_3d_nlte: require_binary(&get, "TS_INTERPOL_3D_NLTE")?,
            babsma: require_binary(&get, "TS_BABSMA")?,
            bsyn: require_binary(&get, "TS_BSYN")?,
        };

        let nlte = NlteData {
            info_file: get("TS_NLTE_INFO_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NLTE_INFO_FILE)),
            departure_grid: get("TS_NLTE_DEPARTURE_GRID").map(PathBuf::from),
            aux_file: get("TS_NLTE_AUX_FILE").map(PathBuf::from),
        };

        let names = get("TS_LINELISTS").unwrap_or_else(|| DEFAULT_LINELIST.to_string());
        let linelists: Vec<PathBuf> = names
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| {
                let path = PathBuf::from(name);
                if path.is_absolute() {
                    path
                } else {
                    dirs.linelists.join(path)
                }
            })
            .collect();
        if linelists.is_empty() {
            return Err(AppError::config("TS_LINELISTS lists no line lists."));
        }
        let linelist_file = write_linelist_file(&dirs.scratch, &linelists)?;

        let reference = reference_grid(&get, &dirs.models)?;

        Ok(Self {
            root,
            dirs,
            binaries,
            nlte,
            linelist_file,
            reference,
        })
    }
}

/// Resolve only the reference grid (for commands that never run binaries).
pub fn reference_grid_from_env(env_file: Option<&Path>) -> Result<ReferenceGrid, AppError> {
    load_dotenv(env_file)?;
    let get = |key: &str| {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let models = get("TS_MODEL_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| AppError::config("Missing TS_MODEL_DIR in environment (.env)."))?;
    reference_grid(&get, &models)
}

fn load_dotenv(env_file: Option<&Path>) -> Result<(), AppError> {
    match env_file {
        Some(path) => dotenvy::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load env file '{}': {e}", path.display()))),
        None => {
            dotenvy::dotenv().ok();
            Ok(())
        }
    }
}

fn require_binary<G>(get: &G, key: &str) -> Result<PathBuf, AppError>
where
    G: Fn(&str) -> Option<String>,
{
    let path = get(key)
        .map(PathBuf::from)
        .ok_or_else(|| AppError::config(format!("Missing {key} in environment (.env).")))?;
    if !path.is_file() {
        return Err(AppError::config(format!(
            "{key} points to '{}', which is not an existing file.",
            path.display()
        )));
    }
    Ok(path)
}

fn reference_grid<G>(get: &G, models: &Path) -> Result<ReferenceGrid, AppError>
where
    G: Fn(&str) -> Option<String>,
{
    match (get("TS_TEFF_GRID"), get("TS_LOGG_GRID"), get("TS_FEH_GRID")) {
        (Some(teff), Some(logg), Some(feh)) => ReferenceGrid::from_lists(&teff, &logg, &feh),
        (None, None, None) => ReferenceGrid::discover(models),
        _ => Err(AppError::config(
            "Set all of TS_TEFF_GRID, TS_LOGG_GRID and TS_FEH_GRID, or none of them.",
        )),
    }
}

// The synthesis binary reads line list paths unquoted, one per line.
fn write_linelist_file(scratch: &Path, linelists: &[PathBuf]) -> Result<PathBuf, AppError> {
    let path = scratch.join(LINELIST_FILE_NAME);
    let mut body = String::new();
    for linelist in linelists {
        body.push_str(&linelist.display().to_string());
        body.push('\n');
    }
    fs::write(&path, body)
        .map_err(|e| AppError::config(format!("Failed to write line list file '{}': {e}", path.display())))?;
    Ok(path)
}

/// Variables for a complete environment rooted at `root`, with empty
/// placeholder binaries under `root/bin`.
#[cfg(test)]
pub(crate) fn test_vars(root: &Path) -> std::collections::HashMap<String, String> {
    let bin = root.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let mut vars = std::collections::HashMap::new();
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
        let path = bin.join(name);
        fs::write(&path, "").unwrap();
        vars.insert(key.to_string(), path.display().to_string());
    }
    vars.insert("TS_ROOT".to_string(), root.display().to_string());
    vars.insert("TS_TEFF_GRID".to_string(), "5000,5250,5500,5750,6000,6250".to_string());
    vars.insert("TS_LOGG_GRID".to_string(), "3.5,4.0,4.5,5.0".to_string());
    vars.insert("TS_FEH_GRID".to_string(), "-1.0,-0.5,0.0,0.5".to_string());
    vars
}
