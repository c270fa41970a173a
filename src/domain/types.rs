//! Shared domain types.
//!
//! Grid rows are plain data: everything needed to name a job's artifacts and
//! render its stdin scripts. Geometry and calculation modes stay as raw tags on
//! the row and are resolved per job, so that an unsupported combination is
//! reported in that job's log instead of failing the whole grid.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Flux or specific-intensity output of the line-synthesis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Flux,
    Intensity,
}

impl OutputMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "flux" => Some(OutputMode::Flux),
            "intensity" => Some(OutputMode::Intensity),
            _ => None,
        }
    }

    /// Tag used in artifact names.
    pub fn tag(self) -> &'static str {
        match self {
            OutputMode::Flux => "flux",
            OutputMode::Intensity => "intensity",
        }
    }

    /// Value of the `INTENSITY/FLUX:` key in the line-synthesis script.
    pub fn script_value(self) -> &'static str {
        match self {
            OutputMode::Flux => "Flux",
            OutputMode::Intensity => "Intensity",
        }
    }
}

/// Atmosphere geometry.
///
/// `1D` models are treated plane-parallel; `3D` rows select the 3D
/// interpolators and the spherical flag of the line-synthesis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryMode {
    #[serde(rename = "1D")]
    OneD,
    #[serde(rename = "3D")]
    ThreeD,
}

impl GeometryMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "1D" => Some(GeometryMode::OneD),
            "3D" => Some(GeometryMode::ThreeD),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            GeometryMode::OneD => "1D",
            GeometryMode::ThreeD => "3D",
        }
    }

    /// Value of the `SPHERICAL:` key.
    pub fn spherical_flag(self) -> &'static str {
        match self {
            GeometryMode::OneD => "F",
            GeometryMode::ThreeD => "T",
        }
    }
}

/// Thermodynamic-equilibrium treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalculationMode {
    #[serde(rename = "LTE")]
    Lte,
    #[serde(rename = "NLTE")]
    Nlte,
}

impl CalculationMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LTE" => Some(CalculationMode::Lte),
            "NLTE" => Some(CalculationMode::Nlte),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            CalculationMode::Lte => "LTE",
            CalculationMode::Nlte => "NLTE",
        }
    }

    pub fn is_nlte(self) -> bool {
        matches!(self, CalculationMode::Nlte)
    }
}

/// A resolved (geometry, calculation) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modes {
    pub geometry: GeometryMode,
    pub calculation: CalculationMode,
}

impl Modes {
    /// Resolve the raw `mode` / `calculation_mode` tags of a row.
    pub fn resolve(geometry: &str, calculation: &str) -> Result<Self, JobError> {
        match (GeometryMode::parse(geometry), CalculationMode::parse(calculation)) {
            (Some(geometry), Some(calculation)) => Ok(Modes {
                geometry,
                calculation,
            }),
            _ => Err(JobError::Config(format!(
                "unsupported mode combination: mode='{geometry}', calculation_mode='{calculation}' \
                 (expected 1D|3D and LTE|NLTE)"
            ))),
        }
    }
}

impl fmt::Display for Modes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.geometry.tag(), self.calculation.tag())
    }
}

/// Elemental abundance offsets carried in model names.
///
/// Only `alpha` is forwarded to the external synthesis scripts; the others
/// select the model file but are written as fixed placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Abundances {
    pub alpha: f64,
    pub carbon: f64,
    pub nitrogen: f64,
    pub oxygen: f64,
    pub r_process: f64,
    pub s_process: f64,
}

impl Abundances {
    /// Values in model-name order: `a, c, n, o, r, s`.
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.alpha,
            self.carbon,
            self.nitrogen,
            self.oxygen,
            self.r_process,
            self.s_process,
        ]
    }
}

/// Synthesis wavelength range in Ångström.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wavelengths {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// One row of the parameter grid: one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGridRow {
    /// 1-based line number in the grid file (header is line 1).
    pub line: usize,
    pub grid_version: Option<String>,

    pub teff: f64,
    pub logg: f64,
    pub feh: f64,

    pub wavelengths: Wavelengths,
    /// Microturbulence velocity in km/s (`turbvel` column).
    pub microturbulence: f64,
    /// Microturbulence tag used in model names (`t_value` column, e.g. `01`).
    pub turbulence_tag: String,
    pub abundances: Abundances,

    pub output_mode: OutputMode,
    /// Raw `mode` column (`1D` / `3D`).
    pub geometry: String,
    /// Raw `calculation_mode` column (`LTE` / `NLTE`).
    pub calculation: String,
}

impl ParameterGridRow {
    pub fn modes(&self) -> Result<Modes, JobError> {
        Modes::resolve(&self.geometry, &self.calculation)
    }

    /// True when both rows describe the same computation.
    ///
    /// Line number and grid version are bookkeeping and do not count.
    pub fn same_parameters(&self, other: &ParameterGridRow) -> bool {
        self.teff == other.teff
            && self.logg == other.logg
            && self.feh == other.feh
            && self.wavelengths == other.wavelengths
            && self.microturbulence == other.microturbulence
            && self.turbulence_tag == other.turbulence_tag
            && self.abundances == other.abundances
            && self.output_mode == other.output_mode
            && self.geometry.eq_ignore_ascii_case(&other.geometry)
            && self.calculation.eq_ignore_ascii_case(&other.calculation)
    }

    /// True when both rows need the same model atmosphere.
    pub fn same_model(&self, other: &ParameterGridRow) -> bool {
        self.teff == other.teff
            && self.logg == other.logg
            && self.feh == other.feh
            && self.turbulence_tag == other.turbulence_tag
            && self.abundances == other.abundances
    }
}

/// Which pipeline a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    /// Ensure every row's model exists, interpolating missing ones.
    Interpolate,
    /// Ensure the model, then run continuum and line synthesis.
    Synthesize,
}

impl Pipeline {
    /// Interpolation cannot sensibly continue past a missing input; rows of a
    /// synthesis grid are independent.
    pub fn default_policy(self) -> FailurePolicy {
        match self {
            Pipeline::Interpolate => FailurePolicy::Abort,
            Pipeline::Synthesize => FailurePolicy::Continue,
        }
    }

    /// Tag used in job log names.
    pub fn tag(self) -> &'static str {
        match self {
            Pipeline::Interpolate => "interp",
            Pipeline::Synthesize => "synth",
        }
    }
}

/// What the scheduler does after a job fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop dispatching new rows; running jobs finish.
    Abort,
    /// Record the failure and keep going.
    Continue,
}
