//! The reference lattice of precomputed models and interpolation corners.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::ModelKey;
use crate::error::AppError;
use crate::grid::bracket::{bracket, validate_axis, Bracket, BracketError};
use crate::protocol::model_file_is_marcs;

/// Three independent sorted axes. Built once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceGrid {
    pub teff: Vec<f64>,
    pub logg: Vec<f64>,
    pub feh: Vec<f64>,
}

/// Bracketing results on all three axes for one target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CornerSet {
    pub teff: Bracket,
    pub logg: Bracket,
    pub feh: Bracket,
}

impl CornerSet {
    /// The 2×2×2 corners in interpolator order: temperature outermost,
    /// metallicity innermost, low before high on each axis.
    pub fn points(&self) -> [(f64, f64, f64); 8] {
        let mut out = [(0.0, 0.0, 0.0); 8];
        let mut i = 0;
        for t in [self.teff.low, self.teff.high] {
            for g in [self.logg.low, self.logg.high] {
                for z in [self.feh.low, self.feh.high] {
                    out[i] = (t, g, z);
                    i += 1;
                }
            }
        }
        out
    }

    /// Corner model keys for `target`, holding its non-bracketed fields fixed.
    pub fn keys(&self, target: &ModelKey) -> [ModelKey; 8] {
        self.points().map(|(t, g, z)| target.with_axes(t, g, z))
    }
}

impl ReferenceGrid {
    /// Build from explicit axis values (sorted and de-duplicated here).
    pub fn new(teff: Vec<f64>, logg: Vec<f64>, feh: Vec<f64>) -> Result<Self, AppError> {
        let grid = Self {
            teff: normalize_axis(teff),
            logg: normalize_axis(logg),
            feh: normalize_axis(feh),
        };
        for (name, axis) in [("teff", &grid.teff), ("logg", &grid.logg), ("feh", &grid.feh)] {
            validate_axis(axis)
                .map_err(|e| AppError::config(format!("Invalid reference axis `{name}`: {e}")))?;
        }
        Ok(grid)
    }

    /// Parse comma-separated axis lists (e.g. `TS_TEFF_GRID=5000,5250,5500`).
    pub fn from_lists(teff: &str, logg: &str, feh: &str) -> Result<Self, AppError> {
        Self::new(
            parse_axis_list("teff", teff)?,
            parse_axis_list("logg", logg)?,
            parse_axis_list("feh", feh)?,
        )
    }

    /// Collect the distinct axis values of every canonical model in `dir`.
    pub fn discover(dir: &Path) -> Result<Self, AppError> {
        let entries = fs::read_dir(dir).map_err(|e| {
            AppError::config(format!("Failed to scan model directory '{}': {e}", dir.display()))
        })?;

        let mut teff = BTreeSet::new();
        let mut logg = BTreeSet::new();
        let mut feh = BTreeSet::new();
        let mut found = 0usize;

        for entry in entries {
            let entry = entry.map_err(|e| {
                AppError::config(format!("Failed to scan model directory '{}': {e}", dir.display()))
            })?;
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(ModelKey::parse) else {
                continue;
            };
            // Interpolated models share the directory but are not lattice points.
            if !model_file_is_marcs(&entry.path()) {
                continue;
            }
            teff.insert(key.teff);
            logg.insert(key.logg_tenths);
            feh.insert(key.feh_hundredths);
            found += 1;
        }

        if found == 0 {
            return Err(AppError::config(format!(
                "No canonical model files found in '{}'; set TS_TEFF_GRID, TS_LOGG_GRID and TS_FEH_GRID.",
                dir.display()
            )));
        }

        Self::new(
            teff.into_iter().map(|v| v as f64).collect(),
            logg.into_iter().map(|v| v as f64 / 10.0).collect(),
            feh.into_iter().map(|v| v as f64 / 100.0).collect(),
        )
    }

    pub fn corners(&self, teff: f64, logg: f64, feh: f64) -> Result<CornerSet, BracketError> {
        Ok(CornerSet {
            teff: bracket(teff, &self.teff)?,
            logg: bracket(logg, &self.logg)?,
            feh: bracket(feh, &self.feh)?,
        })
    }
}

fn normalize_axis(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(f64::total_cmp);
    values.dedup();
    values
}

fn parse_axis_list(name: &str, raw: &str) -> Result<Vec<f64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| AppError::config(format!("Invalid value '{s}' in reference axis `{name}`.")))
        })
        .collect()
}
