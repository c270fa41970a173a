use std::path::{Path, PathBuf};

use super::{quoted, real};

/// Extra inputs of the NLTE interpolators.
#[derive(Debug, Clone)]
pub struct NlteInterpolation {
    pub departure_grid: PathBuf,
    pub aux_file: PathBuf,
}

/// Microturbulence index and abundance the NLTE interpolators are always fed.
const NLTE_MICROTURBULENCE_INDEX: u32 = 1;
const NLTE_ABUNDANCE: &str = "0.00";

/// Script for the model interpolators.
///
/// Corners are written in the bracketing order (teff, then logg, then feh,
/// low before high).
#[derive(Debug, Clone)]
pub struct InterpolScript<'a> {
    pub corners: &'a [PathBuf; 8],
    pub output: &'a Path,
    pub scratch: &'a Path,
    pub teff: f64,
    pub logg: f64,
    pub feh: f64,
    pub nlte: Option<&'a NlteInterpolation>,
}

impl InterpolScript<'_> {
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self.corners.iter().map(|p| quoted(p)).collect();
        lines.push(quoted(self.output));
        lines.push(quoted(self.scratch));
        lines.push(real(self.teff));
        lines.push(real(self.logg));
        lines.push(real(self.feh));
        lines.push(".false.".to_string());
        lines.push(".false.".to_string());
        lines.push("''".to_string());
        if let Some(nlte) = self.nlte {
            lines.push(quoted(&nlte.departure_grid));
            lines.push(quoted(&nlte.aux_file));
            lines.push(NLTE_MICROTURBULENCE_INDEX.to_string());
            lines.push(NLTE_ABUNDANCE.to_string());
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
