use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::Wavelengths;

use super::{ABUNDANCE_PLACEHOLDER, fortran_bool, quoted, real};

/// Script for the continuum-opacity stage.
#[derive(Debug, Clone)]
pub struct BabsmaScript<'a> {
    pub wavelengths: Wavelengths,
    pub model: &'a Path,
    /// `false` for interpolated models (first line mentions `INTERPOL`).
    pub marcs_file: bool,
    pub opacity: &'a Path,
    pub metallicity: f64,
    pub alpha: f64,
    pub microturbulence: f64,
}

impl BabsmaScript<'_> {
    pub fn render(&self) -> String {
        let w = &self.wavelengths;
        let mut out = String::new();
        out.push_str(&format!("'LAMBDA_MIN:'  '{}'\n", real(w.min)));
        out.push_str(&format!("'LAMBDA_MAX:'  '{}'\n", real(w.max)));
        out.push_str(&format!("'LAMBDA_STEP:' '{}'\n", real(w.step)));
        out.push_str(&format!("'MODELINPUT:' {}\n", quoted(self.model)));
        out.push_str(&format!("'MARCS-FILE:' '{}'\n", fortran_bool(self.marcs_file)));
        out.push_str(&format!("'MODELOPAC:' {}\n", quoted(self.opacity)));
        out.push_str("'ABUND_SOURCE:' 'magg'\n");
        out.push_str(&format!("'METALLICITY:'    '{}'\n", real(self.metallicity)));
        out.push_str(&format!("'ALPHA/Fe   :'    '{:.2}'\n", self.alpha));
        out.push_str(&format!("'HELIUM     :'    '{ABUNDANCE_PLACEHOLDER}'\n"));
        out.push_str(&format!("'R-PROCESS  :'    '{ABUNDANCE_PLACEHOLDER}'\n"));
        out.push_str(&format!("'S-PROCESS  :'    '{ABUNDANCE_PLACEHOLDER}'\n"));
        out.push_str("'INDIVIDUAL ABUNDANCES:'   '0'\n");
        out.push_str("'XIFIX:' 'T'\n");
        out.push_str(&format!("{}\n", real(self.microturbulence)));
        out
    }
}

/// Whether a model file is an original MARCS model rather than an
/// interpolated one. Unreadable files count as MARCS; the stage itself then
/// reports the problem.
pub fn is_marcs_model(first_line: Option<&str>) -> bool {
    !first_line.is_some_and(|line| line.contains("INTERPOL"))
}

/// [`is_marcs_model`] applied to the first line of the file at `path`.
pub fn model_file_is_marcs(path: &Path) -> bool {
    is_marcs_model(first_line(path).as_deref())
}

fn first_line(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    BufReader::new(file).lines().next()?.ok()
}
