use std::path::Path;

use crate::domain::{GeometryMode, OutputMode, Wavelengths};

use super::{ABUNDANCE_PLACEHOLDER, fortran_bool, quoted, real};

/// Script for the line-synthesis stage.
#[derive(Debug, Clone)]
pub struct BsynScript<'a> {
    pub nlte: bool,
    pub nlte_info_file: &'a Path,
    pub wavelengths: Wavelengths,
    pub output_mode: OutputMode,
    pub opacity: &'a Path,
    pub result: &'a Path,
    pub metallicity: f64,
    pub alpha: f64,
    pub linelist_file: &'a Path,
    pub geometry: GeometryMode,
    pub microturbulence: f64,
}

impl BsynScript<'_> {
    pub fn render(&self) -> String {
        let w = &self.wavelengths;
        let mut out = String::new();
        out.push_str(&format!("'NLTE :'          '{}'\n", fortran_bool(self.nlte)));
        out.push_str(&format!("'NLTEINFOFILE:'  {}\n", quoted(self.nlte_info_file)));
        out.push_str(&format!("'LAMBDA_MIN:'     '{}'\n", real(w.min)));
        out.push_str(&format!("'LAMBDA_MAX:'     '{}'\n", real(w.max)));
        out.push_str(&format!("'LAMBDA_STEP:'    '{}'\n", real(w.step)));
        out.push_str(&format!("'INTENSITY/FLUX:' '{}'\n", self.output_mode.script_value()));
        out.push_str(&format!("'MODELOPAC:' {}\n", quoted(self.opacity)));
        out.push_str(&format!("'RESULTFILE :' {}\n", quoted(self.result)));
        out.push_str("'ABUND_SOURCE:'   'magg'\n");
        out.push_str(&format!("'METALLICITY:'    '{}'\n", real(self.metallicity)));
        out.push_str(&format!("'ALPHA/Fe   :'    '{:.2}'\n", self.alpha));
        out.push_str(&format!("'HELIUM     :'    '{ABUNDANCE_PLACEHOLDER}'\n"));
        out.push_str(&format!("'R-PROCESS  :'    '{ABUNDANCE_PLACEHOLDER}'\n"));
        out.push_str(&format!("'S-PROCESS  :'    '{ABUNDANCE_PLACEHOLDER}'\n"));
        out.push_str("'INDIVIDUAL ABUNDANCES:'   '0'\n");
        out.push_str("'ISOTOPES : ' '0'\n");
        out.push_str(&format!("'LIST_OF_LINELISTS:' {}\n", quoted(self.linelist_file)));
        out.push_str(&format!("'SPHERICAL:'  '{}'\n", self.geometry.spherical_flag()));
        // Angular quadrature.
        out.push_str("  30\n  300.00\n  15\n");
        out.push_str(&format!("  {:.2}\n", self.microturbulence));
        out
    }
}
