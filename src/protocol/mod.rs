//! Stdin scripts for the external binaries.
//!
//! Each tool reads a fixed-order script on stdin. One builder per tool owns
//! the field set and ordering; `render()` is pure so the exact bytes can be
//! pinned by tests and copied into the job log.

pub mod babsma;
pub mod bsyn;
pub mod interpol;

pub use babsma::*;
pub use bsyn::*;
pub use interpol::*;

use std::path::Path;

/// Real number as the Fortran readers expect it: shortest round-trip form,
/// always with a decimal point (`6000.0`, `0.01`, `-0.3`).
pub(crate) fn real(value: f64) -> String {
    format!("{value:?}")
}

pub(crate) fn quoted(path: &Path) -> String {
    format!("'{}'", path.display())
}

pub(crate) fn fortran_bool(value: bool) -> &'static str {
    if value { ".true." } else { ".false." }
}

/// Placeholder written for abundance channels the tools accept but the grid
/// does not forward (helium, r-process, s-process).
pub(crate) const ABUNDANCE_PLACEHOLDER: &str = "0.00";
