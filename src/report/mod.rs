//! Terminal output: run header, dry-run plan, bracket listing, summary.
//!
//! Formatting lives in one place so the orchestration code stays free of
//! presentation details.

pub mod format;

pub use format::*;
