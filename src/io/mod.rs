//! Input/output helpers.
//!
//! - JSON run summary (`summary`)

pub mod summary;

pub use summary::*;
