//! Domain types used throughout the orchestrator.
//!
//! This module defines:
//!
//! - grid rows and their mode enums (`ParameterGridRow`, `OutputMode`, `Modes`)
//! - pipeline selection and failure policy (`Pipeline`, `FailurePolicy`)
//! - canonical artifact naming (`ModelKey`, `naming`)

pub mod naming;
pub mod types;

pub use naming::*;
pub use types::*;
