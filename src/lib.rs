//! `ts-grid` library crate.
//!
//! The binary (`tsgrid`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning the real scientific binaries
//! - the scheduler and stages can be driven from tests with a stand-in runner

pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod exec;
pub mod grid;
pub mod io;
pub mod joblog;
pub mod protocol;
pub mod report;
pub mod scheduler;
pub mod stages;
