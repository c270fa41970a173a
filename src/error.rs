//! Error types.
//!
//! Two layers:
//!
//! - `AppError` is a run-level failure carrying the process exit code that
//!   `main` returns (bad configuration, unreadable grid, aborted run).
//! - `JobError` is the per-job taxonomy. It never crosses the scheduler: every
//!   job converts it into a `Failed` status plus a line in the job's log.

use std::path::PathBuf;

use thiserror::Error;

use crate::exec::Stage;

/// Missing environment, missing binary, invalid reference grid.
pub const EXIT_CONFIG: u8 = 2;
/// Unreadable or malformed parameter grid, naming collisions.
pub const EXIT_GRID: u8 = 3;
/// The abort-on-failure policy stopped the run before the grid completed.
pub const EXIT_ABORTED: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, message)
    }

    pub fn grid(message: impl Into<String>) -> Self {
        Self::new(EXIT_GRID, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a single job failed.
#[derive(Debug, Error)]
pub enum JobError {
    /// Invalid mode combination or missing auxiliary configuration.
    /// No external process has been invoked.
    #[error("configuration error: {0}")]
    Config(String),

    /// Required input artifacts are absent. Every expected path is listed.
    #[error("{what} missing: {}", display_paths(missing))]
    Precondition { what: String, missing: Vec<PathBuf> },

    /// The external process could not be started.
    #[error("{stage} could not be started ({}): {source}", program.display())]
    Spawn {
        stage: Stage,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external process exited unsuccessfully.
    #[error("{stage} failed with {}", display_code(*code))]
    Process { stage: Stage, code: Option<i32> },

    /// Another orchestrator invocation holds the artifact.
    #[error("artifact is locked by another run: {} (remove it if stale)", path.display())]
    Locked { path: PathBuf },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        JobError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short category tag used in console summaries and the JSON report.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Config(_) => "config",
            JobError::Precondition { .. } => "precondition",
            JobError::Spawn { .. } | JobError::Process { .. } => "process",
            JobError::Locked { .. } => "locked",
            JobError::Io { .. } => "io",
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_code(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
