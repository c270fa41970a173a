//! External process invocation.
//!
//! A stage hands the runner a program, a working directory and a rendered
//! stdin script. The child's stdout and stderr go straight into the job log
//! file; the runner only reports the exit status. No timeout is applied.

pub mod claims;

pub use claims::*;

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::joblog::JobLog;

/// Which external tool a stage runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Interpolation,
    Continuum,
    LineSynthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Interpolation => "interpol",
            Stage::Continuum => "babsma",
            Stage::LineSynthesis => "bsyn",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub stage: Stage,
    pub program: &'a Path,
    pub cwd: &'a Path,
    pub script: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the child was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs one external process to completion.
///
/// `Err` means the process could not be started or waited on; a non-zero
/// exit is reported through `ProcessExit`.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, invocation: &Invocation<'_>, log: &mut JobLog) -> io::Result<ProcessExit>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation<'_>, log: &mut JobLog) -> io::Result<ProcessExit> {
        let stdout = log.process_sink()?;
        let stderr = stdout.try_clone()?;

        let mut child = Command::new(invocation.program)
            .current_dir(invocation.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()?;

        tracing::debug!(
            stage = %invocation.stage,
            program = %invocation.program.display(),
            pid = child.id(),
            "spawned"
        );

        if let Some(mut stdin) = child.stdin.take() {
            // A tool that exits before reading all of its script closes the
            // pipe early; its exit status tells the real story.
            match stdin.write_all(invocation.script.as_bytes()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e);
                }
            }
        }

        let status = child.wait()?;
        Ok(ProcessExit { code: status.code() })
    }
}
