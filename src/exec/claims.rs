//! Exclusive production of artifacts.
//!
//! Inside one run, jobs producing the same path take turns on an in-process
//! mutex for that path. Across runs, the producer holds `<artifact>.lock`,
//! created with create-new semantics and removed when the guard drops.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

use crate::error::JobError;

#[derive(Debug, Default)]
struct SlotState {
    busy: bool,
    /// Some job of this run has written the artifact.
    produced: bool,
}

#[derive(Debug, Default)]
struct Slot {
    state: Mutex<SlotState>,
    freed: Condvar,
}

/// Per-path claims shared by every job of a run.
#[derive(Debug, Default)]
pub struct ArtifactClaims {
    paths: DashMap<PathBuf, Arc<Slot>>,
}

/// Held while a job checks for and produces one artifact.
#[derive(Debug)]
pub struct Claim {
    slot: Arc<Slot>,
}

impl ArtifactClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other job of this run holds `path`.
    pub fn claim(&self, path: &Path) -> Claim {
        // Clone the Arc out so the shard lock is released before blocking.
        let slot = self.paths.entry(path.to_path_buf()).or_default().clone();
        {
            let mut state = slot.state.lock();
            while state.busy {
                slot.freed.wait(&mut state);
            }
            state.busy = true;
        }
        Claim { slot }
    }
}

impl Claim {
    /// Whether an earlier holder of this path already wrote it in this run.
    pub fn produced(&self) -> bool {
        self.slot.state.lock().produced
    }

    pub fn mark_produced(&self) {
        self.slot.state.lock().produced = true;
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.slot.state.lock().busy = false;
        self.slot.freed.notify_one();
    }
}

/// Lock file next to an artifact being produced.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn lock_path(artifact: &Path) -> PathBuf {
        let mut name = artifact.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    pub fn acquire(artifact: &Path) -> Result<Self, JobError> {
        let path = Self::lock_path(artifact);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(JobError::Locked { path });
            }
            Err(e) => {
                return Err(JobError::io(format!("creating lock {}", path.display()), e));
            }
        };
        // Owner pid helps the operator judge whether a lock is stale.
        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }

    /// Lock `artifact` for production.
    ///
    /// Another run may have finished the artifact and released its lock after
    /// our caller last looked, so existence is checked again under the lock.
    /// Returns `None` when the artifact is present and `overwrite` is false.
    pub fn acquire_to_produce(artifact: &Path, overwrite: bool) -> Result<Option<Self>, JobError> {
        let lock = Self::acquire(artifact)?;
        if !overwrite && artifact.exists() {
            return Ok(None);
        }
        Ok(Some(lock))
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}
