//! Bounded job scheduler.
//!
//! Rows are dispatched from the calling thread in grid order onto a rayon
//! pool. A permit pool with one permit per worker provides the backpressure:
//! the dispatcher blocks once `workers` jobs are in flight and admits exactly
//! one more row per finished job. Completion order is unconstrained.
//!
//! Rows whose target already exists are skipped on the dispatcher and never
//! take a permit. Under [`FailurePolicy::Abort`] the first failed job stops
//! all further dispatch; jobs already running are allowed to finish, and rows
//! never dispatched are reported as `NotStarted`.

pub mod permits;

pub use permits::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::FailurePolicy;
use crate::error::{AppError, JobError};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub policy: FailurePolicy,
}

/// Terminal state of one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Succeeded,
    Failed { kind: String, message: String },
    Skipped,
    NotStarted,
}

impl RowStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RowStatus::Succeeded => "OK",
            RowStatus::Failed { .. } => "FAILED",
            RowStatus::Skipped => "SKIPPED",
            RowStatus::NotStarted => "NOT STARTED",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// One entry per input row, in grid order.
    pub outcomes: Vec<RowStatus>,
    pub workers: usize,
    pub policy: FailurePolicy,
    pub peak_in_flight: usize,
    pub elapsed_secs: f64,
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_started: usize,
}

impl RunReport {
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for outcome in &self.outcomes {
            match outcome {
                RowStatus::Succeeded => counts.succeeded += 1,
                RowStatus::Failed { .. } => counts.failed += 1,
                RowStatus::Skipped => counts.skipped += 1,
                RowStatus::NotStarted => counts.not_started += 1,
            }
        }
        counts
    }
}

/// Run `execute` for every item not already `is_done`.
///
/// `is_done` runs on the dispatching thread, `execute` on pool workers.
pub fn run_grid<T, D, E>(
    items: &[T],
    config: SchedulerConfig,
    is_done: D,
    execute: E,
) -> Result<RunReport, AppError>
where
    T: Sync,
    D: Fn(usize, &T) -> bool,
    E: Fn(usize, &T) -> Result<(), JobError> + Sync,
{
    let workers = config.workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("tsgrid-worker-{i}"))
        .build()
        .map_err(|e| AppError::config(format!("Failed to start worker pool: {e}")))?;

    let started = Instant::now();
    let permits = Permits::new(workers);
    let aborted = AtomicBool::new(false);
    let outcomes = Mutex::new(vec![RowStatus::NotStarted; items.len()]);

    pool.in_place_scope(|scope| {
        for (idx, item) in items.iter().enumerate() {
            if aborted.load(Ordering::SeqCst) {
                break;
            }
            if is_done(idx, item) {
                outcomes.lock()[idx] = RowStatus::Skipped;
                continue;
            }

            let permit = permits.acquire();
            if aborted.load(Ordering::SeqCst) {
                break;
            }

            let (execute, outcomes, aborted) = (&execute, &outcomes, &aborted);
            scope.spawn(move |_| {
                let status = match execute(idx, item) {
                    Ok(()) => RowStatus::Succeeded,
                    Err(err) => {
                        if config.policy == FailurePolicy::Abort {
                            aborted.store(true, Ordering::SeqCst);
                        }
                        RowStatus::Failed {
                            kind: err.kind().to_string(),
                            message: err.to_string(),
                        }
                    }
                };
                outcomes.lock()[idx] = status;
                // Released only after the abort flag is visible.
                drop(permit);
            });
        }
    });

    let was_aborted = aborted.load(Ordering::SeqCst);
    if was_aborted {
        tracing::warn!("abort-on-failure: dispatch stopped after a failed job");
    }

    Ok(RunReport {
        outcomes: outcomes.into_inner(),
        workers,
        policy: config.policy,
        peak_in_flight: permits.peak(),
        elapsed_secs: started.elapsed().as_secs_f64(),
        aborted: was_aborted,
    })
}
