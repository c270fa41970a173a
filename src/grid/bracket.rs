//! Bracketing a target value on a sorted reference axis.
//!
//! Policy:
//! - `target <= grid[0]` returns `(grid[0], grid[1])`
//! - `target >= grid[last]` returns `(grid[last-1], grid[last])`
//! - otherwise the unique adjacent pair with `low <= target < high`
//!
//! Edge targets extrapolate from the outermost pair instead of collapsing to a
//! single point; the interpolator always receives two distinct values per axis.

use serde::Serialize;
use thiserror::Error;

/// Two adjacent reference values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bracket {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BracketError {
    #[error("reference axis needs at least 2 values, got {0}")]
    TooFewValues(usize),
    #[error("reference axis is not strictly ascending at index {0}")]
    NotAscending(usize),
    #[error("target {0} is not a finite number")]
    NonFiniteTarget(f64),
}

/// Bracket `target` on `grid` (sorted ascending, at least 2 values).
pub fn bracket(target: f64, grid: &[f64]) -> Result<Bracket, BracketError> {
    if grid.len() < 2 {
        return Err(BracketError::TooFewValues(grid.len()));
    }
    if !target.is_finite() {
        return Err(BracketError::NonFiniteTarget(target));
    }

    let last = grid.len() - 1;
    if target <= grid[0] {
        return Ok(Bracket {
            low: grid[0],
            high: grid[1],
        });
    }
    if target >= grid[last] {
        return Ok(Bracket {
            low: grid[last - 1],
            high: grid[last],
        });
    }

    for (i, pair) in grid.windows(2).enumerate() {
        if !(pair[0] < pair[1]) {
            return Err(BracketError::NotAscending(i + 1));
        }
        if pair[0] <= target && target < pair[1] {
            return Ok(Bracket {
                low: pair[0],
                high: pair[1],
            });
        }
    }

    // Unreachable for an ascending axis.
    Err(BracketError::NotAscending(last))
}

/// Validate that an axis can be bracketed.
pub fn validate_axis(grid: &[f64]) -> Result<(), BracketError> {
    if grid.len() < 2 {
        return Err(BracketError::TooFewValues(grid.len()));
    }
    for (i, pair) in grid.windows(2).enumerate() {
        if !(pair[0].is_finite() && pair[1].is_finite() && pair[0] < pair[1]) {
            return Err(BracketError::NotAscending(i + 1));
        }
    }
    Ok(())
}
