//! Cumulative progress of an experiment

use serde::{Deserialize, Serialize};

/// Cumulative solutions and trials for one compute type.
///
/// Invariant: `solutions_count <= trials_run`. Every constructor and mutator
/// in this crate preserves it; [`ProgressState::is_consistent`] checks
/// values that arrive from outside (checkpoint files).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressState {
    /// Trials that produced a solution
    pub solutions_count: u64,
    /// Trials executed so far
    pub trials_run: u64,
}

impl ProgressState {
    /// Create a state from raw counts.
    #[must_use]
    pub const fn new(solutions_count: u64, trials_run: u64) -> Self {
        Self {
            solutions_count,
            trials_run,
        }
    }

    /// Whether `solutions_count <= trials_run` holds.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.solutions_count <= self.trials_run
    }

    /// Add one batch to the totals.
    pub fn absorb(&mut self, batch_solutions: u64, batch_trials: u64) {
        self.solutions_count = self.solutions_count.saturating_add(batch_solutions);
        self.trials_run = self.trials_run.saturating_add(batch_trials);
    }

    /// Observed ratio `solutions / trials_run`, or `0.0` with no trials.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn observed_probability(&self) -> f64 {
        if self.trials_run == 0 {
            0.0
        } else {
            self.solutions_count as f64 / self.trials_run as f64
        }
    }

    /// Estimate reported at the end of a run.
    ///
    /// Once `trials_run` reaches a positive `target`, the target is the
    /// denominator so runs that overshoot by a partial batch stay comparable.
    /// Otherwise this is [`observed_probability`](Self::observed_probability).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn probability_against(&self, target: u64) -> f64 {
        if target > 0 && self.trials_run >= target {
            self.solutions_count as f64 / target as f64
        } else {
            self.observed_probability()
        }
    }
}
