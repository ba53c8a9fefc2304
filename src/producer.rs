//! Pluggable trial producers
//!
//! Producers know nothing about tracker internals. They depend only on the
//! [`ProgressSink`] contract: report each completed batch once, with
//! `trials > 0` and `solutions <= trials`. The execution strategy is a
//! [`Backend`]; what a trial computes is a [`BatchKernel`].
//!
//! ```rust,no_run
//! use trial_tracker::producer::{Backend, BatchDriver};
//! use trial_tracker::{Tracker, TrackerConfig};
//!
//! # async fn example() -> trial_tracker::Result<()> {
//! let tracker = Tracker::new(TrackerConfig::new("Halves", 1_000_000)?)?;
//! tracker.start();
//!
//! let driver = BatchDriver::new(Backend::Scalar, 10_000)?;
//! driver.run(&tracker, &|trials: u64| trials / 2)?;
//!
//! tracker.stop().await;
//! # Ok(())
//! # }
//! ```

use crate::tracker::Tracker;
use crate::{Error, Result};

/// Destination for completed batches.
pub trait ProgressSink: Send + Sync {
    /// Report one completed batch.
    fn update_progress(&self, batch_solutions: u64, batch_trials: u64);

    /// Current `(solutions, trials_run)`.
    fn current_progress(&self) -> (u64, u64);

    /// Nominal number of trials for the run.
    fn total_trials_target(&self) -> u64;
}

impl ProgressSink for Tracker {
    fn update_progress(&self, batch_solutions: u64, batch_trials: u64) {
        Self::update_progress(self, batch_solutions, batch_trials);
    }

    fn current_progress(&self) -> (u64, u64) {
        Self::current_progress(self)
    }

    fn total_trials_target(&self) -> u64 {
        self.config().total_trials_target()
    }
}

/// Runs a batch of independent trials.
pub trait BatchKernel: Sync {
    /// Run `trials` trials and return how many produced a solution.
    fn run_batch(&self, trials: u64) -> u64;
}

impl<F> BatchKernel for F
where
    F: Fn(u64) -> u64 + Sync,
{
    fn run_batch(&self, trials: u64) -> u64 {
        self(trials)
    }
}

/// Execution strategy for batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Batches run one after another on the calling thread.
    Scalar,
    /// Batches run concurrently on a dedicated rayon pool.
    #[cfg(feature = "rayon")]
    ThreadPool {
        /// Number of worker threads
        workers: usize,
    },
}

/// Batch sizes needed to go from `start` trials to `target`.
///
/// Every batch is `batch_size` except the last, which is trimmed so the
/// plan lands exactly on the target.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    next: u64,
    target: u64,
    batch_size: u64,
}

impl BatchPlan {
    /// Plan batches from `start` up to `target`.
    #[must_use]
    pub const fn new(start: u64, target: u64, batch_size: u64) -> Self {
        Self {
            next: start,
            target,
            batch_size,
        }
    }
}

impl Iterator for BatchPlan {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let remaining = self.target.saturating_sub(self.next);
        if remaining == 0 || self.batch_size == 0 {
            return None;
        }
        let size = remaining.min(self.batch_size);
        self.next += size;
        Some(size)
    }
}

/// Dispatches batches to a [`BatchKernel`] and reports them to a sink.
#[derive(Debug, Clone, Copy)]
pub struct BatchDriver {
    backend: Backend,
    batch_size: u64,
}

impl BatchDriver {
    /// Create a driver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero batch size or a thread
    /// pool with no workers.
    pub fn new(backend: Backend, batch_size: u64) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".to_string()));
        }
        #[cfg(feature = "rayon")]
        if let Backend::ThreadPool { workers: 0 } = backend {
            return Err(Error::InvalidConfig("thread pool needs at least one worker".to_string()));
        }
        Ok(Self {
            backend,
            batch_size,
        })
    }

    /// Configured backend.
    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    /// Run batches until the sink's target is covered.
    ///
    /// Resumes from the sink's current trial count, so trials restored from
    /// a checkpoint are not repeated. Blocks until every batch has been
    /// reported; call from `spawn_blocking` inside async code.
    ///
    /// Returns the number of trials submitted by this call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`] if the worker pool cannot be
    /// built.
    pub fn run<S, K>(&self, sink: &S, kernel: &K) -> Result<u64>
    where
        S: ProgressSink + ?Sized,
        K: BatchKernel + ?Sized,
    {
        let (_, already_run) = sink.current_progress();
        let plan = BatchPlan::new(already_run, sink.total_trials_target(), self.batch_size);
        let submitted = sink.total_trials_target().saturating_sub(already_run);

        match self.backend {
            Backend::Scalar => {
                for trials in plan {
                    sink.update_progress(kernel.run_batch(trials), trials);
                }
            }
            #[cfg(feature = "rayon")]
            Backend::ThreadPool { workers } => {
                use rayon::iter::{ParallelBridge, ParallelIterator};

                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| Error::RuntimeUnavailable(e.to_string()))?;
                pool.install(|| {
                    plan.par_bridge().for_each(|trials| {
                        sink.update_progress(kernel.run_batch(trials), trials);
                    });
                });
            }
        }

        Ok(submitted)
    }
}
