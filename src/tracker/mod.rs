//! Progress tracker
//!
//! The tracker owns the cumulative [`ProgressState`] of one compute type.
//! Workers push deltas through [`Tracker::update_progress`], which only does
//! O(1) arithmetic under a mutex; all file I/O happens on the reporter task
//! so workers never wait on disk.
//!
//! ## Lifecycle
//!
//! ```text
//! Constructed ──start()──> Running ──stop()──> Stopped
//!                              ^                  │
//!                              └─────start()──────┘
//! ```
//!
//! `start()` is a no-op once the target is reached; `stop()` is idempotent.
//!
//! ## Example
//!
//! ```rust,no_run
//! use trial_tracker::{Tracker, TrackerConfig};
//!
//! # async fn example() -> trial_tracker::Result<()> {
//! let config = TrackerConfig::new("Simple", 1_000_000)?;
//! let tracker = Tracker::new(config)?;
//!
//! tracker.start();
//! tracker.update_progress(491, 1_000);
//! tracker.stop().await;
//!
//! println!("p = {:.6}", tracker.final_probability());
//! # Ok(())
//! # }
//! ```

mod reporter;

pub use reporter::MAX_SLEEP;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, info, info_span, warn, Span};

use crate::config::TrackerConfig;
use crate::metrics::{MetricsRecord, MetricsSink};
use crate::progress::ProgressState;
use crate::store::ProgressStore;
use crate::{Error, Result};

use reporter::ReporterHandle;

/// Lifecycle state of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    /// Created, reporter never started.
    Constructed,
    /// Reporter task spawned.
    Running,
    /// Reporter stopped and flushed.
    Stopped,
}

/// Why a snapshot was taken; shows up in the console log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SnapshotKind {
    Loaded,
    Progress,
    Final,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loaded => "loaded",
            Self::Progress => "progress",
            Self::Final => "final",
        })
    }
}

/// State shared between the tracker and its reporter task.
#[derive(Debug)]
pub(crate) struct Shared {
    config: TrackerConfig,
    progress: Mutex<ProgressState>,
}

impl Shared {
    pub(crate) const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn progress(&self) -> MutexGuard<'_, ProgressState> {
        // Plain counters: a panicked holder cannot leave them half-written.
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> ProgressState {
        *self.progress()
    }

    pub(crate) fn emit_snapshot(&self, kind: SnapshotKind) {
        let record = MetricsRecord::snapshot(self.snapshot());
        info!(
            time = %record.timestamp_display(),
            trials = record.trials_run(),
            solutions = record.solutions_count(),
            probability = format_args!("{:.10}", record.probability()),
            "{kind}"
        );
        MetricsSink::append(self.config.metrics_path(), &record);
    }

    pub(crate) fn save_checkpoint(&self) {
        ProgressStore::save(self.config.checkpoint_path(), self.snapshot());
    }
}

#[derive(Debug)]
struct ReporterSlot {
    state: TrackerState,
    handle: Option<ReporterHandle>,
}

/// Aggregates worker results and drives periodic persistence.
///
/// Cheap to share: wrap in an [`Arc`] and hand clones to worker threads.
/// Every method takes `&self`.
#[derive(Debug)]
pub struct Tracker {
    shared: Arc<Shared>,
    span: Span,
    runtime: Handle,
    reporter: Mutex<ReporterSlot>,
}

impl Tracker {
    /// Create a tracker, resuming from its checkpoint if one exists.
    ///
    /// Appends one "loaded" snapshot to the metrics log immediately, whether
    /// or not the reporter is ever started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation and
    /// [`Error::RuntimeUnavailable`] when called outside a Tokio runtime.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let span = info_span!("tracker", compute_type = %config.compute_type());
        Self::with_span(config, span)
    }

    /// Create a tracker that logs under the given span.
    ///
    /// # Errors
    ///
    /// Same as [`Tracker::new`].
    pub fn with_span(config: TrackerConfig, span: Span) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| Error::RuntimeUnavailable(e.to_string()))?;

        let initial = span.in_scope(|| ProgressStore::load(config.checkpoint_path()));
        let shared = Arc::new(Shared {
            config,
            progress: Mutex::new(initial),
        });
        span.in_scope(|| shared.emit_snapshot(SnapshotKind::Loaded));

        Ok(Self {
            shared,
            span,
            runtime,
            reporter: Mutex::new(ReporterSlot {
                state: TrackerState::Constructed,
                handle: None,
            }),
        })
    }

    /// Configuration this tracker was built with.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        self.shared.config()
    }

    /// Span all of this tracker's log events are recorded under.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Current lifecycle state.
    ///
    /// A reporter that finalized on its own after reaching the target
    /// reports [`TrackerState::Stopped`] without waiting for `stop()`.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        let slot = self.slot();
        let finished = slot.handle.as_ref().is_some_and(ReporterHandle::is_finished);
        if slot.state == TrackerState::Running && finished {
            TrackerState::Stopped
        } else {
            slot.state
        }
    }

    /// Add one completed batch to the totals.
    ///
    /// Batches with zero trials are ignored. A batch claiming more solutions
    /// than trials is rejected with a warning so the totals stay consistent.
    pub fn update_progress(&self, batch_solutions: u64, batch_trials: u64) {
        if batch_trials == 0 {
            return;
        }
        if batch_solutions > batch_trials {
            let _enter = self.span.enter();
            warn!(batch_solutions, batch_trials, "rejecting batch with more solutions than trials");
            return;
        }
        self.shared.progress().absorb(batch_solutions, batch_trials);
    }

    /// Current `(solutions, trials_run)`.
    #[must_use]
    pub fn current_progress(&self) -> (u64, u64) {
        let state = self.shared.snapshot();
        (state.solutions_count, state.trials_run)
    }

    /// Current totals as a [`ProgressState`].
    #[must_use]
    pub fn snapshot(&self) -> ProgressState {
        self.shared.snapshot()
    }

    /// Trials still needed to reach the target.
    #[must_use]
    pub fn remaining_trials(&self) -> u64 {
        self.config()
            .total_trials_target()
            .saturating_sub(self.shared.snapshot().trials_run)
    }

    /// Whether the target has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining_trials() == 0
    }

    /// Probability estimate; see [`ProgressState::probability_against`].
    #[must_use]
    pub fn final_probability(&self) -> f64 {
        self.shared
            .snapshot()
            .probability_against(self.config().total_trials_target())
    }

    /// Spawn the reporter and return immediately.
    ///
    /// No-op when the target is already reached (the "loaded" snapshot
    /// captured the final state) or when the reporter is already running.
    pub fn start(&self) {
        let _enter = self.span.enter();
        let mut slot = self.slot();

        if slot.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("reporter already running");
            return;
        }

        let trials_run = self.shared.snapshot().trials_run;
        let target = self.config().total_trials_target();
        if trials_run >= target {
            info!(trials_run, target, "all trials completed previously, reporter not started");
            return;
        }

        slot.handle = Some(ReporterHandle::spawn(
            Arc::clone(&self.shared),
            &self.runtime,
            self.span.clone(),
        ));
        slot.state = TrackerState::Running;
    }

    /// Stop the reporter and wait for its final flush.
    ///
    /// This is the only way to guarantee the final snapshot and checkpoint
    /// are written; dropping the tracker merely requests them.
    ///
    /// Waits at most [`TrackerConfig::stop_timeout`]; on timeout a warning
    /// is logged and the call returns anyway. Calling it again, or on a
    /// tracker that never started, does nothing.
    pub async fn stop(&self) {
        let handle = {
            let mut slot = self.slot();
            let handle = slot.handle.take();
            if handle.is_some() {
                slot.state = TrackerState::Stopped;
            }
            handle
        };

        let Some(handle) = handle else {
            self.span.in_scope(|| debug!("reporter not running"));
            return;
        };

        let timeout = self.config().stop_timeout();
        self.span.in_scope(|| info!("stop requested"));
        if !handle.shutdown(timeout).await {
            self.span
                .in_scope(|| warn!(?timeout, "reporter did not stop in time"));
        }
    }

    fn slot(&self) -> MutexGuard<'_, ReporterSlot> {
        self.reporter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Dropping a running tracker cancels its reporter, which then finalizes on
/// its own. This is best-effort: if the runtime shuts down first the final
/// flush is lost, so call [`Tracker::stop`] when the flush must land.
impl Drop for Tracker {
    fn drop(&mut self) {
        if let Some(handle) = self.slot().handle.take() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn config(dir: &TempDir, target: u64) -> TrackerConfig {
        TrackerConfig::builder("Unit", target)
            .directory(dir.path())
            .log_interval(Duration::from_millis(50))
            .save_interval(Duration::from_millis(80))
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let dir = tempdir().unwrap();
        let err = Tracker::new(config(&dir, 100)).unwrap_err();
        assert!(matches!(err, Error::RuntimeUnavailable(_)));
    }

    #[tokio::test]
    async fn test_new_writes_loaded_snapshot() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        let records = MetricsSink::read_log(tracker.config().metrics_path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].trials_run(), 0);
        assert_eq!(tracker.state(), TrackerState::Constructed);
    }

    #[tokio::test]
    async fn test_update_progress_accumulates() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        tracker.update_progress(3, 10);
        tracker.update_progress(4, 10);
        assert_eq!(tracker.current_progress(), (7, 20));
        assert_eq!(tracker.remaining_trials(), 80);
        assert!(!tracker.is_complete());
    }

    #[tokio::test]
    async fn test_zero_trial_batch_ignored() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        tracker.update_progress(5, 0);
        assert_eq!(tracker.current_progress(), (0, 0));
    }

    #[tokio::test]
    async fn test_inconsistent_batch_rejected() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        tracker.update_progress(6, 5);
        assert_eq!(tracker.current_progress(), (0, 0));
    }

    #[tokio::test]
    async fn test_final_probability_against_target() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        tracker.update_progress(60, 120);
        assert!((tracker.final_probability() - 0.60).abs() < f64::EPSILON);
        assert!(tracker.is_complete());
    }

    #[tokio::test]
    async fn test_start_stop_transitions() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        tracker.start();
        assert_eq!(tracker.state(), TrackerState::Running);
        tracker.stop().await;
        assert_eq!(tracker.state(), TrackerState::Stopped);
    }

    #[tokio::test]
    async fn test_start_twice_keeps_single_reporter() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        tracker.start();
        tracker.start();
        tracker.stop().await;

        // loaded + exactly one final snapshot
        let records = MetricsSink::read_log(tracker.config().metrics_path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_state_stopped_once_reporter_finalizes_at_target() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 10)).unwrap();
        tracker.start();
        tracker.update_progress(4, 10);

        let mut finished = false;
        for _ in 0..300 {
            if tracker.state() == TrackerState::Stopped {
                finished = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(finished, "reporter should finalize without stop()");
        assert_eq!(
            ProgressStore::load(tracker.config().checkpoint_path()),
            ProgressState::new(4, 10)
        );
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        tracker.stop().await;
        assert_eq!(tracker.state(), TrackerState::Constructed);
        assert!(!tracker.config().checkpoint_path().exists());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let dir = tempdir().unwrap();
        let tracker = Tracker::new(config(&dir, 100)).unwrap();
        tracker.start();
        tracker.stop().await;
        tracker.update_progress(1, 2);
        tracker.start();
        assert_eq!(tracker.state(), TrackerState::Running);
        tracker.stop().await;
        assert_eq!(
            ProgressStore::load(tracker.config().checkpoint_path()),
            ProgressState::new(1, 2)
        );
    }

    #[test]
    fn test_snapshot_kind_labels() {
        assert_eq!(SnapshotKind::Loaded.to_string(), "loaded");
        assert_eq!(SnapshotKind::Progress.to_string(), "progress");
        assert_eq!(SnapshotKind::Final.to_string(), "final");
    }
}
