//! Background reporter task
//!
//! Wakes at least once per [`MAX_SLEEP`] so cancellation and target
//! completion are noticed promptly, but only touches disk when the
//! configured log/save deadlines have actually passed. Whatever ends the
//! loop, the task finishes with one final snapshot and one final checkpoint.
//!
//! File writes run on the blocking pool and are awaited, so a stalled disk
//! never occupies an executor thread and `stop()` can always time out.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument, Span};

use super::{Shared, SnapshotKind};

/// Longest uninterrupted wait between loop iterations
pub const MAX_SLEEP: Duration = Duration::from_secs(1);

/// Owning handle to a running reporter.
#[derive(Debug)]
pub(crate) struct ReporterHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl ReporterHandle {
    /// Spawn the reporter on `runtime`, instrumented with `span`.
    pub(crate) fn spawn(shared: Arc<Shared>, runtime: &Handle, span: Span) -> Self {
        let cancel = CancellationToken::new();
        let join = runtime.spawn(run(shared, cancel.clone()).instrument(span));
        Self { cancel, join }
    }

    /// Whether the task has already run to completion.
    pub(crate) fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal the task to finalize without waiting for it.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the task and wait up to `timeout` for its final flush.
    ///
    /// Returns `false` if the task did not finish in time. The task is left
    /// detached rather than aborted so a slow final write still completes.
    pub(crate) async fn shutdown(self, timeout: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, self.join).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "reporter task ended abnormally");
                true
            }
            Err(_) => false,
        }
    }
}

async fn run(shared: Arc<Shared>, cancel: CancellationToken) {
    let config = shared.config();
    let target = config.total_trials_target();
    let log_interval = config.log_interval();
    let save_interval = config.save_interval();
    info!(?log_interval, ?save_interval, "reporter started");

    let started = Instant::now();
    let mut next_log = started + log_interval;
    let mut next_save = started + save_interval;

    while !cancel.is_cancelled() {
        if shared.snapshot().trials_run >= target {
            info!(target, "target trials reached, finalizing");
            break;
        }

        let now = Instant::now();
        let sleep_for = next_log
            .saturating_duration_since(now)
            .min(next_save.saturating_duration_since(now))
            .min(MAX_SLEEP);

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(sleep_for) => {}
        }

        // Target was not met at the top of this iteration.
        let now = Instant::now();
        if now >= next_log {
            blocking_io(&shared, |shared| shared.emit_snapshot(SnapshotKind::Progress)).await;
            next_log = now + log_interval;
        }
        if now >= next_save {
            blocking_io(&shared, Shared::save_checkpoint).await;
            debug!("checkpoint saved");
            next_save = now + save_interval;
        }
    }

    blocking_io(&shared, |shared| {
        shared.emit_snapshot(SnapshotKind::Final);
        shared.save_checkpoint();
    })
    .await;
    info!("reporter stopped");
}

async fn blocking_io<F>(shared: &Arc<Shared>, io: F)
where
    F: FnOnce(&Shared) + Send + 'static,
{
    let shared = Arc::clone(shared);
    let span = Span::current();
    if let Err(e) = tokio::task::spawn_blocking(move || span.in_scope(|| io(&shared))).await {
        warn!(error = %e, "reporter file write did not complete");
    }
}
