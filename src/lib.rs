//! # trial-tracker: Progress Tracking for Monte Carlo Experiments
//!
//! **Version**: 0.1.0
//!
//! Long Monte Carlo runs execute on many interchangeable backends (a single
//! loop, a thread pool, vectorized batches). Whatever the backend, results
//! flow through one [`Tracker`] that aggregates worker batches in memory,
//! checkpoints resumable state, and appends a time-series performance log.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: Workers only do O(1) arithmetic under a lock; all
//!   I/O happens on the reporter task
//! - **Poka-Yoke safety**: Atomic checkpoint writes (temp file + rename)
//! - **Jidoka**: A final snapshot and checkpoint on every shutdown path
//!
//! ## Data Flow
//!
//! ```text
//! Workers ──update_progress──> Tracker ──(reporter task)──┬──> ProgressStore (checkpoint JSON)
//!                                                         └──> MetricsSink   (performance CSV)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use trial_tracker::{Tracker, TrackerConfig};
//!
//! # async fn example() -> trial_tracker::Result<()> {
//! let config = TrackerConfig::builder("Multithread12", 10_000_000)
//!     .log_interval(Duration::from_secs(10))
//!     .save_interval(Duration::from_secs(20))
//!     .build()?;
//!
//! let tracker = Tracker::new(config)?;
//! tracker.start();
//! // ... workers call tracker.update_progress(solutions, trials) ...
//! tracker.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod progress;
pub mod store;
pub mod tracker;

pub use config::{TrackerConfig, TrackerConfigBuilder};
pub use error::{Error, Result};
pub use metrics::{MetricsRecord, MetricsSink};
pub use progress::ProgressState;
pub use store::{CheckpointRecord, ProgressStore};
pub use tracker::{Tracker, TrackerState};
