//! Tracker configuration
//!
//! File locations are derived, never passed in whole: every compute type
//! gets `<dir>/<prefix>-<compute_type>.<ext>` so concurrent trackers with
//! distinct labels never share a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default interval between metrics snapshots
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Default interval between checkpoint saves
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(20);

/// Extra slack `stop()` grants the reporter beyond the longest interval
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// Default checkpoint file prefix
pub const DEFAULT_CHECKPOINT_PREFIX: &str = "progress";

/// Default metrics log file prefix
pub const DEFAULT_METRICS_PREFIX: &str = "performance";

/// Tracker configuration, fixed for the tracker's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    compute_type: String,
    total_trials_target: u64,
    log_interval: Duration,
    save_interval: Duration,
    checkpoint_path: PathBuf,
    metrics_path: PathBuf,
}

impl TrackerConfig {
    /// Configuration with default intervals and file names in the working
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the compute type or target is
    /// rejected by [`validate`](Self::validate).
    pub fn new(compute_type: impl Into<String>, total_trials_target: u64) -> Result<Self> {
        Self::builder(compute_type, total_trials_target).build()
    }

    /// Create a builder for a configuration with optional fields.
    #[must_use]
    pub fn builder(
        compute_type: impl Into<String>,
        total_trials_target: u64,
    ) -> TrackerConfigBuilder {
        TrackerConfigBuilder::new(compute_type, total_trials_target)
    }

    /// Label namespacing this tracker's files.
    #[must_use]
    pub fn compute_type(&self) -> &str {
        &self.compute_type
    }

    /// Nominal number of trials for the run.
    #[must_use]
    pub const fn total_trials_target(&self) -> u64 {
        self.total_trials_target
    }

    /// Cadence of metrics snapshots.
    #[must_use]
    pub const fn log_interval(&self) -> Duration {
        self.log_interval
    }

    /// Cadence of checkpoint saves.
    #[must_use]
    pub const fn save_interval(&self) -> Duration {
        self.save_interval
    }

    /// Checkpoint file location.
    #[must_use]
    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Metrics log location.
    #[must_use]
    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    /// Upper bound on how long `stop()` waits for the final flush.
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        self.log_interval.max(self.save_interval) + STOP_GRACE
    }

    /// Check the invariants the tracker relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the compute type is empty or
    /// contains a path separator, the target is zero, or an interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.compute_type.trim().is_empty() {
            return Err(Error::InvalidConfig("compute type must not be empty".to_string()));
        }
        if self.compute_type.contains(['/', '\\']) {
            return Err(Error::InvalidConfig(format!(
                "compute type '{}' must not contain path separators",
                self.compute_type
            )));
        }
        if self.total_trials_target == 0 {
            return Err(Error::InvalidConfig("total trials target must be positive".to_string()));
        }
        if self.log_interval.is_zero() || self.save_interval.is_zero() {
            return Err(Error::InvalidConfig(format!(
                "intervals must be positive (log: {:?}, save: {:?})",
                self.log_interval, self.save_interval
            )));
        }
        Ok(())
    }
}

/// Builder for `TrackerConfig`.
#[derive(Debug)]
pub struct TrackerConfigBuilder {
    compute_type: String,
    total_trials_target: u64,
    log_interval: Duration,
    save_interval: Duration,
    directory: PathBuf,
    checkpoint_prefix: String,
    metrics_prefix: String,
    checkpoint_extension: String,
    metrics_extension: String,
}

impl TrackerConfigBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(compute_type: impl Into<String>, total_trials_target: u64) -> Self {
        Self {
            compute_type: compute_type.into(),
            total_trials_target,
            log_interval: DEFAULT_LOG_INTERVAL,
            save_interval: DEFAULT_SAVE_INTERVAL,
            directory: PathBuf::from("."),
            checkpoint_prefix: DEFAULT_CHECKPOINT_PREFIX.to_string(),
            metrics_prefix: DEFAULT_METRICS_PREFIX.to_string(),
            checkpoint_extension: "json".to_string(),
            metrics_extension: "csv".to_string(),
        }
    }

    /// Set the metrics snapshot interval.
    #[must_use]
    pub const fn log_interval(mut self, interval: Duration) -> Self {
        self.log_interval = interval;
        self
    }

    /// Set the checkpoint save interval.
    #[must_use]
    pub const fn save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Directory holding both files.
    #[must_use]
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Checkpoint file prefix (default `progress`).
    #[must_use]
    pub fn checkpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.checkpoint_prefix = prefix.into();
        self
    }

    /// Metrics log prefix (default `performance`).
    #[must_use]
    pub fn metrics_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metrics_prefix = prefix.into();
        self
    }

    /// Metrics log extension (default `csv`).
    #[must_use]
    pub fn metrics_extension(mut self, extension: impl Into<String>) -> Self {
        self.metrics_extension = extension.into();
        self
    }

    /// Build and validate the `TrackerConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if validation fails.
    pub fn build(self) -> Result<TrackerConfig> {
        let checkpoint_path = derive_path(
            &self.directory,
            &self.checkpoint_prefix,
            &self.compute_type,
            &self.checkpoint_extension,
        );
        let metrics_path = derive_path(
            &self.directory,
            &self.metrics_prefix,
            &self.compute_type,
            &self.metrics_extension,
        );
        let config = TrackerConfig {
            compute_type: self.compute_type,
            total_trials_target: self.total_trials_target,
            log_interval: self.log_interval,
            save_interval: self.save_interval,
            checkpoint_path,
            metrics_path,
        };
        config.validate()?;
        Ok(config)
    }
}

fn derive_path(directory: &Path, prefix: &str, compute_type: &str, extension: &str) -> PathBuf {
    directory.join(format!("{prefix}-{compute_type}.{extension}"))
}
