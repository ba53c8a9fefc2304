//! Time-series performance log
//!
//! Append-only delimited text. The header is written once, when the file is
//! absent or empty; every later call appends exactly one line and never
//! touches earlier ones. Downstream throughput reports parse these files, so
//! the line format is a contract:
//!
//! ```text
//! Timestamp, TrialsRun, SolutionsFound, Probability
//! 2025-06-01 12:00:00.123, 20, 10, 0.5000000000
//! ```

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use tracing::warn;

use crate::progress::ProgressState;
use crate::{Error, Result};

/// First line of every metrics log.
pub const METRICS_HEADER: &str = "Timestamp, TrialsRun, SolutionsFound, Probability";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One timestamped observation of cumulative progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsRecord {
    timestamp: NaiveDateTime,
    trials_run: u64,
    solutions_count: u64,
    probability: f64,
}

impl MetricsRecord {
    /// Snapshot `state` at the current local time.
    #[must_use]
    pub fn snapshot(state: ProgressState) -> Self {
        Self::at(Local::now().naive_local(), state)
    }

    /// Snapshot `state` at a given time.
    #[must_use]
    pub fn at(timestamp: NaiveDateTime, state: ProgressState) -> Self {
        Self {
            timestamp,
            trials_run: state.trials_run,
            solutions_count: state.solutions_count,
            probability: state.observed_probability(),
        }
    }

    /// Local wall-clock time of the observation.
    #[must_use]
    pub const fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Trials run at the time of the observation.
    #[must_use]
    pub const fn trials_run(&self) -> u64 {
        self.trials_run
    }

    /// Solutions found at the time of the observation.
    #[must_use]
    pub const fn solutions_count(&self) -> u64 {
        self.solutions_count
    }

    /// `solutions / trials` at the time of the observation.
    #[must_use]
    pub const fn probability(&self) -> f64 {
        self.probability
    }

    /// Formatted timestamp, millisecond precision.
    #[must_use]
    pub fn timestamp_display(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for MetricsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {:.10}",
            self.timestamp_display(),
            self.trials_run,
            self.solutions_count,
            self.probability
        )
    }
}

impl FromStr for MetricsRecord {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [timestamp, trials, solutions, probability] = fields.as_slice() else {
            return Err(format!("expected 4 fields, found {}", fields.len()));
        };

        let timestamp = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S%.f")
            .map_err(|e| format!("bad timestamp '{timestamp}': {e}"))?;
        let trials_run = trials
            .parse()
            .map_err(|e| format!("bad trial count '{trials}': {e}"))?;
        let solutions_count = solutions
            .parse()
            .map_err(|e| format!("bad solution count '{solutions}': {e}"))?;
        let probability = probability
            .parse()
            .map_err(|e| format!("bad probability '{probability}': {e}"))?;

        Ok(Self {
            timestamp,
            trials_run,
            solutions_count,
            probability,
        })
    }
}

/// Stateless append-only writer for metrics logs.
pub struct MetricsSink;

impl MetricsSink {
    /// Append `record` to the log at `path`; failures are logged and
    /// swallowed.
    pub fn append(path: &Path, record: &MetricsRecord) {
        if let Err(e) = Self::try_append(path, record) {
            warn!(path = %path.display(), error = %e, "failed to append metrics record");
        }
    }

    /// Append `record` to the log at `path`, writing the header first if
    /// the file is absent or empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or written.
    pub fn try_append(path: &Path, record: &MetricsRecord) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut buf = String::new();
        if file.metadata()?.len() == 0 {
            buf.push_str(METRICS_HEADER);
            buf.push('\n');
        }
        buf.push_str(&record.to_string());
        buf.push('\n');

        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    /// Read every record from the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::MalformedRecord`] for the first line that does not parse.
    pub fn read_log(path: &Path) -> Result<Vec<MetricsRecord>> {
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter(|(_, line)| line.trim() != METRICS_HEADER)
            .map(|(idx, line)| {
                line.parse().map_err(|reason| Error::MalformedRecord {
                    line: idx + 1,
                    reason,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_milli_opt(12, 0, 0, 123)
            .unwrap()
    }

    #[test]
    fn test_record_line_format() {
        let record = MetricsRecord::at(fixed_time(), ProgressState::new(10, 20));
        assert_eq!(record.to_string(), "2025-06-01 12:00:00.123, 20, 10, 0.5000000000");
    }

    #[test]
    fn test_zero_trials_formats_zero_probability() {
        let record = MetricsRecord::at(fixed_time(), ProgressState::default());
        assert!(record.to_string().ends_with(", 0, 0, 0.0000000000"));
    }

    #[test]
    fn test_parse_line() {
        let record: MetricsRecord = "2025-06-01 12:00:00.123, 20, 10, 0.5000000000".parse().unwrap();
        assert_eq!(record.timestamp(), fixed_time());
        assert_eq!(record.trials_run(), 20);
        assert_eq!(record.solutions_count(), 10);
        assert!((record.probability() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!("2025-06-01 12:00:00.123, 20, 10".parse::<MetricsRecord>().is_err());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("performance-t.csv");
        MetricsSink::append(&path, &MetricsRecord::at(fixed_time(), ProgressState::new(0, 0)));
        MetricsSink::append(&path, &MetricsRecord::at(fixed_time(), ProgressState::new(1, 2)));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], METRICS_HEADER);
        assert_eq!(content.matches(METRICS_HEADER).count(), 1);
    }

    #[test]
    fn test_append_to_empty_file_writes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("performance-t.csv");
        fs::write(&path, "").unwrap();
        MetricsSink::append(&path, &MetricsRecord::at(fixed_time(), ProgressState::new(1, 2)));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(METRICS_HEADER));
    }

    #[test]
    fn test_append_preserves_existing_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("performance-t.csv");
        let existing = format!("{METRICS_HEADER}\n2025-01-01 00:00:00.000, 5, 1, 0.2000000000\n");
        fs::write(&path, &existing).unwrap();
        MetricsSink::append(&path, &MetricsRecord::at(fixed_time(), ProgressState::new(2, 9)));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&existing));
    }

    #[test]
    fn test_read_log_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("performance-t.csv");
        let first = MetricsRecord::at(fixed_time(), ProgressState::new(0, 0));
        let second = MetricsRecord::at(fixed_time(), ProgressState::new(3, 4));
        MetricsSink::append(&path, &first);
        MetricsSink::append(&path, &second);

        let records = MetricsSink::read_log(&path).unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[test]
    fn test_read_log_reports_bad_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("performance-t.csv");
        fs::write(&path, format!("{METRICS_HEADER}\nnot, a, record\n")).unwrap();
        let err = MetricsSink::read_log(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_append_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("performance-t.csv");
        MetricsSink::append(&path, &MetricsRecord::at(fixed_time(), ProgressState::new(1, 1)));
        assert!(!path.exists());
    }
}
