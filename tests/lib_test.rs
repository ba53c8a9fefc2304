//! Tests for top-level public API

use std::time::Duration;

use trial_tracker::config::{DEFAULT_LOG_INTERVAL, DEFAULT_SAVE_INTERVAL};
use trial_tracker::{Tracker, TrackerConfig, TrackerState};

#[test]
fn test_config_builder() {
    // Test TrackerConfig::builder() with defaults
    let config = TrackerConfig::builder("Simple", 1_000).build().unwrap();
    assert_eq!(config.compute_type(), "Simple");
    assert_eq!(config.total_trials_target(), 1_000);
    assert_eq!(config.log_interval(), DEFAULT_LOG_INTERVAL);
    assert_eq!(config.save_interval(), DEFAULT_SAVE_INTERVAL);
}

#[test]
fn test_config_builder_chain() {
    // Test method chaining
    let config = TrackerConfig::builder("NumpyCPU", 1_000)
        .log_interval(Duration::from_secs(2))
        .save_interval(Duration::from_secs(5))
        .directory("data")
        .build()
        .unwrap();

    assert!(config.checkpoint_path().starts_with("data"));
    assert!(config.metrics_path().ends_with("performance-NumpyCPU.csv"));
    assert_eq!(config.stop_timeout(), Duration::from_secs(10));
}

#[test]
fn test_config_serialization() {
    let config = TrackerConfig::new("Cupy", 42).unwrap();
    let json = serde_json::to_string(&config).expect("serialization failed");
    let deserialized: TrackerConfig = serde_json::from_str(&json).expect("deserialization failed");
    assert_eq!(config, deserialized);
}

#[test]
fn test_distinct_labels_distinct_files() {
    let a = TrackerConfig::new("Multithread12", 10).unwrap();
    let b = TrackerConfig::new("Multiprocess12Processes", 10).unwrap();
    assert_ne!(a.checkpoint_path(), b.checkpoint_path());
    assert_ne!(a.metrics_path(), b.metrics_path());
}

#[test]
fn test_tracker_state_copy() {
    // Test TrackerState is Copy
    let state = TrackerState::Running;
    let _copied = state;
    let _another = state;
}

#[test]
fn test_tracker_state_debug() {
    let debug_str = format!("{:?}", TrackerState::Stopped);
    assert!(debug_str.contains("Stopped"));
}

#[tokio::test]
async fn test_tracker_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Tracker>();
}
