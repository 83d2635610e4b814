//! Metrics definitions for the indexer.
//!
//! This module defines all metrics used throughout the indexer.
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "blocks_processed_total",
        "Total number of block messages fully processed"
    );
    describe_counter!(
        "balance_events_emitted_total",
        "Total number of balance events written to the ledger"
    );
    describe_counter!(
        "consistency_failures_total",
        "Total number of fatal data-consistency violations detected"
    );
    describe_counter!(
        "storage_retries_total",
        "Total number of retried block persistence attempts"
    );
    describe_histogram!(
        "block_processing_duration_seconds",
        "Time taken to derive and persist one block in seconds"
    );
}

/// Record a fully processed block.
pub fn record_block_processed() {
    counter!("blocks_processed_total").increment(1);
}

/// Record balance events written to the ledger.
pub fn record_events_emitted(count: u64) {
    counter!("balance_events_emitted_total").increment(count);
}

/// Record a fatal consistency violation.
///
/// # Arguments
/// * `kind` - The violation kind (e.g. "correlation_mismatch")
pub fn record_consistency_failure(kind: &str) {
    counter!("consistency_failures_total", "kind" => kind.to_string()).increment(1);
}

/// Record a retried persistence attempt.
pub fn record_storage_retry() {
    counter!("storage_retries_total").increment(1);
}

/// Record block processing duration.
pub fn record_block_processing_duration(duration_secs: f64) {
    histogram!("block_processing_duration_seconds").record(duration_secs);
}

/// A timer that automatically records duration when dropped.
pub struct ProcessingTimer {
    start: Instant,
}

impl ProcessingTimer {
    /// Start a new processing timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ProcessingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessingTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_block_processing_duration(duration);
    }
}
