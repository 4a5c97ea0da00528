//! Metrics collection using metrics-rs.

use metrics::{Unit, counter};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

const VALUES_PRODUCED: &str = "pushflow_values_produced";
const VALUES_CONSUMED: &str = "pushflow_values_consumed";
const VALUES_PROCESSED: &str = "pushflow_values_processed";
const STREAMS_ENDED: &str = "pushflow_streams_ended";
const PROTOCOL_VIOLATIONS: &str = "pushflow_protocol_violations";

/// Describe all metrics.
///
/// Call once at startup, after installing a recorder. Later calls are no-ops.
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        VALUES_PRODUCED,
        Unit::Count,
        "Total number of values written by sources"
    );
    metrics::describe_counter!(
        VALUES_CONSUMED,
        Unit::Count,
        "Total number of values accepted by terminal sinks"
    );
    metrics::describe_counter!(
        VALUES_PROCESSED,
        Unit::Count,
        "Total number of values forwarded by transforms"
    );
    metrics::describe_counter!(
        STREAMS_ENDED,
        Unit::Count,
        "Total number of stages that ended"
    );
    metrics::describe_counter!(
        PROTOCOL_VIOLATIONS,
        Unit::Count,
        "Writes refused because the stage was paused"
    );
}

/// Record a value written by a source.
#[inline]
pub fn record_value_produced(stage: &str) {
    counter!(VALUES_PRODUCED, "stage" => stage.to_string()).increment(1);
}

/// Record a value accepted by a terminal sink.
#[inline]
pub fn record_value_consumed(stage: &str) {
    counter!(VALUES_CONSUMED, "stage" => stage.to_string()).increment(1);
}

/// Record a value forwarded by a transform.
#[inline]
pub fn record_value_processed(stage: &str) {
    counter!(VALUES_PROCESSED, "stage" => stage.to_string()).increment(1);
}

/// Record a stage ending.
#[inline]
pub fn record_stream_ended(stage: &str, failed: bool) {
    let outcome = if failed { "failed" } else { "completed" };
    counter!(STREAMS_ENDED, "stage" => stage.to_string(), "outcome" => outcome).increment(1);
}

/// Record a write refused because of backpressure.
#[inline]
pub fn record_protocol_violation(stage: &str) {
    counter!(PROTOCOL_VIOLATIONS, "stage" => stage.to_string()).increment(1);
}
