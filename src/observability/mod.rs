//! Observability features: metrics and tracing.
//!
//! - **Metrics**: Counters via `metrics-rs`
//! - **Tracing**: Structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `pushflow_values_produced` | Counter | Values written by sources |
//! | `pushflow_values_consumed` | Counter | Values accepted by terminal sinks |
//! | `pushflow_values_processed` | Counter | Values forwarded by transforms |
//! | `pushflow_streams_ended` | Counter | Stages that ended, labelled by outcome |
//! | `pushflow_protocol_violations` | Counter | Writes refused because the stage was paused |
//!
//! Nothing is exported unless the application installs a `metrics` recorder.
//!
//! ## Tracing
//!
//! Stages log at `debug` when they link or end and at `trace` for ignored
//! calls. [`Pipeline`](crate::pipeline::Pipeline) wraps linking in the spans
//! selected by [`TracingConfig`].

mod metrics;
mod tracing_support;

pub use self::metrics::{
    init_metrics, record_protocol_violation, record_stream_ended, record_value_consumed,
    record_value_processed, record_value_produced,
};
pub use tracing_support::{TracingConfig, span_link, span_pipeline};
