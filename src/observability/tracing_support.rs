//! Span helpers and their configuration.

use crate::element::StageKind;
use tracing::{Level, Span, span};

/// Which spans a [`Pipeline`](crate::pipeline::Pipeline) opens while linking.
///
/// Linking is where a synchronous pipeline actually runs, so these spans wrap
/// every value and `end` that the link sets in motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// Open a span named after the pipeline.
    pub pipeline_spans: bool,
    /// Open a span per link, naming both stages.
    pub link_spans: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::minimal()
    }
}

impl TracingConfig {
    /// Pipeline and link spans.
    pub fn all() -> Self {
        Self {
            pipeline_spans: true,
            link_spans: true,
        }
    }

    /// Pipeline spans only.
    pub fn minimal() -> Self {
        Self {
            pipeline_spans: true,
            link_spans: false,
        }
    }

    /// No spans; events are still emitted.
    pub fn none() -> Self {
        Self {
            pipeline_spans: false,
            link_spans: false,
        }
    }
}

/// Create a span for work done on behalf of a pipeline.
#[inline]
pub fn span_pipeline(name: &str) -> Span {
    span!(Level::INFO, "pipeline", name = %name)
}

/// Create a span for one link between two stages.
#[inline]
pub fn span_link(source: &str, source_kind: StageKind, sink: &str, sink_kind: StageKind) -> Span {
    span!(
        Level::DEBUG,
        "link",
        source = %source,
        source_kind = %source_kind,
        sink = %sink,
        sink_kind = %sink_kind
    )
}
