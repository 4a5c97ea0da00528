//! Error types for pushflow.

use std::sync::Arc;
use thiserror::Error;

/// Result type alias using pushflow's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// The pipeline error.
///
/// Every error is terminal for the pipeline it is raised in: it travels
/// downstream stage by stage through `end(Some(error))` and is finally handed
/// to the terminal sink. `Error` is `Clone` so an ended stage can keep its
/// outcome while forwarding it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A value was written to a stage that was paused.
    #[error("backpressure violation: `{stage}` was written to while paused")]
    BackpressureViolation {
        /// Name of the stage that rejected the write.
        stage: String,
    },

    /// A value was written to a stage that has already ended.
    #[error("`{stage}` was written to after it ended")]
    WriteAfterEnd {
        /// Name of the stage that rejected the write.
        stage: String,
    },

    /// A link was requested on a stage that already has a peer on that side.
    #[error("`{stage}` is already linked")]
    AlreadyLinked {
        /// Name of the stage that refused the link.
        stage: String,
    },

    /// A stage needed its downstream sink but has none (or it was dropped).
    #[error("`{stage}` has no linked sink")]
    NotLinked {
        /// Name of the unlinked stage.
        stage: String,
    },

    /// The executor refused to run an asynchronous operation.
    #[error("failed to spawn async operation: {0}")]
    Spawn(String),

    /// An operation failed with a plain message.
    #[error("{0}")]
    Message(String),

    /// An operation failed with an arbitrary error value.
    #[error("{0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an arbitrary error value.
    pub fn failed(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Failed(Arc::new(err))
    }

    /// Check if this error reports a broken protocol contract rather than a
    /// failure raised by user code.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::BackpressureViolation { .. }
                | Self::WriteAfterEnd { .. }
                | Self::AlreadyLinked { .. }
                | Self::NotLinked { .. }
        )
    }
}

impl From<futures::task::SpawnError> for Error {
    fn from(err: futures::task::SpawnError) -> Self {
        Self::Spawn(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_classification() {
        let err = Error::BackpressureViolation {
            stage: "collect".into(),
        };
        assert!(err.is_protocol_violation());
        assert!(err.to_string().contains("collect"));

        assert!(!Error::msg("boom").is_protocol_violation());
    }

    #[test]
    fn test_failed_wraps_source_error() {
        let io = std::io::Error::other("disk on fire");
        let err = Error::failed(io);
        assert_eq!(err.to_string(), "disk on fire");

        // Clones share the wrapped value.
        let cloned = err.clone();
        assert_eq!(cloned.to_string(), err.to_string());
    }
}
