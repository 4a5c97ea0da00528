//! Core stage traits.

use crate::error::{Error, Result};
use std::rc::Weak;

// ============================================================================
// Stage
// ============================================================================

/// The capability set of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Produces values only.
    Source,
    /// Consumes values only.
    Sink,
    /// Consumes values from upstream and produces values downstream.
    Transform,
}

impl StageKind {
    /// Check if this stage can be linked as a source.
    #[inline]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source | Self::Transform)
    }

    /// Check if this stage can be linked as a sink.
    #[inline]
    pub fn is_sink(&self) -> bool {
        matches!(self, Self::Sink | Self::Transform)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Sink => f.write_str("sink"),
            Self::Transform => f.write_str("transform"),
        }
    }
}

/// Common identity of every stage.
pub trait Stage {
    /// Get the name of this stage (for debugging/logging).
    fn name(&self) -> &str;

    /// Get the capability set of this stage.
    fn kind(&self) -> StageKind;
}

// ============================================================================
// Termination
// ============================================================================

/// How a stage ended.
#[derive(Debug, Clone)]
pub enum Termination {
    /// The stream ended normally.
    Completed,
    /// The stream ended with an error.
    Failed(Error),
}

impl Termination {
    /// Build a termination from the argument of an `end` call.
    pub fn from_end(error: Option<Error>) -> Self {
        match error {
            Some(err) => Self::Failed(err),
            None => Self::Completed,
        }
    }

    /// Check if this is an error termination.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Get the error, if the stage failed.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Completed => None,
        }
    }
}

// ============================================================================
// Sink Trait
// ============================================================================

/// A passive stage that receives values.
///
/// The source linked to a sink drives it through [`write`](Sink::write) and
/// [`end`](Sink::end). The sink reports whether it can accept another value
/// through [`is_paused`](Sink::is_paused) and, when it becomes ready again,
/// calls [`Source::resume`] on its source.
///
/// # Contract
///
/// - A source must not call `write` while `is_paused()` is true. Sinks detect
///   this and return [`Error::BackpressureViolation`].
/// - Once `end` has been called, later `write` calls return
///   [`Error::WriteAfterEnd`] and later `end` calls are ignored.
///
/// # Example
///
/// ```rust,ignore
/// struct Printer {
///     ended: EndState,
///     upstream: Upstream<u32>,
/// }
///
/// impl Sink<u32> for Printer {
///     fn write(&self, value: u32) -> Result<()> {
///         println!("{value}");
///         Ok(())
///     }
///
///     fn end(&self, error: Option<Error>) {
///         self.ended.finish(error.as_ref());
///     }
///
///     fn is_paused(&self) -> bool {
///         false
///     }
///
///     fn is_ended(&self) -> bool {
///         self.ended.is_ended()
///     }
///
///     fn set_source(&self, source: Weak<dyn Source<u32>>) -> Result<()> {
///         self.upstream.attach(self.name(), source)
///     }
///
///     fn has_source(&self) -> bool {
///         self.upstream.is_linked()
///     }
/// }
/// ```
pub trait Sink<T>: Stage {
    /// Deliver exactly one value.
    fn write(&self, value: T) -> Result<()>;

    /// Terminate the stream, normally (`None`) or with an error.
    fn end(&self, error: Option<Error>);

    /// Check if this sink can currently accept a write.
    fn is_paused(&self) -> bool;

    /// Check if this sink has ended.
    fn is_ended(&self) -> bool;

    /// Record the source that drives this sink.
    ///
    /// Called by [`link`](crate::link::link). The reference is non-owning.
    fn set_source(&self, source: Weak<dyn Source<T>>) -> Result<()>;

    /// Check if a source has been linked to this sink.
    fn has_source(&self) -> bool;
}

// ============================================================================
// Source Trait
// ============================================================================

/// An active stage that drives a sink.
///
/// A source produces values only from inside [`resume`](Source::resume), and
/// stops as soon as its sink reports `is_paused()`. The sink calls `resume`
/// again once it is ready for more.
pub trait Source<T>: Stage {
    /// Produce values until the sink pauses or the source ends.
    fn resume(&self);

    /// Check if this source has ended.
    fn is_ended(&self) -> bool;

    /// Record the sink this source drives.
    ///
    /// Called by [`link`](crate::link::link). The reference is non-owning.
    fn set_sink(&self, sink: Weak<dyn Sink<T>>) -> Result<()>;

    /// Check if a sink has been linked to this source.
    fn has_sink(&self) -> bool;
}
