//! Built-in pipeline stages.
//!
//! ## Sources
//! - [`Values`]: Emits a fixed sequence, then ends
//!
//! ## Sinks
//! - [`Collect`]: Accumulates every value and reports on end
//! - [`ProbeSink`]: Records values and protocol violations (for testing)
//!
//! ## Transforms
//! - [`Map`]: Applies a function to each value, synchronously
//! - [`AsyncMap`]: Applies an asynchronous operation to each value, one at a time
//!
//! Other stages can be built on the same contract using
//! [`TransformCore`], [`EndState`](crate::element::EndState) and the link
//! endpoints in [`element`](crate::element).

mod async_map;
mod collect;
mod map;
pub mod testing;
mod values;

// Sources
pub use values::Values;

// Sinks
pub use collect::{Collect, Completion};
pub use testing::ProbeSink;

// Transforms
pub use async_map::{AsyncMap, AsyncPhase};
pub use map::{Map, TransformCore};
