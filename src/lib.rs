//! # pushflow
//!
//! A push-stream protocol: a source actively drives data into a passive sink
//! under explicit backpressure.
//!
//! Where a pull stream has an active reader and a passive readable, a push
//! stream has an active writer and a passive writable. The sink says when it
//! cannot take more (`is_paused`), the source stops, and the sink calls
//! `resume` on its source when it is ready again. Transforms sit in between
//! and play both roles.
//!
//! ## Features
//!
//! - **Zero-buffer transforms**: values travel down the call stack, pause
//!   state travels back up in lock-step
//! - **Asynchronous stages**: [`AsyncMap`](elements::AsyncMap) suspends on a
//!   `futures` executor with exactly one value in flight
//! - **Detectable violations**: writes while paused or after end are refused
//!   with an [`Error`], not silently accepted
//! - **Single threaded**: stages are `Rc` objects with non-owning links
//!
//! ## Quick Start
//!
//! ```rust
//! use pushflow::prelude::*;
//! use std::rc::Rc;
//!
//! let src = Rc::new(Values::new(vec![1, 2, 3]));
//! let double = Rc::new(Map::new(|x: i32| x * 2));
//! let (sink, mut done) = Collect::channel();
//! let sink = Rc::new(sink);
//!
//! // Linking the last stage runs the whole synchronous pipeline.
//! src.pipe(&double)?.pipe(&sink)?;
//!
//! let items = done.try_recv().unwrap().unwrap().into_result()?;
//! assert_eq!(items, vec![2, 4, 6]);
//! # Ok::<(), pushflow::Error>(())
//! ```
//!
//! ## Known limitation
//!
//! There is no upstream cancellation. When a sink ends early (for example
//! because an asynchronous transform failed), the sources above it are not
//! told to stop; they simply stay blocked on backpressure.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod element;
pub mod elements;
pub mod error;
pub mod link;
pub mod observability;
pub mod pipeline;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::element::{Sink, Source, Stage, StageKind, Termination};
    pub use crate::elements::{AsyncMap, Collect, Completion, Map, ProbeSink, Values};
    pub use crate::error::{Error, Result};
    pub use crate::link::{Pipe, link};
    pub use crate::pipeline::Pipeline;
}

pub use error::{Error, Result};
