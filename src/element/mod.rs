//! Stage contract for push pipelines.
//!
//! This module defines the vocabulary every stage is built from:
//!
//! - [`Source`]: actively drives a sink with `write`/`end`
//! - [`Sink`]: passively receives values and reports backpressure
//! - [`Stage`]: name and [`StageKind`] shared by both
//!
//! # Design
//!
//! Pipelines are push-based and single threaded. A source produces only from
//! inside [`Source::resume`] and stops as soon as its sink reports
//! [`Sink::is_paused`]. The sink later calls `resume` on its source to ask for
//! more. Every call runs to completion on the caller's stack; the only
//! suspension point is inside [`AsyncMap`](crate::elements::AsyncMap).
//!
//! Stages live behind `Rc` and take `&self`. Mutable protocol state sits in
//! `Cell`/`RefCell`, and no borrow is held while calling into a neighbour, so
//! the re-entrant `resume -> write -> resume` chains are safe.
//!
//! Links are non-owning in both directions ([`Upstream`], [`Downstream`]);
//! the [`Pipeline`](crate::pipeline::Pipeline) (or the caller) owns the stages.

mod pad;
mod state;
mod traits;

pub use pad::{Downstream, Upstream};
pub use state::EndState;
pub use traits::{Sink, Source, Stage, StageKind, Termination};
