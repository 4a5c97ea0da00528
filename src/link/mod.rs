//! Linking sources to sinks.
//!
//! [`link`] is the single entry point that starts a pipeline: it wires a
//! source to a sink in both directions and, if the sink is ready, resumes the
//! source right away. A fully synchronous pipeline therefore runs to
//! completion inside the call that links its last stage.
//!
//! ## Ownership
//!
//! Links are non-owning. When using [`link`] or [`Pipe::pipe`] directly the
//! caller must keep every `Rc` alive for as long as the pipeline runs; use
//! [`Pipeline`](crate::pipeline::Pipeline) to have them owned for you.

mod pipe;

pub use pipe::{Pipe, link};
