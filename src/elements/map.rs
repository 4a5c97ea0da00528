//! Map transform and the shared transform state machine.

use crate::element::{
    Downstream, EndState, Sink, Source, Stage, StageKind, Termination, Upstream,
};
use crate::error::{Error, Result};
use crate::observability;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

// ============================================================================
// TransformCore
// ============================================================================

/// Protocol state shared by every transform: a sink upstream, a source
/// downstream.
///
/// A transform never buffers. Its `paused` flag mirrors its downstream sink
/// and is re-read after every forwarded value, so whatever is upstream of the
/// transform always sees accurate backpressure.
///
/// A core starts paused: nothing may be written into a transform until it is
/// linked downstream and that sink has reported ready through
/// [`resume`](Self::resume).
pub struct TransformCore<T, U> {
    name: String,
    paused: Cell<bool>,
    ended: EndState,
    upstream: Upstream<T>,
    downstream: Downstream<U>,
}

impl<T, U> TransformCore<T, U> {
    /// Create an unlinked, paused core.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paused: Cell::new(true),
            ended: EndState::new(),
            upstream: Upstream::new(),
            downstream: Downstream::new(),
        }
    }

    /// Get the stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the stage.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Check if the transform refuses writes. An ended transform always does.
    pub fn is_paused(&self) -> bool {
        self.paused.get() || self.ended.is_ended()
    }

    /// Override the paused flag.
    pub fn set_paused(&self, paused: bool) {
        self.paused.set(paused);
    }

    /// Check if the transform has ended.
    pub fn is_ended(&self) -> bool {
        self.ended.is_ended()
    }

    /// Get how the transform ended, if it has.
    pub fn termination(&self) -> Option<Termination> {
        self.ended.termination()
    }

    /// Fail if a write may not be delivered right now.
    pub fn check_writable(&self) -> Result<()> {
        if self.ended.is_ended() {
            return Err(Error::WriteAfterEnd {
                stage: self.name.clone(),
            });
        }
        if self.paused.get() {
            observability::record_protocol_violation(&self.name);
            return Err(Error::BackpressureViolation {
                stage: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Get the downstream sink, if linked and alive.
    pub fn sink(&self) -> Option<Rc<dyn Sink<U>>> {
        self.downstream.get()
    }

    /// Write `value` downstream, then re-derive `paused` from the sink.
    pub fn forward(&self, value: U) -> Result<()> {
        let sink = self.downstream.require(&self.name)?;
        let written = sink.write(value);
        self.paused.set(sink.is_paused());
        observability::record_value_processed(&self.name);
        written
    }

    /// Called by the downstream sink when it becomes ready.
    ///
    /// Re-derives `paused` from the sink and, if no longer paused, asks the
    /// upstream source for more. This is how a release of backpressure
    /// travels up an arbitrary chain of transforms.
    pub fn resume(&self) {
        if self.ended.is_ended() {
            tracing::trace!(stage = %self.name, "ignoring resume after end");
            return;
        }
        let Some(sink) = self.downstream.get() else {
            tracing::trace!(stage = %self.name, "resume with no sink");
            return;
        };

        let paused = sink.is_paused();
        self.paused.set(paused);
        if paused {
            return;
        }
        match self.upstream.get() {
            Some(source) => source.resume(),
            None => tracing::trace!(stage = %self.name, "ready, waiting for a source"),
        }
    }

    /// End the transform and pass the outcome downstream, once.
    pub fn end(&self, error: Option<Error>) {
        if !self.ended.finish(error.as_ref()) {
            tracing::trace!(stage = %self.name, "ignoring repeated end");
            return;
        }
        observability::record_stream_ended(&self.name, error.is_some());
        match &error {
            Some(err) => tracing::debug!(stage = %self.name, error = %err, "ended with error"),
            None => tracing::debug!(stage = %self.name, "ended"),
        }

        match self.downstream.get() {
            Some(sink) => sink.end(error),
            None => tracing::warn!(stage = %self.name, "ended with no sink to notify"),
        }
    }

    /// Attach the upstream source.
    pub fn set_source(&self, source: Weak<dyn Source<T>>) -> Result<()> {
        self.upstream.attach(&self.name, source)
    }

    /// Check if an upstream source is attached.
    pub fn has_source(&self) -> bool {
        self.upstream.is_linked()
    }

    /// Attach the downstream sink.
    pub fn set_sink(&self, sink: Weak<dyn Sink<U>>) -> Result<()> {
        self.downstream.attach(&self.name, sink)
    }

    /// Check if a downstream sink is attached.
    pub fn has_sink(&self) -> bool {
        self.downstream.is_linked()
    }
}

impl<T, U> std::fmt::Debug for TransformCore<T, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCore")
            .field("name", &self.name)
            .field("paused", &self.paused.get())
            .field("ended", &self.ended.is_ended())
            .field("has_source", &self.upstream.is_linked())
            .field("has_sink", &self.downstream.is_linked())
            .finish()
    }
}

// ============================================================================
// Map
// ============================================================================

/// A transform that applies a function to each value.
///
/// `write` is synchronous end to end: the mapped value is forwarded on the
/// caller's stack and the pause flag is updated in lock-step, so `Map` needs
/// no buffer.
///
/// # Example
///
/// ```rust
/// use pushflow::elements::{Collect, Map, Values};
/// use pushflow::link::Pipe;
/// use std::rc::Rc;
///
/// let src = Rc::new(Values::new(vec![1, 2, 3]));
/// let double = Rc::new(Map::new(|x: i32| x * 2).with_name("double"));
/// let (sink, mut done) = Collect::channel();
/// let sink = Rc::new(sink);
///
/// src.pipe(&double).unwrap().pipe(&sink).unwrap();
/// let completion = done.try_recv().unwrap().unwrap();
/// assert_eq!(completion.items, vec![2, 4, 6]);
/// ```
pub struct Map<T, U, F> {
    core: TransformCore<T, U>,
    func: RefCell<F>,
    _marker: PhantomData<fn(T) -> U>,
}

impl<T, U, F> Map<T, U, F>
where
    F: FnMut(T) -> U,
{
    /// Create a map transform.
    pub fn new(func: F) -> Self {
        Self {
            core: TransformCore::new("map"),
            func: RefCell::new(func),
            _marker: PhantomData,
        }
    }
}

impl<T, U, F> Map<T, U, F> {
    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.core.set_name(name);
        self
    }

    /// Check if this transform currently refuses writes.
    pub fn is_paused(&self) -> bool {
        self.core.is_paused()
    }

    /// Check if this transform has ended.
    pub fn is_ended(&self) -> bool {
        self.core.is_ended()
    }

    /// Get how this transform ended, if it has.
    pub fn termination(&self) -> Option<Termination> {
        self.core.termination()
    }
}

impl<T, U, F> std::fmt::Debug for Map<T, U, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map").field("core", &self.core).finish_non_exhaustive()
    }
}

impl<T, U, F> Stage for Map<T, U, F> {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }
}

impl<T, U, F> Sink<T> for Map<T, U, F>
where
    F: FnMut(T) -> U,
{
    fn write(&self, value: T) -> Result<()> {
        self.core.check_writable()?;
        let mapped = (&mut *self.func.borrow_mut())(value);
        self.core.forward(mapped)
    }

    fn end(&self, error: Option<Error>) {
        self.core.end(error);
    }

    fn is_paused(&self) -> bool {
        self.core.is_paused()
    }

    fn is_ended(&self) -> bool {
        self.core.is_ended()
    }

    fn set_source(&self, source: Weak<dyn Source<T>>) -> Result<()> {
        self.core.set_source(source)
    }

    fn has_source(&self) -> bool {
        self.core.has_source()
    }
}

impl<T, U, F> Source<U> for Map<T, U, F> {
    fn resume(&self) {
        self.core.resume();
    }

    fn is_ended(&self) -> bool {
        self.core.is_ended()
    }

    fn set_sink(&self, sink: Weak<dyn Sink<U>>) -> Result<()> {
        self.core.set_sink(sink)
    }

    fn has_sink(&self) -> bool {
        self.core.has_sink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::testing::ProbeSink;
    use crate::elements::{Collect, Values};
    use crate::link::link;

    #[test]
    fn test_map_starts_paused() {
        let map = Map::new(|x: u32| x + 1);
        assert!(map.is_paused());
        assert!(!map.is_ended());

        let err = Sink::write(&map, 1).unwrap_err();
        assert!(matches!(err, Error::BackpressureViolation { .. }));
    }

    #[test]
    fn test_map_doubles() {
        let src = Rc::new(Values::new(vec![1, 2, 3]));
        let double = Rc::new(Map::new(|x: i32| x * 2));
        let (sink, mut done) = Collect::channel();
        let sink = Rc::new(sink);

        link(&src, &double).unwrap();
        link(&double, &sink).unwrap();

        let completion = done.try_recv().unwrap().unwrap();
        assert!(completion.error.is_none());
        assert_eq!(completion.items, vec![2, 4, 6]);
        assert!(double.is_ended());
    }

    #[test]
    fn test_map_mirrors_downstream_pause() {
        let src = Rc::new(Values::new(1..=6));
        let square = Rc::new(Map::new(|x: i32| x * x));
        let probe = Rc::new(ProbeSink::new().pause_every(2));

        link(&square, &probe).unwrap();
        assert!(!square.is_paused());

        link(&src, &square).unwrap();
        assert_eq!(probe.values(), vec![1, 4]);
        assert!(square.is_paused());
        assert_eq!(src.remaining(), 4);

        // Releasing the sink travels through the map to the source.
        probe.release();
        assert_eq!(probe.values(), vec![1, 4, 9, 16]);

        probe.release();
        assert_eq!(probe.values(), vec![1, 4, 9, 16, 25, 36]);
        assert_eq!(probe.end_calls(), 0);

        probe.release();
        assert_eq!(probe.end_calls(), 1);
        assert_eq!(probe.violations(), 0);
    }

    #[test]
    fn test_map_chain_composes_in_order() {
        let src = Rc::new(Values::new(vec![1, 2, 3, 4]));
        let inc = Rc::new(Map::new(|x: i64| x + 1));
        let triple = Rc::new(Map::new(|x: i64| x * 3));
        let label = Rc::new(Map::new(|x: i64| format!("#{x}")));
        let (sink, mut done) = Collect::channel();
        let sink = Rc::new(sink);

        link(&label, &sink).unwrap();
        link(&triple, &label).unwrap();
        link(&inc, &triple).unwrap();
        link(&src, &inc).unwrap();

        let items = done.try_recv().unwrap().unwrap().into_result().unwrap();
        assert_eq!(items, vec!["#6", "#9", "#12", "#15"]);
    }

    #[test]
    fn test_map_forwards_error_end_once() {
        let map = Rc::new(Map::new(|x: u8| x));
        let probe = Rc::new(ProbeSink::new());
        link(&map, &probe).unwrap();

        Sink::end(&*map, Some(Error::msg("upstream broke")));
        Sink::end(&*map, None);

        assert_eq!(probe.end_calls(), 1);
        let termination = probe.termination().unwrap();
        assert_eq!(termination.error().unwrap().to_string(), "upstream broke");
        assert!(map.termination().unwrap().is_failed());
        // Ended transforms refuse further input.
        assert!(map.is_paused());
        let err = Sink::write(&*map, 1).unwrap_err();
        assert!(matches!(err, Error::WriteAfterEnd { .. }));
        assert!(probe.is_empty());
    }

    #[test]
    fn test_map_debug_shows_state() {
        let map = Map::new(|x: u8| x).with_name("ident");
        let debug = format!("{map:?}");
        assert!(debug.contains("ident"), "{debug}");
        assert!(debug.contains("paused: true"), "{debug}");
        assert!(debug.contains("ended: false"), "{debug}");
    }

    #[test]
    fn test_resume_before_source_is_harmless() {
        let map = Rc::new(Map::new(|x: u8| x));
        let probe = Rc::new(ProbeSink::<u8>::new().start_paused());

        link(&map, &probe).unwrap();
        assert!(map.is_paused());

        probe.release();
        assert!(!map.is_paused());
        assert_eq!(probe.end_calls(), 0);
    }
}
