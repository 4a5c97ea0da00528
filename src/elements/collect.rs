//! Collect sink for accumulating a stream into a `Vec`.

use crate::element::{EndState, Sink, Source, Stage, StageKind, Termination, Upstream};
use crate::error::{Error, Result};
use crate::observability;
use futures::channel::oneshot;
use std::cell::{Cell, RefCell};
use std::rc::Weak;

type OnEnd<T> = Box<dyn FnOnce(Option<Error>, Vec<T>)>;

/// The final report of a [`Collect`] sink.
///
/// The accumulated items are kept even when the stream failed; callers that
/// only want clean results use [`into_result`](Self::into_result).
#[derive(Debug)]
pub struct Completion<T> {
    /// The error the stream ended with, if any.
    pub error: Option<Error>,
    /// Every value received before the end, in order.
    pub items: Vec<T>,
}

impl<T> Completion<T> {
    /// Discard the partial items of a failed stream.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}

/// A sink that collects every value into an ordered buffer.
///
/// `Collect` never applies backpressure. When it ends, the completion
/// callback is invoked exactly once with the error (if any) and everything
/// accumulated so far.
///
/// # Example
///
/// ```rust
/// use pushflow::elements::{Collect, Values};
/// use pushflow::link::link;
/// use std::rc::Rc;
///
/// let src = Rc::new(Values::new(vec!['a', 'b']));
/// let (sink, done) = Collect::channel();
/// let sink = Rc::new(sink);
/// link(&src, &sink).unwrap();
///
/// let completion = futures::executor::block_on(done).unwrap();
/// assert_eq!(completion.into_result().unwrap(), vec!['a', 'b']);
/// ```
pub struct Collect<T> {
    name: String,
    items: RefCell<Vec<T>>,
    received: Cell<usize>,
    on_end: RefCell<Option<OnEnd<T>>>,
    ended: EndState,
    upstream: Upstream<T>,
}

impl<T: 'static> Collect<T> {
    /// Create a collector that reports to `on_end`.
    pub fn new<F>(on_end: F) -> Self
    where
        F: FnOnce(Option<Error>, Vec<T>) + 'static,
    {
        Self {
            name: "collect".to_string(),
            items: RefCell::new(Vec::new()),
            received: Cell::new(0),
            on_end: RefCell::new(Some(Box::new(on_end))),
            ended: EndState::new(),
            upstream: Upstream::new(),
        }
    }

    /// Create a collector that reports through a oneshot channel.
    ///
    /// The receiver resolves once the stream ends. It resolves to
    /// `Err(Canceled)` if the sink is dropped without ending.
    pub fn channel() -> (Self, oneshot::Receiver<Completion<T>>) {
        let (tx, rx) = oneshot::channel();
        let sink = Self::new(move |error, items| {
            if tx.send(Completion { error, items }).is_err() {
                tracing::trace!("collect receiver dropped before completion");
            }
        });
        (sink, rx)
    }
}

impl<T> Collect<T> {
    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the number of values collected so far.
    ///
    /// The count survives the end of the stream, when the buffer itself is
    /// handed to the completion callback.
    pub fn len(&self) -> usize {
        self.received.get()
    }

    /// Check if nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.received.get() == 0
    }

    /// Get how the stream ended, if it has.
    pub fn termination(&self) -> Option<Termination> {
        self.ended.termination()
    }
}

impl<T> std::fmt::Debug for Collect<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collect")
            .field("name", &self.name)
            .field("received", &self.len())
            .field("ended", &self.ended.is_ended())
            .finish()
    }
}

impl<T> Stage for Collect<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Sink
    }
}

impl<T> Sink<T> for Collect<T> {
    fn write(&self, value: T) -> Result<()> {
        if self.ended.is_ended() {
            return Err(Error::WriteAfterEnd {
                stage: self.name.clone(),
            });
        }
        self.items.borrow_mut().push(value);
        self.received.set(self.received.get() + 1);
        observability::record_value_consumed(&self.name);
        Ok(())
    }

    fn end(&self, error: Option<Error>) {
        if !self.ended.finish(error.as_ref()) {
            tracing::trace!(stage = %self.name, "ignoring repeated end");
            return;
        }

        observability::record_stream_ended(&self.name, error.is_some());
        let items = std::mem::take(&mut *self.items.borrow_mut());
        tracing::debug!(
            stage = %self.name,
            collected = items.len(),
            failed = error.is_some(),
            "stream ended"
        );

        // Take the callback out first so it may inspect this sink.
        let on_end = self.on_end.borrow_mut().take();
        if let Some(on_end) = on_end {
            on_end(error, items);
        }
    }

    fn is_paused(&self) -> bool {
        false
    }

    fn is_ended(&self) -> bool {
        self.ended.is_ended()
    }

    fn set_source(&self, source: Weak<dyn Source<T>>) -> Result<()> {
        self.upstream.attach(&self.name, source)
    }

    fn has_source(&self) -> bool {
        self.upstream.is_linked()
    }
}
