//! Values source for emitting a fixed sequence.

use crate::element::{Downstream, EndState, Sink, Source, Stage, StageKind, Termination};
use crate::error::Result;
use crate::observability;
use std::cell::{Cell, RefCell};
use std::rc::Weak;

/// A source that emits a fixed, ordered sequence of values, then ends.
///
/// Every value is delivered exactly once, in order. Production happens only
/// inside [`Source::resume`], which loops until the sink pauses or the
/// sequence is exhausted. Reaching the end of the sequence ends the sink
/// normally.
///
/// # Example
///
/// ```rust
/// use pushflow::elements::{Collect, Values};
/// use pushflow::link::Pipe;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let out = Rc::new(RefCell::new(Vec::new()));
/// let slot = Rc::clone(&out);
///
/// let src = Rc::new(Values::new([1, 2, 3]).with_name("numbers"));
/// let sink = Rc::new(Collect::new(move |_err, items| *slot.borrow_mut() = items));
/// src.pipe(&sink).unwrap();
///
/// assert_eq!(*out.borrow(), vec![1, 2, 3]);
/// ```
pub struct Values<T> {
    name: String,
    items: RefCell<std::vec::IntoIter<T>>,
    emitted: Cell<usize>,
    ended: EndState,
    downstream: Downstream<T>,
}

impl<T> Values<T> {
    /// Create a source over the given values.
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let items: Vec<T> = items.into_iter().collect();
        Self {
            name: "values".to_string(),
            items: RefCell::new(items.into_iter()),
            emitted: Cell::new(0),
            ended: EndState::new(),
            downstream: Downstream::new(),
        }
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Get the number of values written so far.
    pub fn emitted(&self) -> usize {
        self.emitted.get()
    }

    /// Get the number of values not yet written.
    pub fn remaining(&self) -> usize {
        self.items.borrow().len()
    }

    /// Get how this source ended, if it has.
    pub fn termination(&self) -> Option<Termination> {
        self.ended.termination()
    }
}

impl<T> std::fmt::Debug for Values<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Values")
            .field("name", &self.name)
            .field("emitted", &self.emitted.get())
            .field("remaining", &self.remaining())
            .field("ended", &self.ended.is_ended())
            .finish()
    }
}

impl<T> Stage for Values<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Source
    }
}

impl<T> Source<T> for Values<T> {
    fn resume(&self) {
        let Some(sink) = self.downstream.get() else {
            if self.downstream.is_linked() {
                tracing::warn!(stage = %self.name, "sink was dropped, not producing");
            }
            return;
        };

        while !sink.is_paused() && !self.ended.is_ended() {
            // Release the cursor before writing: the write may re-enter resume.
            let next = self.items.borrow_mut().next();
            match next {
                None => {
                    self.ended.finish(None);
                    observability::record_stream_ended(&self.name, false);
                    tracing::debug!(stage = %self.name, emitted = self.emitted.get(), "sequence exhausted");
                    sink.end(None);
                }
                Some(value) => {
                    self.emitted.set(self.emitted.get() + 1);
                    observability::record_value_produced(&self.name);
                    if let Err(err) = sink.write(value) {
                        tracing::error!(stage = %self.name, error = %err, "sink rejected write");
                        self.ended.finish(Some(&err));
                        observability::record_stream_ended(&self.name, true);
                        sink.end(Some(err));
                    }
                }
            }
        }
    }

    fn is_ended(&self) -> bool {
        self.ended.is_ended()
    }

    fn set_sink(&self, sink: Weak<dyn Sink<T>>) -> Result<()> {
        self.downstream.attach(&self.name, sink)
    }

    fn has_sink(&self) -> bool {
        self.downstream.is_linked()
    }
}
