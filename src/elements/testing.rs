//! Instrumented sink for verifying the push protocol.

use crate::element::{EndState, Sink, Source, Stage, StageKind, Termination, Upstream};
use crate::error::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::Weak;

/// A sink that records everything that happens to it.
///
/// `ProbeSink` accepts values like a collector but also counts protocol
/// violations instead of hiding them: writes while paused, writes after end,
/// and every `end` call including ignored duplicates. It can apply
/// backpressure on a schedule with [`pause_every`](Self::pause_every) and be
/// released from outside with [`release`](Self::release).
///
/// # Example
///
/// ```rust
/// use pushflow::elements::{ProbeSink, Values};
/// use pushflow::link::link;
/// use std::rc::Rc;
///
/// let src = Rc::new(Values::new(1..=4));
/// let probe = Rc::new(ProbeSink::new().pause_every(3));
/// link(&src, &probe).unwrap();
/// assert_eq!(probe.values(), vec![1, 2, 3]);
///
/// probe.release();
/// assert_eq!(probe.values(), vec![1, 2, 3, 4]);
/// assert_eq!(probe.end_calls(), 1);
/// assert_eq!(probe.violations(), 0);
/// ```
pub struct ProbeSink<T> {
    name: String,
    values: RefCell<Vec<T>>,
    paused: Cell<bool>,
    pause_every: Option<usize>,
    violations: Cell<usize>,
    writes_after_end: Cell<usize>,
    end_calls: Cell<usize>,
    ended: EndState,
    upstream: Upstream<T>,
}

impl<T> ProbeSink<T> {
    /// Create a probe that never pauses on its own.
    pub fn new() -> Self {
        Self {
            name: "probe".to_string(),
            values: RefCell::new(Vec::new()),
            paused: Cell::new(false),
            pause_every: None,
            violations: Cell::new(0),
            writes_after_end: Cell::new(0),
            end_calls: Cell::new(0),
            ended: EndState::new(),
            upstream: Upstream::new(),
        }
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pause after every `n` accepted values. Zero disables the schedule.
    pub fn pause_every(mut self, n: usize) -> Self {
        self.pause_every = (n > 0).then_some(n);
        self
    }

    /// Start out paused, so linking does not start production.
    pub fn start_paused(self) -> Self {
        self.paused.set(true);
        self
    }

    /// Apply backpressure.
    pub fn pause(&self) {
        self.paused.set(true);
    }

    /// Release backpressure and resume the linked source.
    pub fn release(&self) {
        self.paused.set(false);
        match self.upstream.get() {
            Some(source) => source.resume(),
            None => tracing::trace!(stage = %self.name, "released with no source"),
        }
    }

    /// Get the number of values accepted.
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Check if no value has been accepted.
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Get the number of writes rejected because the probe was paused.
    pub fn violations(&self) -> usize {
        self.violations.get()
    }

    /// Get the number of writes rejected because the probe had ended.
    pub fn writes_after_end(&self) -> usize {
        self.writes_after_end.get()
    }

    /// Get the number of `end` calls received, including ignored ones.
    pub fn end_calls(&self) -> usize {
        self.end_calls.get()
    }

    /// Get how the probe ended, if it has.
    pub fn termination(&self) -> Option<Termination> {
        self.ended.termination()
    }
}

impl<T: Clone> ProbeSink<T> {
    /// Get a copy of the accepted values, in arrival order.
    pub fn values(&self) -> Vec<T> {
        self.values.borrow().clone()
    }
}

impl<T> Default for ProbeSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ProbeSink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSink")
            .field("name", &self.name)
            .field("accepted", &self.len())
            .field("paused", &self.paused.get())
            .field("violations", &self.violations.get())
            .field("end_calls", &self.end_calls.get())
            .finish()
    }
}

impl<T> Stage for ProbeSink<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Sink
    }
}

impl<T> Sink<T> for ProbeSink<T> {
    fn write(&self, value: T) -> Result<()> {
        if self.ended.is_ended() {
            self.writes_after_end.set(self.writes_after_end.get() + 1);
            return Err(Error::WriteAfterEnd {
                stage: self.name.clone(),
            });
        }
        if self.paused.get() {
            self.violations.set(self.violations.get() + 1);
            return Err(Error::BackpressureViolation {
                stage: self.name.clone(),
            });
        }

        let accepted = {
            let mut values = self.values.borrow_mut();
            values.push(value);
            values.len()
        };
        if let Some(n) = self.pause_every {
            if accepted % n == 0 {
                self.paused.set(true);
            }
        }
        Ok(())
    }

    fn end(&self, error: Option<Error>) {
        self.end_calls.set(self.end_calls.get() + 1);
        if !self.ended.finish(error.as_ref()) {
            tracing::trace!(stage = %self.name, "ignoring repeated end");
        }
    }

    fn is_paused(&self) -> bool {
        self.paused.get()
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
