//! Async map transform: a map whose operation suspends before producing.

use crate::element::{Sink, Source, Stage, StageKind, Termination};
use crate::elements::map::TransformCore;
use crate::error::{Error, Result};
use futures::task::{LocalSpawn, LocalSpawnExt};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};

/// Where an [`AsyncMap`] is in its per-value cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncPhase {
    /// Ready for the next value (subject to downstream backpressure).
    Idle,
    /// An operation is in flight; writes are refused.
    Pending,
    /// The operation finished but the downstream sink is paused; the result
    /// is delivered on the next resume.
    Holding,
    /// The transform has ended.
    Ended,
}

/// State reachable from the spawned continuation.
struct Shared<T, U> {
    core: TransformCore<T, U>,
    phase: Cell<AsyncPhase>,
    held: RefCell<Option<U>>,
    end_deferred: Cell<bool>,
}

impl<T, U> Shared<T, U> {
    fn phase(&self) -> AsyncPhase {
        if self.core.is_ended() {
            AsyncPhase::Ended
        } else {
            self.phase.get()
        }
    }

    /// Continuation of an in-flight operation.
    fn complete(&self, outcome: Result<U>) {
        if self.core.is_ended() {
            tracing::trace!(stage = self.core.name(), "discarding result of ended stage");
            return;
        }

        match outcome {
            Err(err) => {
                tracing::debug!(stage = self.core.name(), error = %err, "async operation failed");
                self.phase.set(AsyncPhase::Idle);
                // Stays paused: nothing upstream may write into a failed stage.
                self.core.end(Some(err));
            }
            Ok(value) => {
                *self.held.borrow_mut() = Some(value);
                self.phase.set(AsyncPhase::Holding);
                self.resume();
            }
        }
    }

    fn resume(&self) {
        if self.core.is_ended() {
            return;
        }

        match self.phase.get() {
            AsyncPhase::Pending => {
                tracing::trace!(stage = self.core.name(), "resume while operation in flight");
                return;
            }
            AsyncPhase::Holding => {
                let Some(sink) = self.core.sink() else {
                    tracing::warn!(stage = self.core.name(), "sink was dropped, holding result");
                    return;
                };
                if sink.is_paused() {
                    tracing::trace!(stage = self.core.name(), "downstream paused, holding result");
                    return;
                }

                self.phase.set(AsyncPhase::Idle);
                self.core.set_paused(false);
                let held = self.held.borrow_mut().take();
                if let Some(value) = held {
                    if let Err(err) = self.core.forward(value) {
                        tracing::error!(stage = self.core.name(), error = %err, "sink rejected write");
                        self.core.end(Some(err));
                        return;
                    }
                }
            }
            AsyncPhase::Idle | AsyncPhase::Ended => {}
        }

        if self.end_deferred.replace(false) {
            self.core.end(None);
            return;
        }
        self.core.resume();
    }
}

/// A transform whose per-value operation is asynchronous.
///
/// On `write` the transform pauses *before* starting the operation, so no
/// further value is accepted until the operation's continuation has run.
/// At most one value is in flight, which keeps output in input order
/// without any queue.
///
/// The operation's future is spawned on the supplied [`LocalSpawn`]
/// executor; this is the only point where a pipeline suspends. When the
/// future resolves:
///
/// - `Ok(value)`: the value is written downstream and the transform resumes,
///   pulling from upstream if the sink is ready.
/// - `Err(error)`: the transform ends with that error and passes it
///   downstream. Nothing else is written.
///
/// # Example
///
/// ```rust
/// use futures::executor::LocalPool;
/// use pushflow::elements::{AsyncMap, Collect, Values};
/// use pushflow::error::Error;
/// use pushflow::link::Pipe;
/// use std::rc::Rc;
///
/// let mut pool = LocalPool::new();
///
/// let src = Rc::new(Values::new(vec![1, 2, 3]));
/// let tenfold = Rc::new(AsyncMap::new(pool.spawner(), |x: i32| async move {
///     Ok::<_, Error>(x * 10)
/// }));
/// let (sink, done) = Collect::channel();
/// let sink = Rc::new(sink);
///
/// src.pipe(&tenfold).unwrap().pipe(&sink).unwrap();
/// let completion = pool.run_until(done).unwrap();
/// assert_eq!(completion.items, vec![10, 20, 30]);
/// ```
pub struct AsyncMap<T, U, F> {
    shared: Rc<Shared<T, U>>,
    op: RefCell<F>,
    spawner: Box<dyn LocalSpawn>,
}

impl<T, U, F, Fut> AsyncMap<T, U, F>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<U>> + 'static,
{
    /// Create an async map that runs `op` on `spawner`.
    pub fn new<S>(spawner: S, op: F) -> Self
    where
        S: LocalSpawn + 'static,
    {
        Self::named("async-map", spawner, op)
    }

    /// Create an async map with a custom name.
    ///
    /// The name is shared with the spawned continuations, so it is fixed at
    /// construction rather than set through a builder.
    pub fn named<S>(name: impl Into<String>, spawner: S, op: F) -> Self
    where
        S: LocalSpawn + 'static,
    {
        Self {
            shared: Rc::new(Shared {
                core: TransformCore::new(name),
                phase: Cell::new(AsyncPhase::Idle),
                held: RefCell::new(None),
                end_deferred: Cell::new(false),
            }),
            op: RefCell::new(op),
            spawner: Box::new(spawner),
        }
    }
}

impl<T, U, F> AsyncMap<T, U, F> {
    /// Get the current phase.
    pub fn phase(&self) -> AsyncPhase {
        self.shared.phase()
    }

    /// Check if this transform currently refuses writes.
    pub fn is_paused(&self) -> bool {
        self.shared.core.is_paused()
    }

    /// Check if this transform has ended.
    pub fn is_ended(&self) -> bool {
        self.shared.core.is_ended()
    }

    /// Get how this transform ended, if it has.
    pub fn termination(&self) -> Option<Termination> {
        self.shared.core.termination()
    }
}

impl<T, U, F> std::fmt::Debug for AsyncMap<T, U, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncMap")
            .field("core", &self.shared.core)
            .field("phase", &self.shared.phase())
            .finish_non_exhaustive()
    }
}

impl<T, U, F> Stage for AsyncMap<T, U, F> {
    fn name(&self) -> &str {
        self.shared.core.name()
    }

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }
}

impl<T, U, F, Fut> Sink<T> for AsyncMap<T, U, F>
where
    T: 'static,
    U: 'static,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<U>> + 'static,
{
    fn write(&self, value: T) -> Result<()> {
        let shared = &self.shared;
        shared.core.check_writable()?;

        // Close backpressure before any work starts.
        shared.core.set_paused(true);
        shared.phase.set(AsyncPhase::Pending);

        let fut = (&mut *self.op.borrow_mut())(value);
        let weak: Weak<Shared<T, U>> = Rc::downgrade(shared);
        let name = shared.core.name().to_string();
        self.spawner
            .spawn_local(async move {
                let outcome = fut.await;
                match weak.upgrade() {
                    Some(shared) => shared.complete(outcome),
                    None => tracing::warn!(stage = %name, "stage dropped before operation completed"),
                }
            })
            .map_err(|err| {
                let err = Error::from(err);
                tracing::error!(stage = shared.core.name(), error = %err, "failed to spawn operation");
                shared.phase.set(AsyncPhase::Idle);
                shared.core.end(Some(err.clone()));
                err
            })
    }

    fn end(&self, error: Option<Error>) {
        let shared = &self.shared;
        let in_flight = matches!(shared.phase(), AsyncPhase::Pending | AsyncPhase::Holding);
        if error.is_none() && in_flight {
            tracing::debug!(stage = shared.core.name(), "deferring end until in-flight value is delivered");
            shared.end_deferred.set(true);
            return;
        }
        shared.core.end(error);
    }

    fn is_paused(&self) -> bool {
        self.shared.core.is_paused()
    }

    fn is_ended(&self) -> bool {
        self.shared.core.is_ended()
    }

    fn set_source(&self, source: Weak<dyn Source<T>>) -> Result<()> {
        self.shared.core.set_source(source)
    }

    fn has_source(&self) -> bool {
        self.shared.core.has_source()
    }
}

impl<T, U, F> Source<U> for AsyncMap<T, U, F> {
    fn resume(&self) {
        self.shared.resume();
    }

    fn is_ended(&self) -> bool {
        self.shared.core.is_ended()
    }

    fn set_sink(&self, sink: Weak<dyn Sink<U>>) -> Result<()> {
        self.shared.core.set_sink(sink)
    }

    fn has_sink(&self) -> bool {
        self.shared.core.has_sink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::testing::ProbeSink;
    use crate::elements::{Collect, Values};
    use crate::link::link;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;
    use std::collections::VecDeque;

    type Gates<T> = Rc<RefCell<VecDeque<(T, oneshot::Sender<Result<T>>)>>>;

    /// An operation whose completion the test controls by hand.
    fn gated<T: 'static>(
        gates: &Gates<T>,
    ) -> impl FnMut(T) -> futures::future::LocalBoxFuture<'static, Result<T>> + use<T> {
        let gates = Rc::clone(gates);
        move |value| {
            let (tx, rx) = oneshot::channel();
            gates.borrow_mut().push_back((value, tx));
            Box::pin(async move { rx.await.unwrap_or_else(|_| Err(Error::msg("gate dropped"))) })
        }
    }

    fn open_next(gates: &Gates<i32>, f: impl FnOnce(i32) -> Result<i32>) {
        let (value, tx) = gates.borrow_mut().pop_front().expect("no operation in flight");
        tx.send(f(value)).ok();
    }

    #[test]
    fn test_async_map_scenario() {
        let mut pool = LocalPool::new();
        let src = Rc::new(Values::new(vec![1, 2, 3]));
        let tenfold = Rc::new(AsyncMap::new(pool.spawner(), |x: i32| async move {
            Ok::<_, Error>(x * 10)
        }));
        let (sink, mut done) = Collect::channel();
        let sink = Rc::new(sink);

        link(&src, &tenfold).unwrap();
        link(&tenfold, &sink).unwrap();

        // Nothing completes until the executor gets a turn.
        assert_eq!(tenfold.phase(), AsyncPhase::Pending);
        assert!(sink.is_empty());
        assert_eq!(src.emitted(), 1);

        pool.run_until_stalled();

        let completion = done.try_recv().unwrap().unwrap();
        assert!(completion.error.is_none());
        assert_eq!(completion.items, vec![10, 20, 30]);
        assert_eq!(tenfold.phase(), AsyncPhase::Ended);
    }

    #[test]
    fn test_one_value_in_flight() {
        let mut pool = LocalPool::new();
        let gates: Gates<i32> = Rc::default();
        let src = Rc::new(Values::new(vec![1, 2, 3]));
        let op = Rc::new(AsyncMap::new(pool.spawner(), gated(&gates)));
        let probe = Rc::new(ProbeSink::new());

        link(&src, &op).unwrap();
        link(&op, &probe).unwrap();

        for expected in [1, 2, 3] {
            pool.run_until_stalled();
            assert_eq!(gates.borrow().len(), 1);
            assert!(op.is_paused());
            assert_eq!(src.emitted(), expected);

            open_next(&gates, |v| Ok(v + 100));
            pool.run_until_stalled();
        }

        assert_eq!(probe.values(), vec![101, 102, 103]);
        assert_eq!(probe.end_calls(), 1);
        assert_eq!(probe.violations(), 0);
        assert!(gates.borrow().is_empty());
    }

    #[test]
    fn test_failure_ends_pipeline() {
        let mut pool = LocalPool::new();
        let src = Rc::new(Values::new(vec![1, 2, 3]));
        let op = Rc::new(AsyncMap::new(pool.spawner(), |x: i32| async move {
            if x == 2 {
                Err(Error::msg("second value failed"))
            } else {
                Ok(x)
            }
        }));
        let probe = Rc::new(ProbeSink::new());

        link(&src, &op).unwrap();
        link(&op, &probe).unwrap();
        pool.run_until_stalled();

        assert_eq!(probe.values(), vec![1]);
        assert_eq!(probe.end_calls(), 1);
        let termination = probe.termination().unwrap();
        assert_eq!(termination.error().unwrap().to_string(), "second value failed");

        assert!(op.termination().unwrap().is_failed());
        assert!(op.is_paused());
        // The third value was never pulled.
        assert_eq!(src.emitted(), 2);
        assert!(!src.is_ended());
    }

    #[test]
    fn test_holds_result_while_downstream_paused() {
        let mut pool = LocalPool::new();
        let gates: Gates<i32> = Rc::default();
        let src = Rc::new(Values::new(vec![7, 8]));
        let op = Rc::new(AsyncMap::new(pool.spawner(), gated(&gates)));
        let probe = Rc::new(ProbeSink::new());

        link(&src, &op).unwrap();
        link(&op, &probe).unwrap();
        pool.run_until_stalled();

        // Something else applies backpressure while 7 is in flight.
        probe.pause();
        open_next(&gates, Ok);
        pool.run_until_stalled();
        assert_eq!(op.phase(), AsyncPhase::Holding);
        assert!(probe.is_empty());

        probe.release();
        assert_eq!(probe.values(), vec![7]);
        assert_eq!(op.phase(), AsyncPhase::Pending);

        pool.run_until_stalled();
        open_next(&gates, Ok);
        pool.run_until_stalled();
        assert_eq!(probe.values(), vec![7, 8]);
        assert_eq!(probe.end_calls(), 1);
        assert_eq!(probe.violations(), 0);
    }

    #[test]
    fn test_resume_while_pending_does_not_pull() {
        let mut pool = LocalPool::new();
        let gates: Gates<i32> = Rc::default();
        let src = Rc::new(Values::new(vec![1, 2]));
        let op = Rc::new(AsyncMap::new(pool.spawner(), gated(&gates)));
        let probe = Rc::new(ProbeSink::new());

        link(&src, &op).unwrap();
        link(&op, &probe).unwrap();

        probe.release();
        probe.release();
        assert_eq!(src.emitted(), 1);
        assert_eq!(op.phase(), AsyncPhase::Pending);
    }

    #[test]
    fn test_normal_end_waits_for_in_flight_value() {
        let mut pool = LocalPool::new();
        let gates: Gates<i32> = Rc::default();
        let op = Rc::new(AsyncMap::new(pool.spawner(), gated(&gates)));
        let probe = Rc::new(ProbeSink::new());
        link(&op, &probe).unwrap();

        Sink::write(&*op, 5).unwrap();
        Sink::end(&*op, None);
        assert_eq!(probe.end_calls(), 0);
        assert!(!op.is_ended());

        pool.run_until_stalled();
        open_next(&gates, |v| Ok(v * 2));
        pool.run_until_stalled();

        assert_eq!(probe.values(), vec![10]);
        assert_eq!(probe.end_calls(), 1);
        assert!(!probe.termination().unwrap().is_failed());
    }

    #[test]
    fn test_error_end_discards_in_flight_value() {
        let mut pool = LocalPool::new();
        let gates: Gates<i32> = Rc::default();
        let op = Rc::new(AsyncMap::new(pool.spawner(), gated(&gates)));
        let probe = Rc::new(ProbeSink::new());
        link(&op, &probe).unwrap();

        Sink::write(&*op, 5).unwrap();
        Sink::end(&*op, Some(Error::msg("source failed")));
        assert_eq!(probe.end_calls(), 1);

        pool.run_until_stalled();
        open_next(&gates, Ok);
        pool.run_until_stalled();

        assert!(probe.is_empty());
        assert_eq!(probe.writes_after_end(), 0);
        assert_eq!(probe.end_calls(), 1);
    }

    #[test]
    fn test_spawn_failure_ends_stage() {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        // A pool that is gone refuses new tasks.
        drop(pool);

        let op = Rc::new(AsyncMap::new(spawner, |x: i32| async move { Ok::<_, Error>(x) }));
        let probe = Rc::new(ProbeSink::new());
        link(&op, &probe).unwrap();

        let err = Sink::write(&*op, 1).unwrap_err();
        assert!(matches!(err, Error::Spawn(_)));
        assert_eq!(op.phase(), AsyncPhase::Ended);
        assert!(matches!(
            probe.termination().unwrap().error(),
            Some(Error::Spawn(_))
        ));
    }

    #[test]
    fn test_named_stage() {
        let pool = LocalPool::new();
        let op = AsyncMap::named("lookup", pool.spawner(), |x: u8| async move {
            Ok::<_, Error>(x)
        });
        assert_eq!(op.name(), "lookup");
        assert_eq!(op.phase(), AsyncPhase::Idle);

        let debug = format!("{op:?}");
        assert!(debug.contains("lookup"), "{debug}");
        assert!(debug.contains("Idle"), "{debug}");

        let default = AsyncMap::new(pool.spawner(), |x: u8| async move { Ok::<_, Error>(x) });
        assert_eq!(default.name(), "async-map");
    }

    #[test]
    fn test_write_while_pending_is_rejected() {
        let pool = LocalPool::new();
        let gates: Gates<i32> = Rc::default();
        let op = Rc::new(AsyncMap::new(pool.spawner(), gated(&gates)));
        let probe = Rc::new(ProbeSink::new());
        link(&op, &probe).unwrap();

        Sink::write(&*op, 1).unwrap();
        let err = Sink::write(&*op, 2).unwrap_err();
        assert!(matches!(err, Error::BackpressureViolation { .. }));
    }
}
