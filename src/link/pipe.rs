//! The link primitive and its chaining extension.

use crate::element::{Sink, Source};
use crate::error::{Error, Result};
use std::rc::{Rc, Weak};

/// Link `source` to `sink` and start production if `sink` is ready.
///
/// Returns the sink so links can be chained. Re-linking a stage that already
/// has a peer on that side fails with [`Error::AlreadyLinked`] and changes
/// nothing. Linking a stage that has already ended is allowed; it stays inert.
///
/// # Example
///
/// ```rust
/// use pushflow::elements::{Collect, Map, Values};
/// use pushflow::link::link;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let out = Rc::new(RefCell::new(Vec::new()));
/// let out2 = Rc::clone(&out);
///
/// let src = Rc::new(Values::new(vec![1, 2, 3]));
/// let double = Rc::new(Map::new(|x: i32| x * 2));
/// let sink = Rc::new(Collect::new(move |_err, items| *out2.borrow_mut() = items));
///
/// link(&src, &double).unwrap();
/// link(&double, &sink).unwrap();
///
/// assert_eq!(*out.borrow(), vec![2, 4, 6]);
/// ```
pub fn link<T, S, K>(source: &Rc<S>, sink: &Rc<K>) -> Result<Rc<K>>
where
    T: 'static,
    S: Source<T> + 'static,
    K: Sink<T> + 'static,
{
    if source.has_sink() {
        return Err(Error::AlreadyLinked {
            stage: source.name().to_string(),
        });
    }
    if sink.has_source() {
        return Err(Error::AlreadyLinked {
            stage: sink.name().to_string(),
        });
    }

    let downstream: Weak<dyn Sink<T>> = Rc::downgrade(sink) as Weak<K>;
    let upstream: Weak<dyn Source<T>> = Rc::downgrade(source) as Weak<S>;
    source.set_sink(downstream)?;
    sink.set_source(upstream)?;

    tracing::debug!(
        source = source.name(),
        sink = sink.name(),
        paused = sink.is_paused(),
        "linked"
    );

    if !sink.is_paused() {
        source.resume();
    }
    Ok(Rc::clone(sink))
}

/// Chainable linking: `src.pipe(&map)?.pipe(&sink)?`.
pub trait Pipe<T> {
    /// Link `self` to `sink`, see [`link`].
    fn pipe<K>(&self, sink: &Rc<K>) -> Result<Rc<K>>
    where
        K: Sink<T> + 'static;
}

impl<T, S> Pipe<T> for Rc<S>
where
    T: 'static,
    S: Source<T> + 'static,
{
    fn pipe<K>(&self, sink: &Rc<K>) -> Result<Rc<K>>
    where
        K: Sink<T> + 'static,
    {
        link(self, sink)
    }
}
