//! Link endpoints held by stages.
//!
//! A link is a pair of non-owning references: the source keeps a
//! [`Downstream`] pointing at its sink and the sink keeps an [`Upstream`]
//! pointing back at the source. Whoever built the pipeline owns the stages.
//!
//! Lookups hand out a strong reference and release the slot before returning,
//! so a stage can call into its peer while the peer calls back into it.

use crate::element::{Sink, Source};
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// The upstream side of a sink: a non-owning reference to its source.
pub struct Upstream<T> {
    source: RefCell<Option<Weak<dyn Source<T>>>>,
}

impl<T> Upstream<T> {
    /// Create an unlinked endpoint.
    pub fn new() -> Self {
        Self {
            source: RefCell::new(None),
        }
    }

    /// Attach the source. Fails if a source is already attached.
    pub fn attach(&self, stage: &str, source: Weak<dyn Source<T>>) -> Result<()> {
        let mut slot = self.source.borrow_mut();
        if slot.is_some() {
            return Err(Error::AlreadyLinked {
                stage: stage.to_string(),
            });
        }
        *slot = Some(source);
        Ok(())
    }

    /// Check if a source has been attached.
    pub fn is_linked(&self) -> bool {
        self.source.borrow().is_some()
    }

    /// Get the source, if it is attached and still alive.
    pub fn get(&self) -> Option<Rc<dyn Source<T>>> {
        self.source.borrow().as_ref().and_then(Weak::upgrade)
    }
}

impl<T> Default for Upstream<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The downstream side of a source: a non-owning reference to its sink.
pub struct Downstream<T> {
    sink: RefCell<Option<Weak<dyn Sink<T>>>>,
}

impl<T> Downstream<T> {
    /// Create an unlinked endpoint.
    pub fn new() -> Self {
        Self {
            sink: RefCell::new(None),
        }
    }

    /// Attach the sink. Fails if a sink is already attached.
    pub fn attach(&self, stage: &str, sink: Weak<dyn Sink<T>>) -> Result<()> {
        let mut slot = self.sink.borrow_mut();
        if slot.is_some() {
            return Err(Error::AlreadyLinked {
                stage: stage.to_string(),
            });
        }
        *slot = Some(sink);
        Ok(())
    }

    /// Check if a sink has been attached.
    pub fn is_linked(&self) -> bool {
        self.sink.borrow().is_some()
    }

    /// Get the sink, if it is attached and still alive.
    pub fn get(&self) -> Option<Rc<dyn Sink<T>>> {
        self.sink.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Get the sink or fail with [`Error::NotLinked`].
    pub fn require(&self, stage: &str) -> Result<Rc<dyn Sink<T>>> {
        self.get().ok_or_else(|| Error::NotLinked {
            stage: stage.to_string(),
        })
    }
}

impl<T> Default for Downstream<T> {
    fn default() -> Self {
        Self::new()
    }
}
