//! Termination latch shared by every stage.

use crate::element::Termination;
use crate::error::Error;
use std::cell::RefCell;

/// Records whether, and how, a stage has ended.
///
/// The transition happens at most once and is never undone.
#[derive(Debug, Default)]
pub struct EndState {
    termination: RefCell<Option<Termination>>,
}

impl EndState {
    /// Create a latch for a stage that has not ended.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the stage ended.
    ///
    /// Returns `true` on the first call only; later calls leave the recorded
    /// outcome untouched.
    pub fn finish(&self, error: Option<&Error>) -> bool {
        let mut slot = self.termination.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(Termination::from_end(error.cloned()));
        true
    }

    /// Check if the stage has ended.
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.termination.borrow().is_some()
    }

    /// Get the recorded outcome.
    pub fn termination(&self) -> Option<Termination> {
        self.termination.borrow().clone()
    }
}
