//! Completion handle for an expectation chain

use crate::result::{ExpectError, Outcome};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{trace, warn};

type FinalCallback = Box<dyn FnOnce(Outcome) + Send>;

/// Handle to the final callback of one `expect` call.
///
/// Every handler of the chain receives a clone; the callback runs exactly once,
/// on whichever of these comes first:
///
/// - a clone calls [`complete`](Done::complete), [`complete_with`](Done::complete_with),
///   [`fail`](Done::fail) or [`finish`](Done::finish) (later calls are ignored);
/// - a sentinel fires that has no handler registered (completes with `Ok(None)`);
/// - the last clone is dropped without any of the above (completes with `Ok(None)`).
///
/// Passing a clone into a nested `expect` keeps the outer chain open until the
/// nested one finishes it.
#[derive(Clone)]
pub struct Done {
    slot: Arc<Slot>,
}

struct Slot {
    callback: Mutex<Option<FinalCallback>>,
}

impl Slot {
    fn take(&self) -> Option<FinalCallback> {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let callback = self
            .callback
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            trace!("completion handle dropped, completing chain");
            callback(Ok(None));
        }
    }
}

impl Done {
    pub(crate) fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        Self {
            slot: Arc::new(Slot {
                callback: Mutex::new(Some(Box::new(callback))),
            }),
        }
    }

    /// Finish the chain with an explicit outcome.
    pub fn finish(self, outcome: Outcome) {
        match self.slot.take() {
            Some(callback) => callback(outcome),
            None => warn!("expectation already completed, ignoring outcome"),
        }
    }

    /// Finish successfully without a value.
    pub fn complete(self) {
        self.finish(Ok(None));
    }

    /// Finish successfully with a value.
    pub fn complete_with(self, value: impl Into<String>) {
        self.finish(Ok(Some(value.into())));
    }

    /// Finish with an error.
    pub fn fail(self, error: ExpectError) {
        self.finish(Err(error));
    }

    /// Whether the final callback has already run
    pub fn is_finished(&self) -> bool {
        self.slot
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Drop the callback without running it (rejected `expect` calls).
    pub(crate) fn defuse(self) {
        drop(self.slot.take());
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("finished", &self.is_finished())
            .finish()
    }
}
