//! Pause gate blocking writers while indexing is paused.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Open/closed gate with a timed wait.
///
/// Writers pass an open gate immediately and wait on a closed one until it
/// opens or the timeout elapses.
#[derive(Debug)]
pub struct PauseGate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PauseGate {
    pub fn new(open: bool) -> Self {
        Self {
            open: Mutex::new(open),
            changed: Condvar::new(),
        }
    }

    pub fn open(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.changed.notify_all();
    }

    pub fn close(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until the gate is open. Returns false on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |open| !*open)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}
