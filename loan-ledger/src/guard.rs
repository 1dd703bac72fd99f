//! Global reentrancy guard
//!
//! Wraps every value-moving transition end-to-end. Transitions from different
//! threads queue on the guard's lock and run one after another. A collaborator
//! that calls back into the ledger on the thread of an in-flight transition
//! gets [`Error::ReentrantCall`](crate::Error::ReentrantCall) instead of a
//! second, nested transition.

use crate::{Error, Result};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::Cell;

/// Serializes transitions and flags nested ones
///
/// The lock is reentrant so the owning thread can reach the flag again from a
/// hook; other threads block until the owner is done.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: ReentrantMutex<Cell<bool>>,
}

impl ReentrancyGuard {
    /// Create an unlocked guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the guarded section
    ///
    /// Blocks while another thread holds the guard. The returned token clears
    /// the flag and releases the lock when dropped, on every exit path.
    pub fn enter(&self) -> Result<Entered<'_>> {
        let lock = self.entered.lock();
        if lock.replace(true) {
            tracing::debug!("Rejected nested transition");
            return Err(Error::ReentrantCall);
        }
        Ok(Entered { lock })
    }

    /// A transition is currently in flight
    pub fn is_entered(&self) -> bool {
        match self.entered.try_lock() {
            Some(lock) => lock.get(),
            None => true,
        }
    }
}

/// Proof of holding the guard
#[derive(Debug)]
pub struct Entered<'a> {
    lock: ReentrantMutexGuard<'a, Cell<bool>>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.lock.set(false);
    }
}
