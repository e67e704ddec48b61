//! Single in-flight guard
//!
//! Marks an action as running for as long as the guard lives.

use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    /// `None` when the action is already running
    pub(crate) fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
