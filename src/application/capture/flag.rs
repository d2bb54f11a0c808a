//! Continuation flag shared between an engine and its acquisition loop

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether an acquisition loop should keep running.
///
/// Writers mutate it only while holding their engine's state lock and
/// publish with release ordering. The loop polls with acquire loads once per
/// iteration and never takes the lock, so a stop request becomes visible
/// within one capture period.
#[derive(Debug, Default)]
pub struct RecordingFlag(AtomicBool);

impl RecordingFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was set.
    pub(crate) fn lower(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
