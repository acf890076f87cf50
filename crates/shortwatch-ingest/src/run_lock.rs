//! Run-level mutual exclusion.
//!
//! One lock is held for a full multi-jurisdiction pass. A second trigger
//! while it is held is rejected, not queued.

use crate::error::{IngestError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared in-progress flag.
#[derive(Debug, Clone, Default)]
pub struct RunLock {
    held: Arc<AtomicBool>,
}

impl RunLock {
    /// A released lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or fail with [`IngestError::AlreadyRunning`].
    pub fn try_acquire(&self) -> Result<RunGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| IngestError::AlreadyRunning)?;
        Ok(RunGuard {
            held: Arc::clone(&self.held),
        })
    }

    /// Whether a run currently holds the lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Releases the lock when dropped.
#[derive(Debug)]
pub struct RunGuard {
    held: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Cooperative cancellation flag, checked between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    requested: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Ask the current run to stop at the next step boundary.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.requested.store(false, Ordering::Release);
    }
}
