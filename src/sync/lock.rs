//! The single-flight lock that serializes sync runs.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A non-blocking mutual exclusion flag for sync runs.
///
/// Cloning the lock shares the same flag, so coordinators that should never
/// sync at the same time can be given clones of one lock. A lock created with
/// [SyncLock::new] starts released.
#[derive(Debug, Clone, Default)]
pub struct SyncLock {
    in_flight: Arc<AtomicBool>,
}

impl SyncLock {
    /// Create a released lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock without waiting.
    ///
    /// Returns `None` if the lock is already held. The lock is released when
    /// the returned guard is dropped, which also happens when the holder
    /// returns early or unwinds.
    pub fn try_acquire(&self) -> Option<SyncLockGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SyncLockGuard {
                in_flight: self.in_flight.clone(),
            })
    }

    /// Whether a sync currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Holds a [SyncLock] until dropped.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SyncLockGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}
