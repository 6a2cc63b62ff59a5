//! Counting, non-coalescing deferred-work signal.
//!
//! The controller requests low-priority housekeeping through a software
//! interrupt. Each request is one unit here and yields exactly one run of the
//! housekeeping routine, however far the worker lags behind.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::platform::Scheduler;

/// Counter of pending housekeeping requests.
pub struct WorkSignal {
    count: AtomicUsize,
    scheduler: Arc<dyn Scheduler>,
}

impl WorkSignal {
    /// Creates a signal with no pending units.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            count: AtomicUsize::new(0),
            scheduler,
        }
    }

    /// Adds one unit of work.
    ///
    /// Returns `false` if the counter is saturated and the unit was dropped.
    #[inline]
    pub fn give(&self) -> bool {
        let added = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_add(1))
            .is_ok();
        if added {
            self.scheduler.notify();
        } else {
            warn!("deferred work counter saturated, request dropped");
        }
        added
    }

    /// Consumes one unit if any is pending.
    #[inline]
    pub fn try_take(&self) -> bool {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
            .is_ok()
    }

    /// Blocks until a unit is pending, then consumes it.
    pub fn take(&self) {
        if self.try_take() {
            return;
        }
        self.scheduler.wait_until(&mut || self.try_take());
    }

    /// Number of units not yet consumed.
    #[inline]
    pub fn pending(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}
