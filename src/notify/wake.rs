//! Binary, coalescing wake signal.
//!
//! The controller raises this signal from interrupt context whenever it has
//! queued an HCI event or ACL packet for the host. The RX dispatcher consumes
//! it before every drain that starts from idle.
//!
//! Multiple raises before a take collapse into one pending wake; the signal
//! keeps no count. Raising is a single compare-and-swap and never blocks, so
//! it is safe from any context.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::platform::Scheduler;

/// Pending-work flag shared between the controller and the RX dispatcher.
pub struct WakeSignal {
    /// `true` if work was signalled since the last take.
    pending: AtomicBool,
    /// Number of raises that actually moved the flag from 0 to 1.
    raised: AtomicUsize,
    scheduler: Arc<dyn Scheduler>,
}

impl WakeSignal {
    /// Creates a signal with nothing pending.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            pending: AtomicBool::new(false),
            raised: AtomicUsize::new(0),
            scheduler,
        }
    }

    /// Raises the signal.
    ///
    /// Returns `true` if the signal was idle, `false` if a wake was already
    /// pending and this call had no additional effect.
    #[inline]
    pub fn give(&self) -> bool {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.raised.fetch_add(1, Ordering::Relaxed);
            self.scheduler.notify();
            true
        } else {
            false
        }
    }

    /// Consumes the pending wake if there is one.
    #[inline]
    pub fn try_take(&self) -> bool {
        self.pending
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Blocks until a wake is pending, then consumes it.
    pub fn take(&self) {
        if self.try_take() {
            return;
        }
        self.scheduler.wait_until(&mut || self.try_take());
    }

    /// Peeks at the flag without consuming it.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of raises that found the signal idle.
    #[inline]
    pub fn raised(&self) -> usize {
        self.raised.load(Ordering::Relaxed)
    }
}

/// Handle given to the controller so it can wake the host side.
///
/// Cloning is cheap; every clone raises the same [`WakeSignal`].
#[derive(Clone)]
pub struct HostSignal {
    signal: Arc<WakeSignal>,
}

impl HostSignal {
    pub(crate) fn new(signal: Arc<WakeSignal>) -> Self {
        Self { signal }
    }

    /// Tells the RX dispatcher that the controller has data for the host.
    ///
    /// Safe to call from interrupt context.
    #[inline]
    pub fn raise(&self) {
        trace!("host signal");
        self.signal.give();
    }
}
