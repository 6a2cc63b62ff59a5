//! RX dispatch loop.
//!
//! A single consumer drains both controller egress queues into the host.
//!
//! ```text
//!                 wake taken
//!  ┌────────────────┐ ─────────▶ ┌──────────┐
//!  │ BlockedWaiting │            │ Draining │ ◀─┐ event or data
//!  └────────────────┘ ◀───────── └──────────┘ ──┘ fetched
//!       nothing fetched in a full iteration
//! ```
//!
//! Every iteration tries one event first, then one ACL packet, and yields
//! to equal-priority threads at the end. The loop only parks on the wake
//! signal after an iteration in which neither queue produced anything, so
//! the controller's level of pending work, not the number of wake-ups,
//! decides how long it keeps draining.

use alloc::sync::Arc;

use axerrno::AxError;

use crate::buffer::HostStack;
use crate::controller::Controller;
use crate::demux::{self, Route};
use crate::hci::HCI_MSG_BUFFER_MAX_SIZE;
use crate::transport::Transport;

/// Dispatcher states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Parked until the controller raises the wake signal.
    BlockedWaiting,
    /// Work was found last iteration; poll again without waiting.
    Draining,
}

/// What one iteration fetched from the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub event: bool,
    pub data: bool,
}

impl DrainOutcome {
    #[inline]
    pub fn is_idle(&self) -> bool {
        !self.event && !self.data
    }
}

/// The RX dispatcher. Obtained from [`HciDriver::open`](crate::HciDriver::open)
/// and run on its own thread.
pub struct RxDispatcher<C, H> {
    transport: Arc<Transport<C, H>>,
    /// Raw packet buffer, reused for every fetch.
    buffer: [u8; HCI_MSG_BUFFER_MAX_SIZE],
    state: DispatchState,
}

impl<C: Controller, H: HostStack> RxDispatcher<C, H> {
    pub(crate) fn new(transport: Arc<Transport<C, H>>) -> Self {
        Self {
            transport,
            buffer: [0; HCI_MSG_BUFFER_MAX_SIZE],
            state: DispatchState::BlockedWaiting,
        }
    }

    #[inline]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Runs the dispatcher forever.
    pub fn run(mut self) -> ! {
        debug!("RX dispatcher started");
        loop {
            self.step();
        }
    }

    /// Runs one iteration, parking first if the previous one found nothing.
    pub fn step(&mut self) -> DrainOutcome {
        if self.state == DispatchState::BlockedWaiting {
            self.transport.wake.take();
            self.transport.stats.record_wakeup();
        }

        let outcome = DrainOutcome {
            event: self.process_event(),
            data: self.process_data(),
        };

        self.state = if outcome.is_idle() {
            DispatchState::BlockedWaiting
        } else {
            DispatchState::Draining
        };

        // Let other threads of same priority run in between.
        self.transport.scheduler.yield_now();
        outcome
    }

    /// Fetches and frames one event. Returns `true` if one was fetched.
    fn process_event(&mut self) -> bool {
        let t = &*self.transport;
        match t.fetch_event(&mut self.buffer) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("event fetch failed: {:?}", e);
                t.stats.record_fetch_error();
                return false;
            }
        }

        match demux::frame_event(&t.host, &self.buffer) {
            Ok(Route::Priority) => t.stats.record_priority_event(),
            Ok(Route::Normal) => t.stats.record_event(),
            Err(AxError::NoMemory) => t.stats.record_event_dropped(),
            Err(e) => {
                error!("dropping malformed event: {:?}", e);
                t.stats.record_malformed();
            }
        }
        true
    }

    /// Fetches and frames one ACL packet. Returns `true` if one was fetched.
    fn process_data(&mut self) -> bool {
        let t = &*self.transport;
        match t.fetch_data(&mut self.buffer) {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                warn!("data fetch failed: {:?}", e);
                t.stats.record_fetch_error();
                return false;
            }
        }

        match demux::frame_data(&t.host, &self.buffer) {
            Ok(_) => t.stats.record_acl_packet(),
            Err(e) => {
                error!("dropping ACL packet: {:?}", e);
                t.stats.record_malformed();
            }
        }
        true
    }
}
