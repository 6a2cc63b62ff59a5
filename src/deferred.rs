//! Deferred low-priority work loop.
//!
//! Runs the controller's housekeeping once per unit of the work signal. The
//! worker shares the RX dispatcher's priority tier; neither preempts the
//! other, they only alternate at the dispatcher's yield points and whenever
//! one of them parks.

use alloc::sync::Arc;

use crate::buffer::HostStack;
use crate::controller::Controller;
use crate::transport::Transport;

/// The deferred worker. Obtained from
/// [`HciDriver::deferred_worker`](crate::HciDriver::deferred_worker).
pub struct DeferredWorker<C, H> {
    transport: Arc<Transport<C, H>>,
}

impl<C: Controller, H: HostStack> DeferredWorker<C, H> {
    pub(crate) fn new(transport: Arc<Transport<C, H>>) -> Self {
        Self { transport }
    }

    /// Runs the worker forever.
    pub fn run(self) -> ! {
        debug!("deferred worker started");
        loop {
            self.step();
        }
    }

    /// Waits for one unit of work and runs housekeeping once.
    pub fn step(&self) {
        let t = &*self.transport;
        t.work.take();
        trace!("running controller low priority tasks");
        t.controller.low_prio_tasks();
        t.stats.record_housekeeping_run();
    }

    /// Units signalled but not yet run.
    #[inline]
    pub fn backlog(&self) -> usize {
        self.transport.work.pending()
    }
}
