//! State shared by the driver front end and its worker loops.

use alloc::sync::Arc;

use axerrno::AxResult;

use crate::buffer::HostStack;
use crate::controller::Controller;
use crate::gate::Gate;
use crate::notify::{WakeSignal, WorkSignal};
use crate::platform::Scheduler;
use crate::stats::TransportStats;

/// Everything the submission path, the RX dispatcher and the deferred worker
/// share. Constructed once at enable time and never torn down.
pub(crate) struct Transport<C, H> {
    pub controller: C,
    pub host: H,
    pub gate: Gate,
    pub wake: Arc<WakeSignal>,
    pub work: WorkSignal,
    pub scheduler: Arc<dyn Scheduler>,
    pub stats: TransportStats,
}

impl<C: Controller, H: HostStack> Transport<C, H> {
    pub fn new(controller: C, host: H, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            controller,
            host,
            gate: Gate::new(Arc::clone(&scheduler)),
            wake: Arc::new(WakeSignal::new(Arc::clone(&scheduler))),
            work: WorkSignal::new(Arc::clone(&scheduler)),
            scheduler,
            stats: TransportStats::new(),
        }
    }

    /// Fetches one event under the gate.
    #[inline]
    pub fn fetch_event(&self, buf: &mut [u8]) -> AxResult<bool> {
        self.gate.with(|| self.controller.fetch_event(buf))
    }

    /// Fetches one ACL packet under the gate.
    #[inline]
    pub fn fetch_data(&self, buf: &mut [u8]) -> AxResult<bool> {
        self.gate.with(|| self.controller.fetch_data(buf))
    }

    /// Queues a command under the gate.
    #[inline]
    pub fn put_command(&self, cmd: &[u8]) -> AxResult {
        self.gate.with(|| self.controller.put_command(cmd))
    }
}
