//! The link-layer controller as seen from the transport.
//!
//! The controller library owns the radio and its HCI queues. Its queue
//! accessors are not reentrant; the transport only calls them with the
//! [`Gate`](crate::Gate) held.

use alloc::sync::Arc;

use axerrno::AxResult;

use crate::notify::HostSignal;

/// Size of the controller build revision identifier.
pub const BUILD_REVISION_SIZE: usize = 20;

/// One resource setting pushed to the controller before it is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceCfg {
    /// Number of simultaneous central links.
    CentralCount(u8),
    /// Number of simultaneous peripheral links.
    PeripheralCount(u8),
    /// Per-link packet buffer dimensions.
    Buffer {
        tx_packet_size: u16,
        rx_packet_size: u16,
        tx_packet_count: u8,
        rx_packet_count: u8,
    },
    /// Maximum connection event length in microseconds.
    EventLength(u32),
}

/// Controller library interface.
pub trait Controller: Send + Sync {
    /// Applies one resource setting.
    ///
    /// Returns the memory the controller needs with all settings applied so
    /// far.
    fn configure(&self, cfg: ResourceCfg) -> AxResult<usize>;

    /// Starts the controller on `mempool`.
    ///
    /// `signal` is raised, possibly from interrupt context, whenever events
    /// or data are waiting for the host.
    fn enable(&self, signal: HostSignal, mempool: &'static mut [u8]) -> AxResult;

    /// Controller build revision, for diagnostics.
    fn build_revision(&self) -> [u8; BUILD_REVISION_SIZE];

    /// Queues an HCI command for the controller.
    fn put_command(&self, cmd: &[u8]) -> AxResult;

    /// Queues an outgoing ACL packet for the controller.
    fn put_data(&self, acl: &[u8]) -> AxResult;

    /// Copies the next pending event into `buf`.
    ///
    /// Returns `Ok(false)` when no event is pending. Never blocks.
    fn fetch_event(&self, buf: &mut [u8]) -> AxResult<bool>;

    /// Copies the next pending ACL packet into `buf`.
    ///
    /// Returns `Ok(false)` when no packet is pending. Never blocks.
    fn fetch_data(&self, buf: &mut [u8]) -> AxResult<bool>;

    /// Runs the controller's low-priority housekeeping to completion.
    fn low_prio_tasks(&self);
}

impl<T: Controller + ?Sized> Controller for Arc<T> {
    fn configure(&self, cfg: ResourceCfg) -> AxResult<usize> {
        (**self).configure(cfg)
    }

    fn enable(&self, signal: HostSignal, mempool: &'static mut [u8]) -> AxResult {
        (**self).enable(signal, mempool)
    }

    fn build_revision(&self) -> [u8; BUILD_REVISION_SIZE] {
        (**self).build_revision()
    }

    fn put_command(&self, cmd: &[u8]) -> AxResult {
        (**self).put_command(cmd)
    }

    fn put_data(&self, acl: &[u8]) -> AxResult {
        (**self).put_data(acl)
    }

    fn fetch_event(&self, buf: &mut [u8]) -> AxResult<bool> {
        (**self).fetch_event(buf)
    }

    fn fetch_data(&self, buf: &mut [u8]) -> AxResult<bool> {
        (**self).fetch_data(buf)
    }

    fn low_prio_tasks(&self) {
        (**self).low_prio_tasks()
    }
}
