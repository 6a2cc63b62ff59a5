//! HCI driver front end: startup, submission path and interrupt entry points.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use axerrno::{ax_err, AxError, AxResult};

use crate::buffer::{BufType, HciBuffer, HostStack};
use crate::config::DriverConfig;
use crate::controller::{Controller, BUILD_REVISION_SIZE};
use crate::deferred::DeferredWorker;
use crate::gate::Gate;
use crate::notify::HostSignal;
use crate::platform::Scheduler;
use crate::rx::RxDispatcher;
use crate::stats::TransportStats;
use crate::transport::Transport;

/// A rejected submission. The packet goes back to the caller.
#[derive(Debug)]
pub struct SendError {
    pub error: AxError,
    pub packet: HciBuffer,
}

impl SendError {
    /// Discards the packet and keeps the error.
    pub fn into_error(self) -> AxError {
        self.error
    }
}

/// The virtual HCI driver between the controller library and the host.
pub struct HciDriver<C, H> {
    transport: Arc<Transport<C, H>>,
    rx_taken: AtomicBool,
    worker_taken: AtomicBool,
    revision: spin::Once<[u8; BUILD_REVISION_SIZE]>,
}

impl<C: Controller, H: HostStack> HciDriver<C, H> {
    /// Configures and enables the controller.
    ///
    /// This is the only fallible startup step. On error no driver exists and
    /// startup must not continue.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `config` is inconsistent.
    /// - `NoMemory` if the controller needs more than `mempool`.
    /// - Any error the controller reports while configuring or enabling.
    pub fn new(
        config: &DriverConfig,
        controller: C,
        host: H,
        scheduler: Arc<dyn Scheduler>,
        mempool: &'static mut [u8],
    ) -> AxResult<Self> {
        config.validate().inspect_err(|e| error!("Invalid controller config: {:?}", e))?;

        let mut required = 0;
        for cfg in config.resource_cfgs() {
            required = controller.configure(cfg).inspect_err(|e| {
                error!("Controller rejected {:?}: {:?}", cfg, e);
            })?;
        }

        debug!("BT mempool size: {}, required: {}", mempool.len(), required);
        if required > mempool.len() {
            error!("Allocated memory too low: {} < {}", mempool.len(), required);
            return ax_err!(NoMemory, "controller memory pool too small");
        }

        let transport = Arc::new(Transport::new(controller, host, scheduler));
        let signal = HostSignal::new(Arc::clone(&transport.wake));
        transport
            .gate
            .with(|| transport.controller.enable(signal, mempool))
            .inspect_err(|e| error!("Controller enable failed: {:?}", e))?;

        Ok(Self {
            transport,
            rx_taken: AtomicBool::new(false),
            worker_taken: AtomicBool::new(false),
            revision: spin::Once::new(),
        })
    }

    /// Opens the HCI transport and hands out the RX dispatcher.
    ///
    /// The caller runs [`RxDispatcher::run`] on a cooperative thread sharing
    /// the deferred worker's priority.
    pub fn open(&self) -> AxResult<RxDispatcher<C, H>> {
        if self.rx_taken.swap(true, Ordering::AcqRel) {
            return ax_err!(AlreadyExists, "HCI driver already open");
        }
        debug!("Open");

        let revision = self.build_revision();
        info!("BLE controller build revision: {:02x?}", revision);

        Ok(RxDispatcher::new(Arc::clone(&self.transport)))
    }

    /// Hands out the deferred housekeeping worker.
    ///
    /// Available right after enable, so controller housekeeping runs even if
    /// the host never opens the transport.
    pub fn deferred_worker(&self) -> AxResult<DeferredWorker<C, H>> {
        if self.worker_taken.swap(true, Ordering::AcqRel) {
            return ax_err!(AlreadyExists, "deferred worker already taken");
        }
        Ok(DeferredWorker::new(Arc::clone(&self.transport)))
    }

    /// Controller build revision, read once.
    pub fn build_revision(&self) -> &[u8; BUILD_REVISION_SIZE] {
        self.revision
            .call_once(|| self.transport.controller.build_revision())
    }

    /// Submits a host packet to the controller.
    ///
    /// On success the packet is consumed. On failure it comes back inside
    /// [`SendError`].
    ///
    /// Commands always wake the RX dispatcher after a successful put, since
    /// their completion has to be polled for. ACL data only wakes it when the
    /// put fails: the controller is then short of room and the dispatcher
    /// has to drain before the host retries.
    pub fn send(&self, packet: HciBuffer) -> Result<(), SendError> {
        trace!("Enter");
        if packet.is_empty() {
            debug!("Empty HCI packet");
            return self.reject(AxError::InvalidInput, packet);
        }

        let res = match packet.kind() {
            BufType::Cmd => {
                debug!("CMD");
                self.cmd_handle(&packet)
            }
            BufType::AclOut => {
                debug!("ACL_OUT");
                self.acl_handle(&packet)
            }
            other => {
                debug!("Unknown HCI type {:?}", other);
                Err(AxError::InvalidInput)
            }
        };

        match res {
            Ok(()) => {
                trace!("Exit");
                Ok(())
            }
            Err(e) => self.reject(e, packet),
        }
    }

    fn reject(&self, error: AxError, packet: HciBuffer) -> Result<(), SendError> {
        self.transport.stats.record_send_error();
        Err(SendError { error, packet })
    }

    fn cmd_handle(&self, cmd: &HciBuffer) -> AxResult {
        let t = &*self.transport;
        t.put_command(cmd.as_slice())?;
        t.stats.record_command_sent();
        t.wake.give();
        Ok(())
    }

    #[cfg(feature = "conn")]
    fn acl_handle(&self, acl: &HciBuffer) -> AxResult {
        let t = &*self.transport;
        let guard = t.gate.acquire()?;
        let res = t.controller.put_data(acl.as_slice());
        drop(guard);

        match res {
            Ok(()) => t.stats.record_acl_sent(),
            // Likely buffer overflow event
            Err(_) => {
                t.wake.give();
            }
        }
        res
    }

    #[cfg(not(feature = "conn"))]
    fn acl_handle(&self, _acl: &HciBuffer) -> AxResult {
        ax_err!(Unsupported, "ACL data requires the conn feature")
    }

    /// Controller callback: events or data are waiting for the host.
    ///
    /// Interrupt safe. The controller normally raises this through the
    /// [`HostSignal`] it was enabled with.
    #[inline]
    pub fn host_signal(&self) {
        self.transport.wake.give();
    }

    /// Software interrupt handler requesting controller housekeeping.
    ///
    /// Interrupt safe. Each call results in exactly one housekeeping run.
    #[inline]
    pub fn signalling_handler(&self) {
        self.transport.work.give();
    }

    /// The controller access gate.
    #[inline]
    pub fn gate(&self) -> &Gate {
        &self.transport.gate
    }

    #[inline]
    pub fn stats(&self) -> &TransportStats {
        &self.transport.stats
    }

    /// Returns `true` if a wake is pending for the RX dispatcher.
    #[inline]
    pub fn wake_pending(&self) -> bool {
        self.transport.wake.is_pending()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "assert-handler")] {
        /// Application hook for controller assertions.
        static ASSERT_HANDLER: spin::Once<fn(&str, u32)> = spin::Once::new();

        /// Installs the application's controller assertion hook.
        ///
        /// Only the first installation takes effect.
        pub fn set_assert_handler(handler: fn(&str, u32)) {
            ASSERT_HANDLER.call_once(|| handler);
        }

        fn assert_hook(file: &str, line: u32) {
            if let Some(handler) = ASSERT_HANDLER.get() {
                handler(file, line);
            }
        }
    } else {
        fn assert_hook(_file: &str, _line: u32) {}
    }
}

/// Reports a failed assertion inside the controller library.
///
/// The controller is in an undefined state afterwards, so this never returns.
pub fn assertion_handler(file: &str, line: u32) -> ! {
    assert_hook(file, line);
    error!("BleCtlr ASSERT: {}, {}", file, line);
    panic!("controller assertion at {}:{}", file, line);
}
