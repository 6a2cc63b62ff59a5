use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use axerrno::{AxError, AxResult};
use axhci::hci::{AclHeader, EVT_CMD_COMPLETE, EVT_LE_META_EVENT};
use axhci::{
    BufType, Controller, DispatchState, DriverConfig, HciBuffer, HciDriver, HostSignal, HostStack,
    ResourceCfg, Scheduler, Timeout, BUILD_REVISION_SIZE,
};

/// Scheduler over a std condition variable.
#[derive(Default)]
struct CondvarScheduler {
    lock: Mutex<()>,
    cond: Condvar,
    isr: AtomicBool,
}

impl Scheduler for CondvarScheduler {
    fn yield_now(&self) {
        thread::yield_now();
    }

    fn wait_until(&self, ready: &mut dyn FnMut() -> bool) {
        let mut guard = self.lock.lock().unwrap();
        while !ready() {
            guard = self.cond.wait(guard).unwrap();
        }
    }

    fn notify(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cond.notify_all();
    }

    fn in_interrupt(&self) -> bool {
        self.isr.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
struct MockController {
    required_memory: usize,
    cfgs: Mutex<Vec<ResourceCfg>>,
    signal: Mutex<Option<HostSignal>>,
    events: Mutex<VecDeque<Vec<u8>>>,
    data: Mutex<VecDeque<Vec<u8>>>,
    /// Hands out an LE Meta event on every fetch.
    endless_events: AtomicBool,
    fail_fetch: AtomicBool,
    tx_full: AtomicBool,
    commands: Mutex<Vec<Vec<u8>>>,
    acl_out: Mutex<Vec<Vec<u8>>>,
    housekeeping: AtomicUsize,
}

impl MockController {
    fn push_event(&self, pkt: &[u8]) {
        self.events.lock().unwrap().push_back(pkt.to_vec());
    }

    fn push_data(&self, pkt: &[u8]) {
        self.data.lock().unwrap().push_back(pkt.to_vec());
    }

    /// Simulates the controller's interrupt raising the host signal.
    fn raise(&self) {
        self.signal.lock().unwrap().as_ref().unwrap().raise();
    }

    fn pop_into(queue: &Mutex<VecDeque<Vec<u8>>>, buf: &mut [u8]) -> bool {
        match queue.lock().unwrap().pop_front() {
            Some(pkt) => {
                buf[..pkt.len()].copy_from_slice(&pkt);
                true
            }
            None => false,
        }
    }
}

impl Controller for MockController {
    fn configure(&self, cfg: ResourceCfg) -> AxResult<usize> {
        self.cfgs.lock().unwrap().push(cfg);
        Ok(self.required_memory)
    }

    fn enable(&self, signal: HostSignal, _mempool: &'static mut [u8]) -> AxResult {
        *self.signal.lock().unwrap() = Some(signal);
        Ok(())
    }

    fn build_revision(&self) -> [u8; BUILD_REVISION_SIZE] {
        [0xA5; BUILD_REVISION_SIZE]
    }

    fn put_command(&self, cmd: &[u8]) -> AxResult {
        self.commands.lock().unwrap().push(cmd.to_vec());
        Ok(())
    }

    fn put_data(&self, acl: &[u8]) -> AxResult {
        if self.tx_full.load(Ordering::Relaxed) {
            return Err(AxError::NoMemory);
        }
        self.acl_out.lock().unwrap().push(acl.to_vec());
        Ok(())
    }

    fn fetch_event(&self, buf: &mut [u8]) -> AxResult<bool> {
        if self.fail_fetch.load(Ordering::Relaxed) {
            return Err(AxError::BadState);
        }
        if self.endless_events.load(Ordering::Relaxed) {
            buf[..3].copy_from_slice(&[EVT_LE_META_EVENT, 0x01, 0x02]);
            return Ok(true);
        }
        Ok(Self::pop_into(&self.events, buf))
    }

    fn fetch_data(&self, buf: &mut [u8]) -> AxResult<bool> {
        if self.fail_fetch.load(Ordering::Relaxed) {
            return Err(AxError::BadState);
        }
        Ok(Self::pop_into(&self.data, buf))
    }

    fn low_prio_tasks(&self) {
        self.housekeeping.fetch_add(1, Ordering::SeqCst);
    }
}

struct Pools {
    events: usize,
    data: usize,
}

struct MockHost {
    pools: Mutex<Pools>,
    freed: Condvar,
    event_waiters: AtomicUsize,
    data_waiters: AtomicUsize,
    /// The event pool refuses requests instead of making them wait.
    refuse_events: AtomicBool,
    keep: bool,
    delivered: Mutex<Vec<(BufType, Vec<u8>, bool)>>,
    delivered_count: AtomicUsize,
}

impl MockHost {
    fn new(events: usize, data: usize) -> Self {
        Self {
            pools: Mutex::new(Pools { events, data }),
            freed: Condvar::new(),
            event_waiters: AtomicUsize::new(0),
            data_waiters: AtomicUsize::new(0),
            refuse_events: AtomicBool::new(false),
            keep: true,
            delivered: Mutex::new(Vec::new()),
            delivered_count: AtomicUsize::new(0),
        }
    }

    fn free_event_buffer(&self) {
        self.pools.lock().unwrap().events += 1;
        self.freed.notify_all();
    }

    fn free_data_buffer(&self) {
        self.pools.lock().unwrap().data += 1;
        self.freed.notify_all();
    }

    fn delivered(&self) -> Vec<(BufType, Vec<u8>, bool)> {
        self.delivered.lock().unwrap().clone()
    }
}

impl HostStack for MockHost {
    fn acquire_buffer(&self, kind: BufType, timeout: Timeout) -> Option<HciBuffer> {
        let data = kind == BufType::AclIn;
        if !data && self.refuse_events.load(Ordering::SeqCst) {
            return None;
        }
        let waiters = if data { &self.data_waiters } else { &self.event_waiters };

        let mut pools = self.pools.lock().unwrap();
        loop {
            let free = if data { &mut pools.data } else { &mut pools.events };
            if *free > 0 {
                *free -= 1;
                return Some(HciBuffer::new(kind));
            }
            if timeout == Timeout::NoWait {
                return None;
            }
            waiters.fetch_add(1, Ordering::SeqCst);
            pools = self.freed.wait(pools).unwrap();
            waiters.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn deliver(&self, buf: HciBuffer, priority: bool) {
        self.delivered_count.fetch_add(1, Ordering::SeqCst);
        if self.keep {
            self.delivered
                .lock()
                .unwrap()
                .push((buf.kind(), buf.as_slice().to_vec(), priority));
        }
    }
}

struct Bench {
    driver: Arc<HciDriver<Arc<MockController>, Arc<MockHost>>>,
    controller: Arc<MockController>,
    host: Arc<MockHost>,
    scheduler: Arc<CondvarScheduler>,
}

fn mempool(len: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; len].into_boxed_slice())
}

fn bench_with(host: MockHost) -> Bench {
    let controller = Arc::new(MockController {
        required_memory: 1024,
        ..Default::default()
    });
    let host = Arc::new(host);
    let scheduler = Arc::new(CondvarScheduler::default());
    let driver = HciDriver::new(
        &DriverConfig::default(),
        Arc::clone(&controller),
        Arc::clone(&host),
        scheduler.clone(),
        mempool(1024),
    )
    .unwrap();
    Bench {
        driver: Arc::new(driver),
        controller,
        host,
        scheduler,
    }
}

fn bench() -> Bench {
    bench_with(MockHost::new(16, 16))
}

const CMD_COMPLETE: [u8; 6] = [EVT_CMD_COMPLETE, 0x04, 0x01, 0x03, 0x0C, 0x00];
const LE_META: [u8; 5] = [EVT_LE_META_EVENT, 0x03, 0x02, 0x01, 0x00];
const ACL: [u8; 9] = [0x23, 0x61, 0x05, 0x00, 1, 2, 3, 4, 5];

#[test]
fn test_startup_pushes_resource_config() {
    let b = bench();
    let cfgs = b.controller.cfgs.lock().unwrap().clone();
    assert_eq!(cfgs, DriverConfig::default().resource_cfgs());
    assert!(b.controller.signal.lock().unwrap().is_some());
    assert!(!b.driver.gate().is_locked());
}

#[test]
fn test_startup_aborts_on_small_mempool() {
    let controller = MockController {
        required_memory: 4096,
        ..Default::default()
    };
    let res = HciDriver::new(
        &DriverConfig::default(),
        controller,
        MockHost::new(1, 1),
        Arc::new(CondvarScheduler::default()),
        mempool(1024),
    );
    assert_eq!(res.err(), Some(AxError::NoMemory));
}

#[test]
fn test_startup_rejects_inconsistent_config() {
    let controller = Arc::new(MockController::default());
    let res = HciDriver::new(
        &DriverConfig::default().with_links(1, 2),
        Arc::clone(&controller),
        MockHost::new(1, 1),
        Arc::new(CondvarScheduler::default()),
        mempool(16),
    );
    assert_eq!(res.err(), Some(AxError::InvalidInput));
    assert!(controller.cfgs.lock().unwrap().is_empty());
}

#[test]
fn test_open_once() {
    let b = bench();
    assert!(b.driver.open().is_ok());
    assert_eq!(b.driver.open().err(), Some(AxError::AlreadyExists));
    assert!(b.driver.deferred_worker().is_ok());
    assert_eq!(b.driver.deferred_worker().err(), Some(AxError::AlreadyExists));
    assert_eq!(b.driver.build_revision(), &[0xA5; BUILD_REVISION_SIZE]);
}

#[test]
fn test_wake_signals_coalesce_into_one_drain() {
    let b = bench();
    let mut rx = b.driver.open().unwrap();

    for _ in 0..5 {
        b.controller.raise();
    }
    assert!(b.driver.wake_pending());

    let outcome = rx.step();
    assert!(outcome.is_idle());
    assert_eq!(rx.state(), DispatchState::BlockedWaiting);
    assert_eq!(b.driver.stats().wakeups(), 1);
    assert!(!b.driver.wake_pending());
}

#[test]
fn test_dispatcher_drains_until_idle() {
    let b = bench();
    let mut rx = b.driver.open().unwrap();
    for _ in 0..3 {
        b.controller.push_event(&LE_META);
    }
    b.controller.raise();

    for _ in 0..3 {
        assert!(rx.step().event);
        assert_eq!(rx.state(), DispatchState::Draining);
    }
    assert!(rx.step().is_idle());
    assert_eq!(rx.state(), DispatchState::BlockedWaiting);

    assert_eq!(b.host.delivered().len(), 3);
    assert_eq!(b.driver.stats().wakeups(), 1);
    assert_eq!(b.driver.stats().events(), 3);
}

#[test]
fn test_events_framed_before_data() {
    let b = bench();
    let mut rx = b.driver.open().unwrap();
    b.controller.push_data(&ACL);
    b.controller.push_event(&LE_META);
    b.controller.raise();

    let outcome = rx.step();
    assert!(outcome.event && outcome.data);

    let delivered = b.host.delivered();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].0, BufType::Evt);
    assert_eq!(delivered[1].0, BufType::AclIn);
    assert_eq!(delivered[1].1, ACL);
}

#[test]
fn test_cmd_complete_delivered_on_priority_path() {
    let b = bench();
    let mut rx = b.driver.open().unwrap();
    b.controller.push_event(&CMD_COMPLETE);
    b.controller.raise();
    rx.step();

    let delivered = b.host.delivered();
    assert_eq!(delivered, vec![(BufType::CmdComplete, CMD_COMPLETE.to_vec(), true)]);
    assert_eq!(b.driver.stats().priority_events(), 1);
}

#[test]
fn test_event_dropped_when_pool_refuses() {
    let host = MockHost::new(0, 4);
    host.refuse_events.store(true, Ordering::SeqCst);
    let b = bench_with(host);
    let mut rx = b.driver.open().unwrap();
    b.controller.push_event(&LE_META);
    b.controller.push_data(&ACL);
    b.controller.raise();

    let outcome = rx.step();
    assert!(outcome.event && outcome.data);
    assert_eq!(b.driver.stats().events_dropped(), 1);
    assert_eq!(b.host.delivered().len(), 1);
    assert_eq!(b.host.delivered()[0].0, BufType::AclIn);
}

#[test]
fn test_cmd_complete_waits_for_reserved_buffer() {
    let b = bench_with(MockHost::new(0, 4));
    let mut rx = b.driver.open().unwrap();
    b.controller.push_event(&CMD_COMPLETE);
    b.controller.raise();

    let handle = thread::spawn(move || rx.step());

    while b.host.event_waiters.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(b.controller.events.lock().unwrap().is_empty());
    assert!(b.host.delivered().is_empty());
    assert!(!handle.is_finished());

    b.host.free_event_buffer();
    assert!(handle.join().unwrap().event);
    assert_eq!(
        b.host.delivered(),
        vec![(BufType::CmdComplete, CMD_COMPLETE.to_vec(), true)]
    );
    assert_eq!(b.driver.stats().events_dropped(), 0);
}

#[test]
fn test_data_waits_for_host_buffer() {
    let b = bench_with(MockHost::new(4, 0));
    let mut rx = b.driver.open().unwrap();
    b.controller.push_data(&ACL);
    b.controller.raise();

    let handle = thread::spawn(move || rx.step());

    while b.host.data_waiters.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    // Fetched, not dropped, not delivered yet.
    assert!(b.controller.data.lock().unwrap().is_empty());
    assert!(b.host.delivered().is_empty());
    assert!(!handle.is_finished());

    b.host.free_data_buffer();
    let outcome = handle.join().unwrap();
    assert!(outcome.data);

    let delivered = b.host.delivered();
    assert_eq!(delivered, vec![(BufType::AclIn, ACL.to_vec(), false)]);
    let hdr = AclHeader::parse(&delivered[0].1).unwrap();
    assert_eq!((hdr.handle, hdr.pb_flag, hdr.bc_flag, hdr.len), (0x123, 0b10, 0b01, 5));
}

#[test]
fn test_fetch_failure_counts_as_nothing() {
    let b = bench();
    let mut rx = b.driver.open().unwrap();
    b.controller.fail_fetch.store(true, Ordering::Relaxed);
    b.controller.raise();

    assert!(rx.step().is_idle());
    assert_eq!(b.driver.stats().fetch_errors(), 2);
    assert_eq!(rx.state(), DispatchState::BlockedWaiting);
}

#[test]
fn test_dispatcher_wakes_on_controller_signal() {
    let b = bench();
    let mut rx = b.driver.open().unwrap();
    let handle = thread::spawn(move || {
        let outcome = rx.step();
        (outcome, rx)
    });

    thread::sleep(Duration::from_millis(20));
    assert!(!handle.is_finished());

    b.controller.push_event(&LE_META);
    b.controller.raise();
    let (outcome, rx) = handle.join().unwrap();
    assert!(outcome.event);
    assert_eq!(rx.state(), DispatchState::Draining);
}

#[test]
fn test_empty_packet_rejected_without_gate() {
    let b = bench();
    let before = b.driver.gate().acquisitions();

    let err = b.driver.send(HciBuffer::new(BufType::Cmd)).unwrap_err();
    assert_eq!(err.error, AxError::InvalidInput);
    assert_eq!(err.packet.kind(), BufType::Cmd);
    assert_eq!(b.driver.gate().acquisitions(), before);
    assert!(!b.driver.wake_pending());
}

#[test]
fn test_command_submission_wakes_dispatcher() {
    let b = bench();
    let cmd = HciBuffer::from_slice(BufType::Cmd, &[0x03, 0x0C, 0x00]).unwrap();
    assert!(b.driver.send(cmd).is_ok());

    assert_eq!(*b.controller.commands.lock().unwrap(), vec![vec![0x03, 0x0C, 0x00]]);
    assert!(b.driver.wake_pending());
    assert!(!b.driver.gate().is_locked());
    assert_eq!(b.driver.stats().commands_sent(), 1);
}

#[cfg(feature = "conn")]
#[test]
fn test_acl_submission_wakes_only_on_failure() {
    let b = bench();
    let acl = HciBuffer::from_slice(BufType::AclOut, &ACL).unwrap();

    assert!(b.driver.send(acl.clone()).is_ok());
    assert!(!b.driver.wake_pending());
    assert_eq!(b.controller.acl_out.lock().unwrap().len(), 1);

    b.controller.tx_full.store(true, Ordering::Relaxed);
    let err = b.driver.send(acl).unwrap_err();
    assert_eq!(err.error, AxError::NoMemory);
    assert_eq!(err.packet.as_slice(), &ACL);
    assert!(b.driver.wake_pending());
    assert!(!b.driver.gate().is_locked());
}

#[cfg(not(feature = "conn"))]
#[test]
fn test_acl_submission_unsupported() {
    let b = bench();
    let acl = HciBuffer::from_slice(BufType::AclOut, &ACL).unwrap();
    assert_eq!(b.driver.send(acl).unwrap_err().error, AxError::Unsupported);
}

#[test]
fn test_inbound_types_rejected() {
    let b = bench();
    let evt = HciBuffer::from_slice(BufType::Evt, &LE_META).unwrap();
    assert_eq!(b.driver.send(evt).unwrap_err().error, AxError::InvalidInput);
    assert_eq!(b.driver.stats().send_errors(), 1);
}

#[test]
fn test_busy_gate_fails_fast_in_interrupt_context() {
    let b = bench();
    let guard = b.driver.gate().acquire().unwrap();
    b.scheduler.isr.store(true, Ordering::Relaxed);

    let cmd = HciBuffer::from_slice(BufType::Cmd, &[0x03, 0x0C, 0x00]).unwrap();
    let err = b.driver.send(cmd).unwrap_err();
    assert_eq!(err.error, AxError::ResourceBusy);
    assert!(!b.driver.wake_pending());
    assert!(b.controller.commands.lock().unwrap().is_empty());

    b.scheduler.isr.store(false, Ordering::Relaxed);
    drop(guard);
    assert!(b.driver.send(err.packet).is_ok());
}

#[test]
fn test_housekeeping_runs_once_per_signal() {
    let b = bench();
    let worker = b.driver.deferred_worker().unwrap();
    for _ in 0..7 {
        b.driver.signalling_handler();
    }
    assert_eq!(worker.backlog(), 7);

    for _ in 0..7 {
        worker.step();
    }
    assert_eq!(b.controller.housekeeping.load(Ordering::SeqCst), 7);
    assert_eq!(worker.backlog(), 0);
    assert_eq!(b.driver.stats().housekeeping_runs(), 7);
}

#[test]
fn test_housekeeping_progresses_under_sustained_rx_load() {
    let mut host = MockHost::new(usize::MAX, 0);
    host.keep = false;
    let b = bench_with(host);
    b.controller.endless_events.store(true, Ordering::Relaxed);

    let stop = Arc::new(AtomicBool::new(false));
    let mut rx = b.driver.open().unwrap();
    let rx_stop = Arc::clone(&stop);
    let rx_handle = thread::spawn(move || {
        while !rx_stop.load(Ordering::Relaxed) {
            rx.step();
        }
    });
    b.controller.raise();

    let worker = b.driver.deferred_worker().unwrap();
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0..10 {
            worker.step();
        }
        done_tx.send(()).unwrap();
    });

    for _ in 0..10 {
        b.driver.signalling_handler();
    }
    assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    assert_eq!(b.controller.housekeeping.load(Ordering::SeqCst), 10);

    stop.store(true, Ordering::Relaxed);
    rx_handle.join().unwrap();
    assert!(b.host.delivered_count.load(Ordering::SeqCst) > 0);
}
