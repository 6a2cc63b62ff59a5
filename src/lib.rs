#![cfg_attr(not(test), no_std)]

//! # Controller HCI transport
//!
//! This crate moves HCI packets between a link-layer controller library,
//! which runs partly in interrupt context, and a host protocol stack running
//! in threads. It is `no_std` and only uses `alloc` for the handles shared
//! between the driver and its two worker loops.
//!
//! ## Architecture
//!
//! ```text
//!  controller ISR ──HostSignal──▶ WakeSignal ──▶ RxDispatcher ──▶ demux ──▶ HostStack
//!        │                                          │  ▲
//!        └──signalling_handler──▶ WorkSignal ──▶ DeferredWorker
//!                                                   │  │
//!  HostStack ──send──▶ HciDriver ──────────▶ Gate ◀─┘  │ (fetch_event / fetch_data)
//!                                              └──────▶ Controller queues
//! ```
//!
//! - [`Gate`]: serializes every access to the controller's HCI queues and
//!   fails fast with `ResourceBusy` where blocking is not allowed.
//! - [`WakeSignal`]: binary, coalescing "data ready" flag raised by the
//!   controller.
//! - [`WorkSignal`]: counting signal for controller housekeeping.
//! - [`RxDispatcher`]: drains events before data, keeps draining while work
//!   exists and yields after every iteration.
//! - [`DeferredWorker`]: one housekeeping run per work unit.
//! - [`HciDriver`]: startup validation and the host-to-controller
//!   submission path.
//!
//! ## Bring-up
//!
//! ```rust,ignore
//! let driver = Arc::new(HciDriver::new(&config, controller, host, scheduler, MEMPOOL)?);
//!
//! let worker = driver.deferred_worker()?;
//! spawn_coop(move || worker.run());
//!
//! let rx = driver.open()?;
//! spawn_coop(move || rx.run());
//!
//! // From the controller's software interrupt:
//! driver.signalling_handler();
//!
//! // From the host:
//! driver.send(HciBuffer::from_slice(BufType::Cmd, &[0x03, 0x0c, 0x00])?)
//!     .map_err(SendError::into_error)?;
//! ```
//!
//! ## Features
//!
//! - `conn` (default): ACL data in both directions and priority routing of
//!   Number Of Completed Packets events.
//! - `assert-handler`: lets the application hook controller assertions via
//!   `set_assert_handler`.

extern crate alloc;
#[macro_use]
extern crate log;

mod buffer;
mod config;
mod controller;
mod deferred;
mod demux;
mod driver;
mod gate;
pub mod hci;
mod notify;
mod platform;
mod rx;
mod stats;
mod transport;

pub use buffer::{BufType, HciBuffer, HostStack, Timeout};
pub use config::DriverConfig;
pub use controller::{Controller, ResourceCfg, BUILD_REVISION_SIZE};
pub use deferred::DeferredWorker;
pub use demux::{frame_data, frame_event, Route};
pub use driver::{assertion_handler, HciDriver, SendError};
pub use gate::{Gate, GateGuard, GateTicket};
pub use notify::{HostSignal, WakeSignal, WorkSignal};
pub use platform::Scheduler;
pub use rx::{DispatchState, DrainOutcome, RxDispatcher};
pub use stats::TransportStats;

#[cfg(feature = "assert-handler")]
pub use driver::set_assert_handler;
