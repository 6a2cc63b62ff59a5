//! Signals crossing from controller context into the worker loops.
//!
//! ```text
//! ┌──────────────────────┐ HostSignal::raise   ┌─────────────────┐
//! │ controller (ISR)     │────────────────────▶│ WakeSignal      │──▶ RxDispatcher
//! │                      │                     │ (binary, 0/1)   │
//! │                      │ signalling_handler  ├─────────────────┤
//! │                      │────────────────────▶│ WorkSignal      │──▶ DeferredWorker
//! └──────────────────────┘                     │ (counting)      │
//!                                              └─────────────────┘
//! ```
//!
//! Both signals are lock-free on the raising side. Waiting goes through the
//! platform [`Scheduler`](crate::platform::Scheduler).

mod wake;
mod work;

pub use wake::{HostSignal, WakeSignal};
pub use work::WorkSignal;
