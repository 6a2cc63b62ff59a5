//! Mutual-exclusion gate over the controller's ingress and egress queues.
//!
//! The controller library is not reentrant: its HCI queues are touched by the
//! RX dispatcher, by host threads submitting commands and, indirectly, by code
//! running in interrupt context. Every one of those accesses goes through the
//! [`Gate`].
//!
//! # Design
//!
//! The gate holds the ticket of its current holder, or zero when free. A
//! ticket is taken with compare-and-swap:
//!
//! - From thread context a busy gate parks the caller on the platform
//!   scheduler until the holder releases it.
//! - From interrupt context a busy gate fails immediately with
//!   `ResourceBusy`; waiting there would deadlock against the preempted
//!   holder.
//!
//! Release happens when the [`GateGuard`] is dropped, so early returns and `?`
//! never leak the gate. A holder that has to release from another scope turns
//! its guard into a [`GateTicket`] and hands that to [`Gate::release`]. Only
//! the ticket of the current holder opens the gate.

use alloc::sync::Arc;
use core::mem::ManuallyDrop;
use core::sync::atomic::{AtomicUsize, Ordering};

use axerrno::{ax_err, AxResult};

use crate::platform::Scheduler;

const FREE: usize = 0;

/// The controller access gate.
pub struct Gate {
    /// Ticket of the current holder, [`FREE`] when nobody holds the gate.
    holder: AtomicUsize,
    next_ticket: AtomicUsize,
    /// Platform hooks for parking and context detection.
    scheduler: Arc<dyn Scheduler>,
    /// Number of successful acquisitions.
    acquired: AtomicUsize,
    /// Number of acquisitions refused because the gate was busy.
    refused: AtomicUsize,
}

impl Gate {
    /// Creates a released gate.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            holder: AtomicUsize::new(FREE),
            next_ticket: AtomicUsize::new(1),
            scheduler,
            acquired: AtomicUsize::new(0),
            refused: AtomicUsize::new(0),
        }
    }

    fn new_ticket(&self) -> usize {
        loop {
            let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
            if ticket != FREE {
                return ticket;
            }
        }
    }

    #[inline]
    fn try_lock(&self, ticket: usize) -> bool {
        self.holder
            .compare_exchange(FREE, ticket, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Opens the gate if `ticket` belongs to the current holder.
    fn unlock(&self, ticket: usize) -> bool {
        let opened = self
            .holder
            .compare_exchange(ticket, FREE, Ordering::Release, Ordering::Relaxed)
            .is_ok();
        if opened {
            self.scheduler.notify();
        }
        opened
    }

    /// Acquires the gate.
    ///
    /// # Errors
    ///
    /// Returns `ResourceBusy` if the gate is held and the caller runs in a
    /// context that must not block.
    pub fn acquire(&self) -> AxResult<GateGuard<'_>> {
        let ticket = self.new_ticket();
        if !self.try_lock(ticket) {
            if self.scheduler.in_interrupt() {
                self.refused.fetch_add(1, Ordering::Relaxed);
                return ax_err!(ResourceBusy, "controller gate busy in interrupt context");
            }
            self.scheduler.wait_until(&mut || self.try_lock(ticket));
        }
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(GateGuard { gate: self, ticket })
    }

    /// Runs `f` while holding the gate.
    ///
    /// Gate errors and errors of `f` are returned the same way.
    pub fn with<R>(&self, f: impl FnOnce() -> AxResult<R>) -> AxResult<R> {
        let _guard = self.acquire()?;
        f()
    }

    /// Releases the gate held under `ticket`.
    ///
    /// # Errors
    ///
    /// Returns `BadState` if `ticket` was issued by another gate or does not
    /// belong to the current holder. The gate is left untouched.
    pub fn release(&self, ticket: GateTicket) -> AxResult {
        if ticket.gate != self as *const Gate as usize || !self.unlock(ticket.ticket) {
            warn!("controller gate released by a non-holder");
            return ax_err!(BadState, "controller gate released without holding it");
        }
        Ok(())
    }

    /// Returns `true` while the gate is held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.holder.load(Ordering::Acquire) != FREE
    }

    /// Total successful acquisitions.
    #[inline]
    pub fn acquisitions(&self) -> usize {
        self.acquired.load(Ordering::Relaxed)
    }

    /// Total acquisitions refused with `ResourceBusy`.
    #[inline]
    pub fn refusals(&self) -> usize {
        self.refused.load(Ordering::Relaxed)
    }
}

/// Scoped ownership of the [`Gate`]; releases it on drop.
pub struct GateGuard<'a> {
    gate: &'a Gate,
    ticket: usize,
}

impl GateGuard<'_> {
    /// Keeps the gate held past the guard's scope.
    ///
    /// The gate stays locked until the returned ticket is passed to
    /// [`Gate::release`].
    pub fn into_ticket(self) -> GateTicket {
        let guard = ManuallyDrop::new(self);
        GateTicket {
            gate: guard.gate as *const Gate as usize,
            ticket: guard.ticket,
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.unlock(self.ticket);
    }
}

/// Proof of holding a [`Gate`], detached from any scope.
#[must_use = "the gate stays locked until the ticket is released"]
#[derive(Debug)]
pub struct GateTicket {
    gate: usize,
    ticket: usize,
}
