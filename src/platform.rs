//! Scheduling adaptation layer.
//!
//! The bridge never talks to an RTOS directly. Everything that has to suspend
//! a thread, yield a time slice or find out whether the caller runs in
//! interrupt context goes through [`Scheduler`], which the platform port
//! implements once.
//!
//! # Contract
//!
//! - [`Scheduler::notify`] may be called from interrupt context and must not
//!   block there.
//! - [`Scheduler::wait_until`] must re-evaluate `ready` after every
//!   [`Scheduler::notify`] issued after the wait started, so that a notify
//!   racing with the check is never lost.

/// Platform hooks used by the bridge's worker loops.
pub trait Scheduler: Send + Sync {
    /// Gives up the rest of the current time slice to threads of equal
    /// priority.
    fn yield_now(&self);

    /// Suspends the calling thread until `ready` returns `true`.
    ///
    /// `ready` may have side effects (it usually consumes a signal) and is
    /// called at least once.
    fn wait_until(&self, ready: &mut dyn FnMut() -> bool);

    /// Wakes every thread parked in [`Scheduler::wait_until`] so it
    /// re-checks its condition.
    fn notify(&self);

    /// Returns `true` if the caller runs in a context that must not block.
    fn in_interrupt(&self) -> bool {
        false
    }
}
