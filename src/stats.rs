//! Transport counters.

use core::sync::atomic::{AtomicUsize, Ordering};

macro_rules! counters {
    ($( $(#[$doc:meta])* $field:ident => $record:ident; )*) => {
        /// Statistics for the transport's packet paths.
        ///
        /// All counters are monotonic and updated with relaxed ordering.
        #[derive(Debug, Default)]
        pub struct TransportStats {
            $( $(#[$doc])* $field: AtomicUsize, )*
        }

        impl TransportStats {
            /// Creates zeroed counters.
            pub fn new() -> Self {
                Self::default()
            }

            $(
                #[inline]
                pub(crate) fn $record(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }

                $(#[$doc])*
                #[inline]
                pub fn $field(&self) -> usize {
                    self.$field.load(Ordering::Relaxed)
                }
            )*
        }
    };
}

counters! {
    /// Events delivered on the regular path.
    events => record_event;
    /// Events delivered on the priority path.
    priority_events => record_priority_event;
    /// ACL packets delivered to the host.
    acl_packets => record_acl_packet;
    /// Events dropped because the host refused an event buffer.
    events_dropped => record_event_dropped;
    /// Packets dropped because their length field was inconsistent.
    malformed => record_malformed;
    /// Fetches that failed on the gate or in the controller.
    fetch_errors => record_fetch_error;
    /// Wake signals consumed by the RX dispatcher.
    wakeups => record_wakeup;
    /// Commands queued to the controller.
    commands_sent => record_command_sent;
    /// ACL packets queued to the controller.
    acl_sent => record_acl_sent;
    /// Rejected submissions.
    send_errors => record_send_error;
    /// Housekeeping runs of the deferred worker.
    housekeeping_runs => record_housekeeping_run;
}

impl TransportStats {
    /// Total packets delivered to the host.
    #[inline]
    pub fn delivered(&self) -> usize {
        self.events() + self.priority_events() + self.acl_packets()
    }
}
