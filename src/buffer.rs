//! Typed HCI buffers and the host stack contract.
//!
//! Buffers have fixed capacity and live in pools owned by the host. The
//! transport borrows one per received packet, fills it and hands it back
//! through [`HostStack::deliver`]; it never touches the buffer afterwards.

use alloc::sync::Arc;

use arrayvec::ArrayVec;
use axerrno::{ax_err, AxResult};

use crate::hci::HCI_MSG_BUFFER_MAX_SIZE;

/// Buffer category, which is also the HCI packet type it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufType {
    /// Host to controller command.
    Cmd,
    /// Controller to host event.
    Evt,
    /// Command Complete / Command Status event, from the reserved pool.
    CmdComplete,
    /// Host to controller ACL data.
    AclOut,
    /// Controller to host ACL data.
    AclIn,
}

/// How long [`HostStack::acquire_buffer`] may wait for a free buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Fail immediately if the pool is empty.
    NoWait,
    /// Wait until the host frees a buffer.
    Forever,
}

/// A typed, fixed-capacity HCI packet buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct HciBuffer {
    kind: BufType,
    data: ArrayVec<u8, HCI_MSG_BUFFER_MAX_SIZE>,
}

impl HciBuffer {
    /// Creates an empty buffer of the given type.
    pub const fn new(kind: BufType) -> Self {
        Self {
            kind,
            data: ArrayVec::new_const(),
        }
    }

    /// Creates a buffer holding a copy of `bytes`.
    pub fn from_slice(kind: BufType, bytes: &[u8]) -> AxResult<Self> {
        let mut buf = Self::new(kind);
        buf.extend_from_slice(bytes)?;
        Ok(buf)
    }

    /// Appends `bytes`.
    ///
    /// # Errors
    ///
    /// `NoMemory` if the result would not fit; the buffer is left untouched.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> AxResult {
        if self.data.try_extend_from_slice(bytes).is_err() {
            return ax_err!(NoMemory, "HCI buffer overflow");
        }
        Ok(())
    }

    #[inline]
    pub fn kind(&self) -> BufType {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl core::fmt::Debug for HciBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HciBuffer")
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .finish()
    }
}

/// The host protocol stack as seen from the transport.
pub trait HostStack: Send + Sync {
    /// Takes a free buffer of category `kind` from the host's pools.
    ///
    /// With [`Timeout::Forever`] the call may block for as long as the host
    /// holds all buffers of that category.
    fn acquire_buffer(&self, kind: BufType, timeout: Timeout) -> Option<HciBuffer>;

    /// Hands a fully framed buffer to the host.
    ///
    /// `priority` buffers bypass the host's regular RX queue.
    fn deliver(&self, buf: HciBuffer, priority: bool);
}

impl<T: HostStack + ?Sized> HostStack for Arc<T> {
    fn acquire_buffer(&self, kind: BufType, timeout: Timeout) -> Option<HciBuffer> {
        (**self).acquire_buffer(kind, timeout)
    }

    fn deliver(&self, buf: HciBuffer, priority: bool) {
        (**self).deliver(buf, priority)
    }
}
