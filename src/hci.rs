//! HCI wire format shared by the controller and the host.
//!
//! Only the parts the transport needs are decoded: event headers for routing
//! and ACL headers for length framing. Payloads are copied verbatim.

use axerrno::{ax_err, AxResult};

/// Largest HCI packet the controller can hand over, header included.
pub const HCI_MSG_BUFFER_MAX_SIZE: usize = 259;

/// Size of an HCI event header.
pub const EVT_HDR_SIZE: usize = 2;
/// Size of an HCI ACL data header.
pub const ACL_HDR_SIZE: usize = 4;

/// Disconnection Complete event code.
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;
/// Command Complete event code.
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
/// Command Status event code.
pub const EVT_CMD_STATUS: u8 = 0x0F;
/// Number Of Completed Packets event code.
pub const EVT_NUM_COMPLETED_PACKETS: u8 = 0x13;
/// Data Buffer Overflow event code.
pub const EVT_DATA_BUF_OVERFLOW: u8 = 0x1A;
/// LE Meta event code.
pub const EVT_LE_META_EVENT: u8 = 0x3E;

cfg_if::cfg_if! {
    if #[cfg(feature = "conn")] {
        /// Events the host must see ahead of its regular RX queue.
        pub const PRIORITY_EVENTS: &[u8] = &[
            EVT_CMD_COMPLETE,
            EVT_CMD_STATUS,
            EVT_NUM_COMPLETED_PACKETS,
        ];
    } else {
        /// Events the host must see ahead of its regular RX queue.
        pub const PRIORITY_EVENTS: &[u8] = &[EVT_CMD_COMPLETE, EVT_CMD_STATUS];
    }
}

/// Returns `true` if `evt` is delivered on the host's priority path.
#[inline]
pub fn is_priority_event(evt: u8) -> bool {
    PRIORITY_EVENTS.contains(&evt)
}

/// Returns `true` if `evt` answers a command and uses the reserved
/// command-complete buffer pool.
#[inline]
pub fn is_cmd_response(evt: u8) -> bool {
    evt == EVT_CMD_COMPLETE || evt == EVT_CMD_STATUS
}

/// HCI event header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    /// Event code.
    pub evt: u8,
    /// Parameter length in bytes.
    pub len: u8,
}

impl EventHeader {
    /// Decodes the header at the start of `raw`.
    pub fn parse(raw: &[u8]) -> AxResult<Self> {
        match raw {
            [evt, len, ..] => Ok(Self { evt: *evt, len: *len }),
            _ => ax_err!(InvalidData, "truncated event header"),
        }
    }

    /// Header plus parameters.
    #[inline]
    pub fn packet_len(&self) -> usize {
        EVT_HDR_SIZE + self.len as usize
    }
}

/// HCI ACL data header.
///
/// Layout:
///
/// ```text
///  byte 0          byte 1                       byte 2..3
/// ┌──────────────┬──────┬──────┬──────────────┬───────────────┐
/// │ handle[7:0]  │ BC   │ PB   │ handle[11:8] │ length (LE16) │
/// │              │ 7..6 │ 5..4 │ 3..0         │               │
/// └──────────────┴──────┴──────┴──────────────┴───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclHeader {
    /// Connection handle, 12 bits.
    pub handle: u16,
    /// Packet boundary flag, 2 bits.
    pub pb_flag: u8,
    /// Broadcast flag, 2 bits.
    pub bc_flag: u8,
    /// Payload length in bytes.
    pub len: u16,
}

impl AclHeader {
    /// Decodes the header at the start of `raw`.
    pub fn parse(raw: &[u8]) -> AxResult<Self> {
        let &[b0, b1, b2, b3, ..] = raw else {
            return ax_err!(InvalidData, "truncated ACL header");
        };
        Ok(Self {
            handle: u16::from(b0) | (u16::from(b1 & 0x0F) << 8),
            pb_flag: (b1 >> 4) & 0x3,
            bc_flag: (b1 >> 6) & 0x3,
            len: u16::from_le_bytes([b2, b3]),
        })
    }

    /// Encodes the header. Out-of-range fields are masked to their width.
    pub fn to_bytes(&self) -> [u8; ACL_HDR_SIZE] {
        let len = self.len.to_le_bytes();
        [
            (self.handle & 0xFF) as u8,
            ((self.handle >> 8) & 0x0F) as u8 | (self.pb_flag & 0x3) << 4 | (self.bc_flag & 0x3) << 6,
            len[0],
            len[1],
        ]
    }

    /// Header plus payload.
    #[inline]
    pub fn packet_len(&self) -> usize {
        ACL_HDR_SIZE + self.len as usize
    }
}
