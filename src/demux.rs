//! Packet demultiplexer.
//!
//! Turns raw bytes fetched from the controller into typed host buffers. Each
//! routine handles one packet and either delivers it or reports why it could
//! not.
//!
//! | Packet              | Buffer category | Wait for buffer | Host path          |
//! |---------------------|-----------------|-----------------|--------------------|
//! | Command Complete    | `CmdComplete`   | forever         | priority           |
//! | Command Status      | `CmdComplete`   | forever         | priority           |
//! | other events        | `Evt`           | forever         | [`PRIORITY_EVENTS`](crate::hci::PRIORITY_EVENTS) lookup |
//! | ACL data            | `AclIn`         | forever         | regular            |
//!
//! Every packet waits for the host to free a buffer of its category, so the
//! dispatcher stalls rather than losing a command response. A packet is only
//! lost when the host pool refuses the request outright.

use axerrno::{ax_err, ax_err_type, AxResult};

use crate::buffer::{BufType, HostStack, Timeout};
use crate::hci::{is_cmd_response, is_priority_event, AclHeader, EventHeader, EVT_LE_META_EVENT};

/// Where a framed event went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Regular host RX queue.
    Normal,
    /// Host priority path.
    Priority,
}

/// Frames the event at the start of `raw` and delivers it.
///
/// Blocks until the host has a free buffer of the event's category.
///
/// # Errors
///
/// - `InvalidData` if the header claims more bytes than `raw` holds.
/// - `NoMemory` if the host pool refused a buffer of the event's category.
///   The event is lost.
pub fn frame_event<H: HostStack>(host: &H, raw: &[u8]) -> AxResult<Route> {
    let hdr = EventHeader::parse(raw)?;
    let len = hdr.packet_len();
    if len > raw.len() {
        return ax_err!(InvalidData, "event length exceeds HCI buffer");
    }

    let kind = if is_cmd_response(hdr.evt) {
        BufType::CmdComplete
    } else {
        BufType::Evt
    };
    let mut buf = host.acquire_buffer(kind, Timeout::Forever).ok_or_else(|| {
        error!("No event buffer available for event {:#04x}", hdr.evt);
        ax_err_type!(NoMemory, "no event buffer")
    })?;

    if hdr.evt == EVT_LE_META_EVENT {
        debug!(
            "LE Meta Event: subevent code ({:#04x}), length ({})",
            raw.get(2).copied().unwrap_or(0),
            hdr.len
        );
    } else {
        debug!("Event: event code ({:#04x}), length ({})", hdr.evt, hdr.len);
    }

    buf.extend_from_slice(&raw[..len])?;

    let route = if is_priority_event(hdr.evt) {
        Route::Priority
    } else {
        Route::Normal
    };
    host.deliver(buf, route == Route::Priority);
    Ok(route)
}

/// Frames the ACL packet at the start of `raw` and delivers it.
///
/// Blocks until the host has a free ACL buffer.
///
/// # Errors
///
/// - `InvalidData` if the header claims more bytes than `raw` holds.
/// - `NoMemory` if the host pool gave up without a buffer.
pub fn frame_data<H: HostStack>(host: &H, raw: &[u8]) -> AxResult<AclHeader> {
    let hdr = AclHeader::parse(raw)?;
    let len = hdr.packet_len();
    if len > raw.len() {
        return ax_err!(InvalidData, "ACL length exceeds HCI buffer");
    }

    let mut buf = host.acquire_buffer(BufType::AclIn, Timeout::Forever).ok_or_else(|| {
        error!("No data buffer available");
        ax_err_type!(NoMemory, "no data buffer")
    })?;

    debug!(
        "Data: Handle({:#05x}), PB({}), BC({}), Length({})",
        hdr.handle, hdr.pb_flag, hdr.bc_flag, hdr.len
    );

    buf.extend_from_slice(&raw[..len])?;
    host.deliver(buf, false);
    Ok(hdr)
}
