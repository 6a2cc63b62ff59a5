//! Controller resource configuration and its validation.

use alloc::vec::Vec;

use axerrno::{ax_err, AxResult};

use crate::controller::ResourceCfg;

/// Default LL payload size when no data length extension is configured.
pub const DEFAULT_PACKET_SIZE: u16 = 27;
/// Default number of TX packet buffers per link.
pub const DEFAULT_TX_PACKET_COUNT: u8 = 3;
/// Default number of RX packet buffers per link.
pub const DEFAULT_RX_PACKET_COUNT: u8 = 3;
/// Default maximum connection event length in microseconds.
pub const DEFAULT_EVENT_LENGTH_US: u32 = 7500;

/// Controller resource configuration for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Total simultaneous connections.
    pub max_conn: u8,
    /// Connections reserved for the peripheral role.
    pub peripheral_count: u8,
    /// The central role is enabled.
    pub central: bool,
    /// The peripheral role is enabled.
    pub peripheral: bool,
    /// LL maximum payload, `None` for the controller default.
    pub data_length_max: Option<u16>,
    /// TX packet buffers per link.
    pub tx_packet_count: u8,
    /// RX packet buffers per link.
    pub rx_packet_count: u8,
    /// Maximum connection event length in microseconds.
    pub event_length_us: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_conn: 1,
            peripheral_count: 1,
            central: false,
            peripheral: true,
            data_length_max: None,
            tx_packet_count: DEFAULT_TX_PACKET_COUNT,
            rx_packet_count: DEFAULT_RX_PACKET_COUNT,
            event_length_us: DEFAULT_EVENT_LENGTH_US,
        }
    }
}

impl DriverConfig {
    /// Sets the connection split between roles.
    pub fn with_links(mut self, max_conn: u8, peripheral_count: u8) -> Self {
        self.max_conn = max_conn;
        self.peripheral_count = peripheral_count;
        self
    }

    /// Enables or disables the two roles.
    pub fn with_roles(mut self, central: bool, peripheral: bool) -> Self {
        self.central = central;
        self.peripheral = peripheral;
        self
    }

    pub fn with_data_length(mut self, max: u16) -> Self {
        self.data_length_max = Some(max);
        self
    }

    /// Connections left for the central role.
    #[inline]
    pub fn central_count(&self) -> u8 {
        self.max_conn.saturating_sub(self.peripheral_count)
    }

    #[inline]
    pub fn packet_size(&self) -> u16 {
        self.data_length_max.unwrap_or(DEFAULT_PACKET_SIZE)
    }

    /// Checks the link split against the enabled roles.
    pub fn validate(&self) -> AxResult {
        if self.peripheral_count > self.max_conn {
            return ax_err!(InvalidInput, "peripheral link count exceeds max connections");
        }
        if self.central && self.central_count() == 0 {
            return ax_err!(InvalidInput, "central role enabled without central links");
        }
        if self.peripheral && self.peripheral_count == 0 {
            return ax_err!(InvalidInput, "peripheral role enabled without peripheral links");
        }
        Ok(())
    }

    /// Resource settings in the order the controller expects them.
    pub fn resource_cfgs(&self) -> Vec<ResourceCfg> {
        let size = self.packet_size();
        alloc::vec![
            ResourceCfg::CentralCount(self.central_count()),
            ResourceCfg::PeripheralCount(self.peripheral_count),
            ResourceCfg::Buffer {
                tx_packet_size: size,
                rx_packet_size: size,
                tx_packet_count: self.tx_packet_count,
                rx_packet_count: self.rx_packet_count,
            },
            ResourceCfg::EventLength(self.event_length_us),
        ]
    }
}
