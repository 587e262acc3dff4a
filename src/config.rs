//! Application-wide constants and compile-time configuration.
//!
//! GATT identifiers, handle bounds, radio timing and buffer sizes live
//! here so they can be tuned in one place.

// GATT layout of the echo peripheral

/// 16-bit UUID of the BLE UART service.
pub const UART_SERVICE_UUID: u16 = 0x2BC4;

/// 16-bit UUID of the notify-only characteristic (peripheral → central).
pub const UART_NOTIFY_CHAR_UUID: u16 = 0x2BC5;

/// 16-bit UUID of the write-only characteristic (central → peripheral).
pub const UART_WRITE_CHAR_UUID: u16 = 0x2BC6;

/// Client Characteristic Configuration descriptor UUID.
pub const CCC_DESCRIPTOR_UUID: u16 = 0x2902;

/// Value written to a CCC descriptor to enable notifications.
pub const CCC_NOTIFY: u16 = 0x0001;

/// Lowest valid attribute handle.
pub const HANDLE_MIN: u16 = 0x0001;

/// Highest valid attribute handle.
pub const HANDLE_MAX: u16 = 0xFFFF;

// Payloads

/// Largest payload carried in one write or notification (ATT MTU 247 - 3).
pub const MAX_PAYLOAD_LEN: usize = 244;

/// Console line capacity; longer lines are truncated.
pub const CONSOLE_LINE_MAX: usize = MAX_PAYLOAD_LEN;

// BLE radio

/// Fast scan interval (in 0.625 ms units). 0x60 = 60 ms.
pub const BLE_SCAN_INTERVAL: u16 = 0x0060;

/// Fast scan window (in 0.625 ms units). 0x30 = 30 ms.
pub const BLE_SCAN_WINDOW: u16 = 0x0030;

/// BLE connection interval range (in 1.25 ms units).
/// 24 = 30 ms, 40 = 50 ms (stack defaults).
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// ATT MTU requested for the single central link.
pub const BLE_ATT_MTU: u16 = 247;

/// Per-request discovery timeout armed by the firmware adapter (ms).
/// The core itself never times out a discovery round trip.
pub const DISCOVERY_TIMEOUT_MS: u64 = 5_000;

/// Depth of the control request queue between the core and the SoftDevice
/// task. The core has at most one control request outstanding per link
/// state; the slack covers stale requests left by a dropped link.
pub const REQUEST_QUEUE_DEPTH: usize = 8;

/// Depth of the outgoing write queue fed by the console.
pub const WRITE_QUEUE_DEPTH: usize = 8;

/// Upper bound of attributes mirrored from one peripheral's UART service.
pub const MIRROR_ATTRIBUTES_MAX: usize = 12;

/// Identifiers the central searches for.
///
/// Defaults to the echo peripheral's layout; tests substitute their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CentralConfig {
    pub service_uuid: u16,
    pub notify_char_uuid: u16,
    pub write_char_uuid: u16,
    pub ccc_uuid: u16,
}

impl CentralConfig {
    pub const fn new() -> Self {
        Self {
            service_uuid: UART_SERVICE_UUID,
            notify_char_uuid: UART_NOTIFY_CHAR_UUID,
            write_char_uuid: UART_WRITE_CHAR_UUID,
            ccc_uuid: CCC_DESCRIPTOR_UUID,
        }
    }
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self::new()
    }
}
