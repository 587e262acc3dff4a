//! The UART echo peripheral the central talks to.
//!
//! Fixed GATT layout, laid out the way the peripheral firmware's static
//! service table registers it:
//!
//! ```text
//! base + 0  primary service 0x2BC4
//! base + 1  characteristic declaration (notify)
//! base + 2  notify value               0x2BC5
//! base + 3  characteristic declaration (write)
//! base + 4  write value                0x2BC6
//! base + 5  CCC descriptor             0x2902
//! ```
//!
//! On every write the peripheral uppercases ASCII `a..=z` and notifies
//! the result back, same length, if notifications are enabled.

use heapless::Vec;

use crate::ble::adv_parser::AD_UUID16_ALL;
use crate::ble::attribute::{Attribute, AttributeKind, AttributeTable, DiscoverRequest};
use crate::config::{
    CCC_DESCRIPTOR_UUID, CCC_NOTIFY, MAX_PAYLOAD_LEN, UART_NOTIFY_CHAR_UUID, UART_SERVICE_UUID,
    UART_WRITE_CHAR_UUID,
};

/// AD type: flags.
const AD_FLAGS: u8 = 0x01;
/// LE General Discoverable, BR/EDR not supported.
const FLAGS_GENERAL_NO_BREDR: u8 = 0x06;

/// Discoverable entries of the echo service (declarations excluded).
pub const ECHO_ATTRIBUTES: usize = 4;

/// Advertising payload: flags plus the complete 16-bit UUID list.
pub const ADVERTISEMENT: [u8; 7] = [
    0x02,
    AD_FLAGS,
    FLAGS_GENERAL_NO_BREDR,
    0x03,
    AD_UUID16_ALL,
    UART_SERVICE_UUID.to_le_bytes()[0],
    UART_SERVICE_UUID.to_le_bytes()[1],
];

/// Handles of the echo service when registered at `base`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EchoLayout {
    pub service: u16,
    pub notify_decl: u16,
    pub notify_value: u16,
    pub write_decl: u16,
    pub write_value: u16,
    pub ccc: u16,
}

impl EchoLayout {
    pub const fn at(base: u16) -> Self {
        Self {
            service: base,
            notify_decl: base + 1,
            notify_value: base + 2,
            write_decl: base + 3,
            write_value: base + 4,
            ccc: base + 5,
        }
    }

    pub fn table(&self) -> AttributeTable<ECHO_ATTRIBUTES> {
        let mut table = AttributeTable::new();
        let rows = [
            (
                AttributeKind::PrimaryService,
                UART_SERVICE_UUID,
                Attribute::service(self.service),
            ),
            (
                AttributeKind::Characteristic,
                UART_NOTIFY_CHAR_UUID,
                Attribute::characteristic(self.notify_decl, self.notify_value),
            ),
            (
                AttributeKind::Characteristic,
                UART_WRITE_CHAR_UUID,
                Attribute::characteristic(self.write_decl, self.write_value),
            ),
            (
                AttributeKind::Descriptor,
                CCC_DESCRIPTOR_UUID,
                Attribute::descriptor(self.ccc),
            ),
        ];
        for (kind, uuid, attribute) in rows {
            table.push(kind, uuid, attribute);
        }
        table
    }
}

/// Uppercase ASCII letters in place; every other byte is left alone.
pub fn uppercase_ascii(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        if b.is_ascii_lowercase() {
            *b -= b'a' - b'A';
        }
    }
}

pub type Echo = Vec<u8, MAX_PAYLOAD_LEN>;

pub struct EchoPeripheral {
    layout: EchoLayout,
    table: AttributeTable<ECHO_ATTRIBUTES>,
    notify_enabled: bool,
}

impl EchoPeripheral {
    pub fn new(base: u16) -> Self {
        let layout = EchoLayout::at(base);
        Self {
            layout,
            table: layout.table(),
            notify_enabled: false,
        }
    }

    pub fn layout(&self) -> &EchoLayout {
        &self.layout
    }

    pub fn notify_enabled(&self) -> bool {
        self.notify_enabled
    }

    /// Answer a range-discovery request against the fixed table.
    pub fn discover(&self, request: &DiscoverRequest) -> Option<Attribute> {
        self.table.find(request)
    }

    /// CCC write. Returns `false` when `ccc_handle` is not ours.
    pub fn write_ccc(&mut self, ccc_handle: u16, value: u16) -> bool {
        if ccc_handle != self.layout.ccc {
            return false;
        }
        self.notify_enabled = value & CCC_NOTIFY != 0;
        info!(
            "peripheral: notify {}",
            if self.notify_enabled { "enabled" } else { "disabled" }
        );
        true
    }

    /// Write to the UART characteristic.
    ///
    /// Returns the uppercased echo to notify on
    /// [`EchoLayout::notify_value`], or `None` when the write targeted
    /// another handle or nobody subscribed. Input beyond
    /// [`MAX_PAYLOAD_LEN`] is truncated.
    pub fn write(&mut self, value_handle: u16, data: &[u8]) -> Option<Echo> {
        if value_handle != self.layout.write_value {
            debug!("peripheral: write to unknown handle {:#x}", value_handle);
            return None;
        }

        let len = data.len().min(MAX_PAYLOAD_LEN);
        let mut echo = Echo::new();
        // Cannot fail: len is capped to capacity.
        let _ = echo.extend_from_slice(&data[..len]);
        uppercase_ascii(&mut echo);

        if !self.notify_enabled {
            debug!("peripheral: notify disabled, echo dropped");
            return None;
        }
        Some(echo)
    }

    pub fn disconnect(&mut self) {
        self.notify_enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::adv_parser::contains_service_uuid;
    use crate::ble::attribute::HandleRange;

    #[test]
    fn advertisement_carries_service_uuid() {
        assert_eq!(ADVERTISEMENT, [0x02, 0x01, 0x06, 0x03, 0x03, 0xC4, 0x2B]);
        assert!(contains_service_uuid(&ADVERTISEMENT, UART_SERVICE_UUID));
    }

    #[test]
    fn layout_is_contiguous() {
        let layout = EchoLayout::at(0x0010);
        assert_eq!(layout.notify_value, 0x0012);
        assert_eq!(layout.write_value, 0x0014);
        assert_eq!(layout.ccc, 0x0015);
        assert_eq!(layout.table().len(), 4);
    }

    #[test]
    fn descriptor_search_after_write_char_finds_ccc() {
        let peripheral = EchoPeripheral::new(0x0010);
        let request = DiscoverRequest {
            kind: AttributeKind::Descriptor,
            uuid: CCC_DESCRIPTOR_UUID,
            range: HandleRange {
                start: 0x0014,
                end: 0xFFFF,
            },
        };
        assert_eq!(peripheral.discover(&request), Some(Attribute::descriptor(0x0015)));
    }

    #[test]
    fn uppercase_only_touches_lowercase_ascii() {
        let mut buf = *b"hello, World 42 \x00\xffz";
        uppercase_ascii(&mut buf);
        assert_eq!(&buf, b"HELLO, WORLD 42 \x00\xffZ");
    }

    #[test]
    fn echo_requires_notifications() {
        let mut peripheral = EchoPeripheral::new(0x0010);
        assert_eq!(peripheral.write(0x0014, b"abc"), None);

        assert!(peripheral.write_ccc(0x0015, CCC_NOTIFY));
        let echo = peripheral.write(0x0014, b"abc").unwrap();
        assert_eq!(&echo[..], b"ABC");
    }

    #[test]
    fn echo_keeps_length() {
        let mut peripheral = EchoPeripheral::new(0x0010);
        peripheral.write_ccc(0x0015, CCC_NOTIFY);

        assert_eq!(peripheral.write(0x0014, &[]).unwrap().len(), 0);
        let long = [b'q'; MAX_PAYLOAD_LEN];
        let echo = peripheral.write(0x0014, &long).unwrap();
        assert_eq!(echo.len(), MAX_PAYLOAD_LEN);
        assert!(echo.iter().all(|&b| b == b'Q'));
    }

    #[test]
    fn write_to_other_handle_is_ignored() {
        let mut peripheral = EchoPeripheral::new(0x0010);
        peripheral.write_ccc(0x0015, CCC_NOTIFY);
        assert_eq!(peripheral.write(0x0012, b"abc"), None);
        assert!(!peripheral.write_ccc(0x0012, CCC_NOTIFY));
    }

    #[test]
    fn disconnect_clears_notify() {
        let mut peripheral = EchoPeripheral::new(0x0010);
        peripheral.write_ccc(0x0015, CCC_NOTIFY);
        peripheral.disconnect();
        assert!(!peripheral.notify_enabled());
    }
}
