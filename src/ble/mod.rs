//! Bluetooth Low Energy central subsystem.
//!
//! The central drives exactly one link to a UART echo peripheral:
//!
//! 1. **Scanner filter** - inspects advertising reports for the UART
//!    service UUID and connects to the first match.
//! 2. **Discovery walker** - four forward-only range queries locate the
//!    service, the notify and write characteristics and the CCC descriptor.
//! 3. **Subscription** - enables notifications and forwards payloads to a
//!    sink.
//! 4. **Write gateway** - pushes console lines to the write characteristic.
//!
//! Everything here is event-driven: the transport delivers completions by
//! calling into [`central::Central`], which issues the next request.

pub mod adv_parser;
pub mod attribute;
pub mod central;
pub mod discovery;
pub mod gateway;
#[cfg(test)]
mod mock;
pub mod subscription;
pub mod transport;

/// Opaque handle of the active link, as assigned by the link layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

/// LE device address of a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address {
    /// Public (0) or one of the random address kinds (1..=3).
    pub kind: u8,
    /// Address bytes, least significant first (as on air).
    pub bytes: [u8; 6],
}

impl Address {
    pub const fn new(kind: u8, bytes: [u8; 6]) -> Self {
        Self { kind, bytes }
    }
}

/// Outcome reported by the link layer on a connect event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectStatus {
    Success,
    /// HCI error code.
    Failed(u8),
}

/// HCI disconnect reason. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisconnectReason(pub u8);

impl DisconnectReason {
    /// The stack did not report a reason.
    pub const UNKNOWN: Self = Self(0x00);
    pub const REMOTE_USER_TERMINATED: Self = Self(0x13);
    pub const CONNECTION_TIMEOUT: Self = Self(0x08);
    pub const LOCAL_HOST_TERMINATED: Self = Self(0x16);
}
