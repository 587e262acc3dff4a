//! Unified error type for the BLE UART central.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (with the `defmt` feature) for efficient
//! on-target logging.

use crate::ble::discovery::Phase;

/// Top-level error type reported by the central's event handlers.
///
/// None of these terminate the device: every failure is local to the
/// step that produced it and a disconnect resets everything to scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The transport could not start scanning.
    ScanFailure(TransportError),

    /// The connect callback carried a failure status, or the connect
    /// request could not be issued.
    ConnectFailure(ConnectFailure),

    /// A discovery phase found no matching attribute. The session is dead
    /// until the next connection.
    DiscoveryNotFound(Phase),

    /// A discovery request could not be issued.
    DiscoveryIssue(TransportError),

    /// The transport never answered a discovery request in time.
    DiscoveryTimeout(Phase),

    /// The subscribe request was rejected. Not retried.
    SubscribeFailure(TransportError),

    /// Write attempted with no connection or no resolved write handle.
    NotConnected,

    /// Event for a connection or state that is no longer current; dropped.
    StaleEvent,
}

/// Why a connection attempt did not produce a usable link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectFailure {
    /// The connect request itself was rejected by the transport.
    Issue(TransportError),
    /// The link layer reported a non-zero status on the connect event.
    Status(u8),
}

/// Raw (negative errno-style) error code from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportError(pub i32);

impl TransportError {
    /// Operation already done (e.g. already subscribed).
    pub const ALREADY: Self = Self(-114);
    /// Resource busy, e.g. a scan is already running.
    pub const BUSY: Self = Self(-16);
    /// Out of buffers / request queue full.
    pub const NO_MEMORY: Self = Self(-12);
    /// The link is gone.
    pub const NOT_CONNECTED: Self = Self(-128);
    /// Parameter rejected.
    pub const INVALID: Self = Self(-22);

    pub fn code(&self) -> i32 {
        self.0
    }
}

// Convenience conversions

impl From<ConnectFailure> for Error {
    fn from(e: ConnectFailure) -> Self {
        Error::ConnectFailure(e)
    }
}
