//! The link-layer / GATT-client surface the central consumes.
//!
//! Every method only *issues* an operation. Completions are delivered
//! later by the adapter calling the matching `on_*` handler of
//! [`Central`](super::central::Central); a synchronous `Err` means the
//! operation was never started and no completion will follow.

use super::attribute::DiscoverRequest;
use super::subscription::SubscribeParams;
use super::{Address, ConnHandle};
use crate::error::TransportError;

/// Scan parameters (active scan, fast interval/window by default).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    pub active: bool,
    /// In 0.625 ms units.
    pub interval: u16,
    /// In 0.625 ms units.
    pub window: u16,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            active: true,
            interval: crate::config::BLE_SCAN_INTERVAL,
            window: crate::config::BLE_SCAN_WINDOW,
        }
    }
}

/// Transport adapter over a BLE host stack.
///
/// Methods take `&self`: adapters are handles onto a request queue (or a
/// vendor API) and the write path is driven from a different context than
/// the event handlers.
pub trait Transport {
    /// Start scanning; advertising reports arrive via
    /// `Central::on_device_observed`.
    fn start_scan(&self, params: &ScanParams) -> Result<(), TransportError>;

    fn stop_scan(&self) -> Result<(), TransportError>;

    /// Create a connection; the outcome arrives via `Central::on_connected`.
    fn connect(&self, address: &Address) -> Result<(), TransportError>;

    /// Drop any resource held for a connection that failed to establish.
    fn release(&self, conn: ConnHandle);

    /// Range discovery; the first match (or `None`) arrives via
    /// `Central::on_discovery_response`.
    fn discover(&self, conn: ConnHandle, request: &DiscoverRequest) -> Result<(), TransportError>;

    /// Write the CCC descriptor and route notifications for
    /// `params.value_handle` to `Central::on_notification`; the outcome of
    /// the write arrives via `Central::on_subscribe_complete`.
    fn subscribe(&self, conn: ConnHandle, params: &SubscribeParams) -> Result<(), TransportError>;

    /// Unacknowledged write (ATT Write Command).
    fn write_without_response(
        &self,
        conn: ConnHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn start_scan(&self, params: &ScanParams) -> Result<(), TransportError> {
        (**self).start_scan(params)
    }

    fn stop_scan(&self) -> Result<(), TransportError> {
        (**self).stop_scan()
    }

    fn connect(&self, address: &Address) -> Result<(), TransportError> {
        (**self).connect(address)
    }

    fn release(&self, conn: ConnHandle) {
        (**self).release(conn)
    }

    fn discover(&self, conn: ConnHandle, request: &DiscoverRequest) -> Result<(), TransportError> {
        (**self).discover(conn, request)
    }

    fn subscribe(&self, conn: ConnHandle, params: &SubscribeParams) -> Result<(), TransportError> {
        (**self).subscribe(conn, params)
    }

    fn write_without_response(
        &self,
        conn: ConnHandle,
        value_handle: u16,
        data: &[u8],
    ) -> Result<(), TransportError> {
        (**self).write_without_response(conn, value_handle, data)
    }
}
