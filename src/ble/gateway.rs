//! Write gateway: the single outbound path to the peripheral.
//!
//! The console task writes from its own context while the BLE task is
//! busy with discovery events, so the target (connection + write value
//! handle) is published as one atomic word instead of being read from the
//! central's session.

use core::sync::atomic::{AtomicU32, Ordering};

use super::transport::Transport;
use super::ConnHandle;
use crate::error::Error;

/// Attribute handle 0 is invalid, so an all-zero word means "no target".
const NO_TARGET: u32 = 0;

pub struct WriteGateway {
    target: AtomicU32,
}

impl WriteGateway {
    pub const fn new() -> Self {
        Self {
            target: AtomicU32::new(NO_TARGET),
        }
    }

    /// Make writes go to `value_handle` on `conn`.
    pub fn publish(&self, conn: ConnHandle, value_handle: u16) {
        if value_handle == 0 {
            warn!("gateway: refusing to publish handle 0");
            self.retract();
            return;
        }
        let word = (u32::from(conn.0) << 16) | u32::from(value_handle);
        self.target.store(word, Ordering::Release);
        debug!("gateway: target {:#x} on conn {}", value_handle, conn.0);
    }

    pub fn retract(&self) {
        self.target.store(NO_TARGET, Ordering::Release);
    }

    pub fn target(&self) -> Option<(ConnHandle, u16)> {
        let word = self.target.load(Ordering::Acquire);
        let value_handle = (word & 0xFFFF) as u16;
        if value_handle == 0 {
            return None;
        }
        Some((ConnHandle((word >> 16) as u16), value_handle))
    }

    pub fn is_ready(&self) -> bool {
        self.target().is_some()
    }

    /// Send `data` as one unacknowledged write.
    ///
    /// Fails only with [`Error::NotConnected`]. A transport-level send
    /// failure is logged and the call still returns `Ok`: the caller never
    /// learns whether the bytes left the radio.
    pub fn write<T: Transport>(&self, transport: &T, data: &[u8]) -> Result<(), Error> {
        let Some((conn, value_handle)) = self.target() else {
            warn!("gateway: not connected");
            return Err(Error::NotConnected);
        };

        if let Err(e) = transport.write_without_response(conn, value_handle, data) {
            warn!("gateway: write cmd failed (err {})", e.code());
        }
        Ok(())
    }
}

impl Default for WriteGateway {
    fn default() -> Self {
        Self::new()
    }
}
