//! Host-testable core of the BLE UART central.
//!
//! Everything that does not touch the radio lives here: advertisement
//! parsing, the discovery walker, subscription handling, the write gateway
//! and the connection lifecycle that ties them together.
//!
//! Usage: `cargo test` (no hardware required)
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and plugs a SoftDevice transport into [`ble::central::Central`].

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod ble;
pub mod config;
pub mod console;
pub mod error;
pub mod peripheral;

// ═══════════════════════════════════════════════════════════════════════════
// Cross-module Tests
// ═══════════════════════════════════════════════════════════════════════════
