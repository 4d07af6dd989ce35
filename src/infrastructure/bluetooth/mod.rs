//! Bluetooth Module
//!
//! Turns this machine into a BLE heart-rate sensor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  GattPeripheralServer                    │
//! │  (advertising lifecycle, subscribers, notifications)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │  RadioEvent queue (bounded)
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  WinRT    │  │ Simulated  │  │ Protocol │
//! │           │  │            │  │          │
//! │ - GATT    │  │ - in-memory│  │ - UUIDs  │
//! │   server  │  │   centrals │  │ - HRM    │
//! │           │  │            │  │   bytes  │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Heart Rate Profile identifiers and measurement encoding
//! - [`radio`] - Platform backend trait and callback events
//! - [`simulated`] - In-memory backend for tests and unsupported hosts
//! - [`peripheral`] - The GATT peripheral server

pub mod peripheral;
pub mod protocol;
pub mod radio;
pub mod simulated;
#[cfg(windows)]
pub mod winrt;

pub use peripheral::GattPeripheralServer;
pub use radio::PeripheralRadio;

use std::sync::Arc;

/// Radio backend for the current platform.
pub fn platform_radio() -> Arc<dyn PeripheralRadio> {
    #[cfg(windows)]
    {
        Arc::new(winrt::WinRtRadio::new())
    }
    #[cfg(not(windows))]
    {
        tracing::warn!("No BLE peripheral backend on this platform, using the simulated radio");
        Arc::new(simulated::SimulatedRadio::new())
    }
}
