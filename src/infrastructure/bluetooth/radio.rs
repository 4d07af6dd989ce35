//! Radio Backend
//!
//! Platform boundary beneath the GATT peripheral server. Backends report
//! asynchronous stack callbacks as [`RadioEvent`]s on a bounded channel; the
//! callback side must only ever `try_send`.

use crate::domain::error::BridgeError;
use crate::domain::models::{ClientId, HardwareState, Permission};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Capacity of the callback queue between the radio stack and the server.
pub const RADIO_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    AdvertisingStarted,
    AdvertisingStopped,
    AdvertisingFailed(String),
    Subscribed(ClientId),
    Unsubscribed(ClientId),
    /// Forget every subscriber, queued behind any pending subscribe events.
    SubscribersCleared,
}

#[async_trait]
pub trait PeripheralRadio: Send + Sync {
    async fn hardware_state(&self) -> HardwareState;

    /// Permissions still missing; empty where the platform has no model.
    fn missing_permissions(&self) -> Vec<Permission>;

    /// Publish the Heart Rate Service. Called once per server lifetime.
    async fn register_service(&self, events: mpsc::Sender<RadioEvent>) -> Result<(), BridgeError>;

    /// Begin advertising; completion arrives as `RadioEvent::AdvertisingStarted`.
    async fn start_advertising(&self, device_name: &str) -> Result<(), BridgeError>;

    async fn stop_advertising(&self) -> Result<(), BridgeError>;

    /// Queue a notification for one subscriber. `Ok` means the local stack
    /// accepted it, not that the central received it.
    async fn notify(&self, client: &ClientId, payload: &[u8]) -> Result<(), BridgeError>;

    /// Value returned to centrals reading the characteristic.
    fn set_read_value(&self, payload: &[u8]);
}
