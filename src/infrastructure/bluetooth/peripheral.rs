//! GATT Peripheral Server
//!
//! Hosts the Heart Rate Service on top of a [`PeripheralRadio`], tracks
//! subscribed centrals and pushes heart-rate notifications to them.

use crate::domain::error::BridgeError;
use crate::domain::models::{AdvertisingState, ClientId, HardwareState, Permission};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::radio::{PeripheralRadio, RadioEvent, RADIO_EVENT_CAPACITY};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Handles published to the event pump; everything it writes lives here.
struct Published {
    advertising: watch::Sender<AdvertisingState>,
    subscribers: watch::Sender<BTreeSet<ClientId>>,
    client_connected: watch::Sender<bool>,
    /// Advertising requested from the radio and not yet stopped. Written under
    /// the lifecycle lock only.
    radio_active: AtomicBool,
}

impl Published {
    fn set_advertising(&self, next: AdvertisingState) {
        self.advertising.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!("Advertising state: {:?} -> {:?}", current, next);
            *current = next;
            true
        });
    }

    fn apply(&self, event: RadioEvent) {
        match event {
            RadioEvent::AdvertisingStarted => {
                if self.radio_active.load(Ordering::SeqCst) {
                    self.set_advertising(AdvertisingState::Started);
                } else {
                    debug!("Ignoring advertising start reported after a stop");
                }
            }
            RadioEvent::AdvertisingStopped => self.set_advertising(AdvertisingState::Stopped),
            RadioEvent::AdvertisingFailed(reason) => {
                if self.radio_active.load(Ordering::SeqCst) {
                    error!("Advertising failed: {}", reason);
                    self.set_advertising(AdvertisingState::Failure(
                        BridgeError::AdvertisingFailure(reason),
                    ));
                } else {
                    debug!("Ignoring advertising failure after a stop: {}", reason);
                }
            }
            RadioEvent::Subscribed(client) => {
                info!("Central subscribed: {}", client);
                self.subscribers.send_if_modified(|set| set.insert(client));
            }
            RadioEvent::Unsubscribed(client) => {
                info!("Central unsubscribed: {}", client);
                self.subscribers.send_if_modified(|set| set.remove(&client));
            }
            RadioEvent::SubscribersCleared => {
                self.subscribers.send_if_modified(|set| {
                    let had_any = !set.is_empty();
                    set.clear();
                    had_any
                });
            }
        }

        let connected = !self.subscribers.borrow().is_empty();
        self.client_connected.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
    }
}

/// BLE peripheral exposing one Heart Rate Measurement characteristic.
pub struct GattPeripheralServer {
    radio: Arc<dyn PeripheralRadio>,
    device_name: String,
    published: Arc<Published>,
    events_tx: mpsc::Sender<RadioEvent>,
    /// Receiver parked here until the service is registered.
    events_rx: Mutex<Option<mpsc::Receiver<RadioEvent>>>,
    /// Serializes start/stop; `true` once the service is registered.
    lifecycle: Mutex<bool>,
    pump: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl GattPeripheralServer {
    pub fn new(radio: Arc<dyn PeripheralRadio>, device_name: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(RADIO_EVENT_CAPACITY);
        Self {
            radio,
            device_name: device_name.into(),
            published: Arc::new(Published {
                advertising: watch::channel(AdvertisingState::Stopped).0,
                subscribers: watch::channel(BTreeSet::new()).0,
                client_connected: watch::channel(false).0,
                radio_active: AtomicBool::new(false),
            }),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            lifecycle: Mutex::new(false),
            pump: std::sync::Mutex::new(None),
        }
    }

    pub fn advertising_state(&self) -> watch::Receiver<AdvertisingState> {
        self.published.advertising.subscribe()
    }

    pub fn client_connected(&self) -> watch::Receiver<bool> {
        self.published.client_connected.subscribe()
    }

    pub fn subscribers(&self) -> BTreeSet<ClientId> {
        self.published.subscribers.borrow().clone()
    }

    /// Register the service (first call only) and start advertising.
    ///
    /// Idempotent. Failures end up in [`AdvertisingState::Failure`].
    pub async fn start_advertising(&self) {
        let mut registered = self.lifecycle.lock().await;

        if *self.published.advertising.borrow() == AdvertisingState::Started {
            debug!("Advertising already started");
            return;
        }

        if let Err(e) = self.check_preconditions().await {
            warn!("Cannot start advertising: {}", e);
            self.published.set_advertising(AdvertisingState::Failure(e));
            return;
        }

        if !*registered {
            if let Err(e) = self.register().await {
                error!("Failed to register Heart Rate Service: {}", e);
                self.published.set_advertising(AdvertisingState::Failure(e));
                return;
            }
            *registered = true;
        }

        info!("Starting advertising as '{}'", self.device_name);
        // Raised before the call: the radio may report the start before it returns.
        self.published.radio_active.store(true, Ordering::SeqCst);
        if let Err(e) = self.radio.start_advertising(&self.device_name).await {
            error!("Failed to start advertising: {}", e);
            self.published.radio_active.store(false, Ordering::SeqCst);
            self.published.set_advertising(AdvertisingState::Failure(e));
        }
    }

    /// Stop advertising and forget all subscribers. Idempotent.
    ///
    /// The service registration is kept for the next start.
    pub async fn stop_advertising(&self) {
        let registered = self.lifecycle.lock().await;

        // A start report may still be queued behind this call.
        let radio_active = self.published.radio_active.swap(false, Ordering::SeqCst);
        if !radio_active && *self.published.advertising.borrow() == AdvertisingState::Stopped {
            debug!("Advertising already stopped");
            return;
        }

        if *registered {
            info!("Stopping advertising");
            if let Err(e) = self.radio.stop_advertising().await {
                warn!("Radio refused to stop advertising: {}", e);
            }
            if self.events_tx.send(RadioEvent::SubscribersCleared).await.is_err() {
                warn!("Radio event pump is gone");
            }
        }
        // The radio's own stop event may still be queued; publish now so a
        // failed start also reads as stopped.
        self.published.set_advertising(AdvertisingState::Stopped);
    }

    /// Push a heart-rate measurement to every subscribed central.
    ///
    /// Returns `false` without touching the radio when `bpm` is outside
    /// `0..=255`, nobody is subscribed, the radio is not powered or the
    /// peripheral is not advertising. `true` means the local stack queued the
    /// notification for at least one central; delivery is not acknowledged.
    pub async fn notify_heart_rate(&self, bpm: i32) -> bool {
        let value = match protocol::validate_bpm(bpm) {
            Ok(value) => value,
            Err(e) => {
                warn!("Rejecting notification: {}", e);
                return false;
            }
        };

        let subscribers = self.subscribers();
        if subscribers.is_empty() {
            trace!("No subscribers, dropping BPM {}", value);
            return false;
        }

        if *self.published.advertising.borrow() != AdvertisingState::Started {
            debug!("Not advertising, dropping BPM {}", value);
            return false;
        }

        if self.radio.hardware_state().await != HardwareState::Ready {
            debug!("Radio not ready, dropping BPM {}", value);
            return false;
        }

        let payload = protocol::encode_measurement(value);
        self.radio.set_read_value(&payload);

        let mut accepted = 0usize;
        for client in &subscribers {
            match self.radio.notify(client, &payload).await {
                Ok(()) => accepted += 1,
                Err(e) => warn!("Notification to {} not queued: {}", client, e),
            }
        }
        trace!(
            "BPM {} queued for {}/{} centrals",
            value,
            accepted,
            subscribers.len()
        );
        accepted > 0
    }

    pub async fn get_hardware_state(&self) -> HardwareState {
        self.radio.hardware_state().await
    }

    pub fn permissions_granted(&self) -> bool {
        self.radio.missing_permissions().is_empty()
    }

    pub fn get_missing_permissions(&self) -> Vec<Permission> {
        self.radio.missing_permissions()
    }

    async fn check_preconditions(&self) -> Result<(), BridgeError> {
        match self.radio.hardware_state().await {
            HardwareState::HardwareUnsuitable => return Err(BridgeError::HardwareUnavailable),
            HardwareState::Disabled => return Err(BridgeError::HardwareDisabled),
            HardwareState::Ready => {}
        }

        let missing = self.radio.missing_permissions();
        if !missing.is_empty() {
            return Err(BridgeError::PermissionDenied(
                missing.iter().map(ToString::to_string).collect(),
            ));
        }
        Ok(())
    }

    async fn register(&self) -> Result<(), BridgeError> {
        if let Some(events_rx) = self.events_rx.lock().await.take() {
            let published = self.published.clone();
            let pump = tokio::spawn(run_event_pump(events_rx, published));
            if let Ok(mut slot) = self.pump.lock() {
                *slot = Some(pump);
            }
        }

        info!(
            "Registering Heart Rate Service {}",
            protocol::HEART_RATE_SERVICE_UUID
        );
        self.radio.register_service(self.events_tx.clone()).await?;
        self.radio.set_read_value(&protocol::EMPTY_MEASUREMENT);
        Ok(())
    }
}

impl Drop for GattPeripheralServer {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.pump.lock() {
            if let Some(pump) = slot.take() {
                pump.abort();
            }
        }
    }
}

/// Single owner of the subscriber set: drains radio callbacks in order.
async fn run_event_pump(mut events: mpsc::Receiver<RadioEvent>, published: Arc<Published>) {
    while let Some(event) = events.recv().await {
        trace!("Radio event: {:?}", event);
        published.apply(event);
    }
    debug!("Radio event pump finished");
}
