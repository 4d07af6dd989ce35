//! In-memory radio used in tests and on hosts without a peripheral backend.
//!
//! Every call that would touch a real radio is counted, so callers can assert
//! that a rejected operation never reached the stack.

use crate::domain::error::BridgeError;
use crate::domain::models::{ClientId, HardwareState, Permission};
use crate::infrastructure::bluetooth::protocol::EMPTY_MEASUREMENT;
use crate::infrastructure::bluetooth::radio::{PeripheralRadio, RadioEvent};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug)]
struct SimState {
    supported: bool,
    powered: bool,
    missing_permissions: Vec<Permission>,
    advertising_failure: Option<String>,
    start_report_delay: Option<Duration>,
    advertising: bool,
    registrations: usize,
    radio_calls: usize,
    notifications: Vec<(ClientId, Vec<u8>)>,
    read_value: Vec<u8>,
    events: Option<mpsc::Sender<RadioEvent>>,
}

#[derive(Debug)]
pub struct SimulatedRadio {
    state: Mutex<SimState>,
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRadio {
    /// A powered, supported radio with every permission granted.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                supported: true,
                powered: true,
                missing_permissions: Vec::new(),
                advertising_failure: None,
                start_report_delay: None,
                advertising: false,
                registrations: 0,
                radio_calls: 0,
                notifications: Vec::new(),
                read_value: EMPTY_MEASUREMENT.to_vec(),
                events: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // Nothing in here can panic while holding the lock.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_powered(&self, powered: bool) {
        self.lock().powered = powered;
    }

    pub fn set_supported(&self, supported: bool) {
        self.lock().supported = supported;
    }

    pub fn set_missing_permissions(&self, missing: Vec<Permission>) {
        self.lock().missing_permissions = missing;
    }

    /// Make the next `start_advertising` calls fail with `reason`.
    pub fn fail_advertising(&self, reason: Option<&str>) {
        self.lock().advertising_failure = reason.map(str::to_string);
    }

    /// Report `AdvertisingStarted` only after `delay`, as stacks that confirm
    /// advertising from a status callback do.
    pub fn delay_start_report(&self, delay: Option<Duration>) {
        self.lock().start_report_delay = delay;
    }

    /// Simulate a central writing the CCCD to enable notifications.
    pub async fn connect_central(&self, id: &str) {
        self.emit(RadioEvent::Subscribed(ClientId::new(id))).await;
    }

    /// Simulate a central disabling notifications or dropping the link.
    pub async fn disconnect_central(&self, id: &str) {
        self.emit(RadioEvent::Unsubscribed(ClientId::new(id))).await;
    }

    /// Simulate the stack aborting an active advertisement.
    pub async fn abort_advertising(&self, reason: &str) {
        self.lock().advertising = false;
        self.emit(RadioEvent::AdvertisingFailed(reason.to_string()))
            .await;
    }

    pub fn notifications(&self) -> Vec<(ClientId, Vec<u8>)> {
        self.lock().notifications.clone()
    }

    pub fn registrations(&self) -> usize {
        self.lock().registrations
    }

    /// Calls that would have reached a real radio (register, advertise, notify).
    pub fn radio_calls(&self) -> usize {
        self.lock().radio_calls
    }

    pub fn is_advertising(&self) -> bool {
        self.lock().advertising
    }

    pub fn read_value(&self) -> Vec<u8> {
        self.lock().read_value.clone()
    }

    async fn emit(&self, event: RadioEvent) {
        let events = self.lock().events.clone();
        match events {
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    warn!("Simulated radio event dropped: server gone");
                }
            }
            None => warn!("Simulated radio event before service registration: {:?}", event),
        }
    }
}

#[async_trait]
impl PeripheralRadio for SimulatedRadio {
    async fn hardware_state(&self) -> HardwareState {
        let state = self.lock();
        if !state.supported {
            HardwareState::HardwareUnsuitable
        } else if !state.powered {
            HardwareState::Disabled
        } else {
            HardwareState::Ready
        }
    }

    fn missing_permissions(&self) -> Vec<Permission> {
        self.lock().missing_permissions.clone()
    }

    async fn register_service(&self, events: mpsc::Sender<RadioEvent>) -> Result<(), BridgeError> {
        let mut state = self.lock();
        state.radio_calls += 1;
        state.registrations += 1;
        state.events = Some(events);
        debug!("Simulated Heart Rate Service registered");
        Ok(())
    }

    async fn start_advertising(&self, device_name: &str) -> Result<(), BridgeError> {
        let events = {
            let mut state = self.lock();
            state.radio_calls += 1;
            if let Some(reason) = state.advertising_failure.clone() {
                return Err(BridgeError::AdvertisingFailure(reason));
            }
            state.advertising = true;
            (state.events.clone(), state.start_report_delay)
        };
        debug!("Simulated advertising as '{}'", device_name);
        match events {
            (Some(tx), Some(delay)) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(RadioEvent::AdvertisingStarted).await;
                });
            }
            (Some(tx), None) => {
                let _ = tx.send(RadioEvent::AdvertisingStarted).await;
            }
            (None, _) => {}
        }
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), BridgeError> {
        let events = {
            let mut state = self.lock();
            state.radio_calls += 1;
            state.advertising = false;
            state.events.clone()
        };
        if let Some(tx) = events {
            let _ = tx.send(RadioEvent::AdvertisingStopped).await;
        }
        Ok(())
    }

    async fn notify(&self, client: &ClientId, payload: &[u8]) -> Result<(), BridgeError> {
        let mut state = self.lock();
        state.radio_calls += 1;
        state.notifications.push((client.clone(), payload.to_vec()));
        Ok(())
    }

    fn set_read_value(&self, payload: &[u8]) {
        self.lock().read_value = payload.to_vec();
    }
}
