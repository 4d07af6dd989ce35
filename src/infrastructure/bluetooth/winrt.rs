//! WinRT GATT server backend.
//!
//! Publishes the Heart Rate Service through `GattServiceProvider`. Stack
//! callbacks arrive on WinRT threads and are forwarded with `try_send` only.

use crate::domain::error::BridgeError;
use crate::domain::models::{ClientId, HardwareState, Permission};
use crate::infrastructure::bluetooth::protocol::{
    EMPTY_MEASUREMENT, HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID,
};
use crate::infrastructure::bluetooth::radio::{PeripheralRadio, RadioEvent};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use windows::core::{IInspectable, GUID};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristicProperties, GattClientNotificationResult, GattCommunicationStatus,
    GattLocalCharacteristic, GattLocalCharacteristicParameters, GattProtectionLevel,
    GattReadRequestedEventArgs, GattServiceProvider,
    GattServiceProviderAdvertisementStatus,
    GattServiceProviderAdvertisementStatusChangedEventArgs,
    GattServiceProviderAdvertisingParameters, GattSubscribedClient,
};
use windows::Devices::Bluetooth::{BluetoothAdapter, BluetoothError};
use windows::Devices::Radios::{Radio, RadioState};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataWriter, IBuffer};

struct Registration {
    provider: GattServiceProvider,
    characteristic: GattLocalCharacteristic,
}

/// Peripheral backend on the Windows Bluetooth LE stack.
pub struct WinRtRadio {
    registration: Mutex<Option<Registration>>,
    /// Kept alive so its `StateChanged` handler keeps `radio_state` current.
    radio: Mutex<Option<Radio>>,
    radio_state: Arc<Mutex<Option<HardwareState>>>,
    read_value: Arc<Mutex<Vec<u8>>>,
    known_clients: Arc<Mutex<HashSet<String>>>,
}

impl Default for WinRtRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl WinRtRadio {
    pub fn new() -> Self {
        Self {
            registration: Mutex::new(None),
            radio: Mutex::new(None),
            radio_state: Arc::new(Mutex::new(None)),
            read_value: Arc::new(Mutex::new(EMPTY_MEASUREMENT.to_vec())),
            known_clients: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn with_registration<T>(
        &self,
        f: impl FnOnce(&Registration) -> windows::core::Result<T>,
    ) -> Result<T, BridgeError> {
        let guard = self
            .registration
            .lock()
            .map_err(|_| BridgeError::AdvertisingFailure("lock poisoned".into()))?;
        let registration = guard
            .as_ref()
            .ok_or_else(|| BridgeError::AdvertisingFailure("service not registered".into()))?;
        f(registration).map_err(advertising_error)
    }
}

fn advertising_error(e: windows::core::Error) -> BridgeError {
    BridgeError::AdvertisingFailure(e.message().to_string())
}

fn guid(uuid: uuid::Uuid) -> GUID {
    GUID::from_u128(uuid.as_u128())
}

fn to_buffer(payload: &[u8]) -> windows::core::Result<IBuffer> {
    let writer = DataWriter::new()?;
    writer.WriteBytes(payload)?;
    writer.DetachBuffer()
}

fn map_radio_state(state: windows::core::Result<RadioState>) -> HardwareState {
    match state {
        Ok(RadioState::On) => HardwareState::Ready,
        Ok(_) => HardwareState::Disabled,
        Err(e) => {
            debug!("Could not read radio state: {:?}", e);
            HardwareState::HardwareUnsuitable
        }
    }
}

fn client_id(client: &GattSubscribedClient) -> windows::core::Result<String> {
    Ok(client.Session()?.DeviceId()?.Id()?.to_string())
}

/// Diff the stack's full subscriber list into subscribe/unsubscribe events.
fn publish_subscriber_changes(
    characteristic: &GattLocalCharacteristic,
    known: &Mutex<HashSet<String>>,
    events: &mpsc::Sender<RadioEvent>,
) -> windows::core::Result<()> {
    let clients = characteristic.SubscribedClients()?;
    let mut current = HashSet::new();
    for i in 0..clients.Size()? {
        current.insert(client_id(&clients.GetAt(i)?)?);
    }

    let Ok(mut known) = known.lock() else {
        return Ok(());
    };
    for added in current.difference(&known) {
        if events
            .try_send(RadioEvent::Subscribed(ClientId::new(added.clone())))
            .is_err()
        {
            warn!("Radio event queue full, dropped subscribe of {}", added);
        }
    }
    for removed in known.difference(&current) {
        if events
            .try_send(RadioEvent::Unsubscribed(ClientId::new(removed.clone())))
            .is_err()
        {
            warn!("Radio event queue full, dropped unsubscribe of {}", removed);
        }
    }
    *known = current;
    Ok(())
}

#[async_trait]
impl PeripheralRadio for WinRtRadio {
    async fn hardware_state(&self) -> HardwareState {
        if let Some(cached) = self.radio_state.lock().ok().and_then(|state| *state) {
            return cached;
        }

        let adapter = match BluetoothAdapter::GetDefaultAsync() {
            Ok(op) => match op.await {
                Ok(adapter) => adapter,
                Err(e) => {
                    debug!("No default Bluetooth adapter: {:?}", e);
                    return HardwareState::HardwareUnsuitable;
                }
            },
            Err(_) => return HardwareState::HardwareUnsuitable,
        };

        if !adapter.IsPeripheralRoleSupported().unwrap_or(false) {
            return HardwareState::HardwareUnsuitable;
        }

        let radio = match adapter.GetRadioAsync() {
            Ok(op) => op.await,
            Err(e) => Err(e),
        };
        let radio = match radio {
            Ok(radio) => radio,
            Err(e) => {
                debug!("No radio behind the adapter: {:?}", e);
                return HardwareState::HardwareUnsuitable;
            }
        };
        let state = map_radio_state(radio.State());

        let cache = self.radio_state.clone();
        let handler = TypedEventHandler::new(
            move |sender: windows::core::Ref<Radio>, _: windows::core::Ref<IInspectable>| {
                if let Some(radio) = sender.as_ref() {
                    let next = map_radio_state(radio.State());
                    debug!("Radio state changed: {:?}", next);
                    if let Ok(mut cached) = cache.lock() {
                        *cached = Some(next);
                    }
                }
                Ok(())
            },
        );
        match radio.StateChanged(&handler) {
            Ok(_) => {
                if let Ok(mut cached) = self.radio_state.lock() {
                    *cached = Some(state);
                }
                if let Ok(mut slot) = self.radio.lock() {
                    *slot = Some(radio);
                }
            }
            Err(e) => debug!("Radio state changes not observable: {:?}", e),
        }
        state
    }

    fn missing_permissions(&self) -> Vec<Permission> {
        Vec::new()
    }

    async fn register_service(&self, events: mpsc::Sender<RadioEvent>) -> Result<(), BridgeError> {
        let result = GattServiceProvider::CreateAsync(guid(HEART_RATE_SERVICE_UUID))
            .map_err(advertising_error)?
            .await
            .map_err(advertising_error)?;
        let status = result.Error().map_err(advertising_error)?;
        if status != BluetoothError::Success {
            return Err(BridgeError::AdvertisingFailure(format!(
                "service provider: {:?}",
                status
            )));
        }
        let provider = result.ServiceProvider().map_err(advertising_error)?;

        let params = GattLocalCharacteristicParameters::new().map_err(advertising_error)?;
        params
            .SetCharacteristicProperties(
                GattCharacteristicProperties::Read | GattCharacteristicProperties::Notify,
            )
            .map_err(advertising_error)?;
        params
            .SetReadProtectionLevel(GattProtectionLevel::Plain)
            .map_err(advertising_error)?;

        let char_result = provider
            .Service()
            .map_err(advertising_error)?
            .CreateCharacteristicAsync(guid(HEART_RATE_MEASUREMENT_UUID), &params)
            .map_err(advertising_error)?
            .await
            .map_err(advertising_error)?;
        let status = char_result.Error().map_err(advertising_error)?;
        if status != BluetoothError::Success {
            return Err(BridgeError::AdvertisingFailure(format!(
                "characteristic: {:?}",
                status
            )));
        }
        let characteristic = char_result.Characteristic().map_err(advertising_error)?;

        // Subscriber changes (CCCD writes and link loss)
        let tx = events.clone();
        let known = self.known_clients.clone();
        let subscribers_handler = TypedEventHandler::new(
            move |sender: windows::core::Ref<GattLocalCharacteristic>,
                  _: windows::core::Ref<IInspectable>| {
                if let Some(characteristic) = sender.as_ref() {
                    publish_subscriber_changes(characteristic, &known, &tx)?;
                }
                Ok(())
            },
        );
        characteristic
            .SubscribedClientsChanged(&subscribers_handler)
            .map_err(advertising_error)?;

        // Reads return the last measurement; answered off the callback thread
        let value = self.read_value.clone();
        let runtime = tokio::runtime::Handle::current();
        let read_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattLocalCharacteristic>,
                  args: windows::core::Ref<GattReadRequestedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let deferral = args.GetDeferral()?;
                    let request = args.GetRequestAsync()?;
                    let value = value.clone();
                    runtime.spawn(async move {
                        let result = async {
                            let request = request.await?;
                            let payload = value
                                .lock()
                                .map(|v| v.clone())
                                .unwrap_or_else(|_| EMPTY_MEASUREMENT.to_vec());
                            request.RespondWithValue(&to_buffer(&payload)?)?;
                            windows::core::Result::Ok(())
                        }
                        .await;
                        if let Err(e) = result {
                            warn!("Read request not answered: {:?}", e);
                        }
                        if let Err(e) = deferral.Complete() {
                            warn!("Read deferral not completed: {:?}", e);
                        }
                    });
                }
                Ok(())
            },
        );
        characteristic
            .ReadRequested(&read_handler)
            .map_err(advertising_error)?;

        // Advertising status
        let tx = events;
        let status_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattServiceProvider>,
                  args: windows::core::Ref<GattServiceProviderAdvertisementStatusChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let event = match args.Status()? {
                        GattServiceProviderAdvertisementStatus::Started
                        | GattServiceProviderAdvertisementStatus::StartedWithoutAllAdvertisementData => {
                            Some(RadioEvent::AdvertisingStarted)
                        }
                        GattServiceProviderAdvertisementStatus::Stopped => {
                            Some(RadioEvent::AdvertisingStopped)
                        }
                        GattServiceProviderAdvertisementStatus::Aborted => Some(
                            RadioEvent::AdvertisingFailed(format!("aborted: {:?}", args.Error()?)),
                        ),
                        _ => None,
                    };
                    if let Some(event) = event {
                        if tx.try_send(event).is_err() {
                            error!("Radio event queue full, advertising status dropped");
                        }
                    }
                }
                Ok(())
            },
        );
        provider
            .AdvertisementStatusChanged(&status_handler)
            .map_err(advertising_error)?;

        info!("GATT service provider created");
        let mut slot = self
            .registration
            .lock()
            .map_err(|_| BridgeError::AdvertisingFailure("lock poisoned".into()))?;
        *slot = Some(Registration {
            provider,
            characteristic,
        });
        Ok(())
    }

    async fn start_advertising(&self, device_name: &str) -> Result<(), BridgeError> {
        // The stack advertises the machine name; the configured name is informational.
        debug!("Advertising requested as '{}'", device_name);
        self.with_registration(|registration| {
            let params = GattServiceProviderAdvertisingParameters::new()?;
            params.SetIsConnectable(true)?;
            params.SetIsDiscoverable(true)?;
            registration
                .provider
                .StartAdvertisingWithParameters(&params)
        })
    }

    async fn stop_advertising(&self) -> Result<(), BridgeError> {
        if let Ok(mut known) = self.known_clients.lock() {
            known.clear();
        }
        self.with_registration(|registration| registration.provider.StopAdvertising())
    }

    async fn notify(&self, client: &ClientId, payload: &[u8]) -> Result<(), BridgeError> {
        let (characteristic, target) = self.with_registration(|registration| {
            let clients = registration.characteristic.SubscribedClients()?;
            let mut target = None;
            for i in 0..clients.Size()? {
                let candidate = clients.GetAt(i)?;
                if client_id(&candidate)? == client.0 {
                    target = Some(candidate);
                    break;
                }
            }
            Ok((registration.characteristic.clone(), target))
        })?;

        let Some(target) = target else {
            return Err(BridgeError::AdvertisingFailure(format!(
                "{} is no longer subscribed",
                client
            )));
        };

        let buffer = to_buffer(payload).map_err(advertising_error)?;
        let result: GattClientNotificationResult = characteristic
            .NotifyValueForSubscribedClientAsync(&buffer, &target)
            .map_err(advertising_error)?
            .await
            .map_err(advertising_error)?;
        match result.Status().map_err(advertising_error)? {
            GattCommunicationStatus::Success => Ok(()),
            other => Err(BridgeError::AdvertisingFailure(format!(
                "notify status {:?}",
                other
            ))),
        }
    }

    fn set_read_value(&self, payload: &[u8]) {
        if let Ok(mut value) = self.read_value.lock() {
            *value = payload.to_vec();
        }
    }
}
