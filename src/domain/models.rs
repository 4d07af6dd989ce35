use crate::domain::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Advertising lifecycle of the GATT peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AdvertisingState {
    Started,
    #[default]
    Stopped,
    Failure(BridgeError),
}

/// Whether the local radio can host the peripheral right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareState {
    Ready,
    Disabled,
    HardwareUnsuitable,
}

/// Platform permissions the peripheral may need before advertising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    BluetoothAdvertise,
    BluetoothConnect,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BluetoothAdvertise => write!(f, "BLUETOOTH_ADVERTISE"),
            Self::BluetoothConnect => write!(f, "BLUETOOTH_CONNECT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WebServerState {
    pub is_ready: bool,
    pub error: Option<BridgeError>,
}

impl WebServerState {
    pub fn ready() -> Self {
        Self {
            is_ready: true,
            error: None,
        }
    }

    pub fn failed(error: BridgeError) -> Self {
        Self {
            is_ready: false,
            error: Some(error),
        }
    }
}

/// One heart-rate sample accepted by the HTTP bridge.
///
/// `value` is kept exactly as posted; range checking happens where the value
/// is put on the air. `sequence_number` makes repeated values distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpmReading {
    pub value: i32,
    pub sequence_number: u64,
}

/// Body of `POST /`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmPayload {
    pub bpm: i32,
}

/// Unified lifecycle of both subsystems.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServicesState {
    Starting,
    Started,
    Stopping,
    #[default]
    Stopped,
    Error(BridgeError),
}

impl fmt::Display for ServicesState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::Started => write!(f, "Started"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Error(e) => write!(f, "Error ({})", e),
        }
    }
}

/// Snapshot observed by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    /// Last BPM seen; `None` unless services are `Started`.
    pub bpm: Option<i32>,
    pub is_client_connected: bool,
    pub services_state: ServicesState,
}

/// Answer to a start/stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    /// The request did not match the current state; nothing was done.
    AlreadyInState(ServicesState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBpmStatus {
    Started,
    Stopped,
    AlreadyRunning,
    /// Services are not `Started`.
    NotPermitted,
}

/// Identifier of a remote central, as reported by the radio stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
