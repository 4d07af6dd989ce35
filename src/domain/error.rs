use thiserror::Error;

/// Failures that can surface anywhere in the bridge.
///
/// Subsystem failures are never thrown across a component boundary; they are
/// stored inside `AdvertisingState` / `WebServerState` and translated into
/// `ServicesState::Error` by the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// No adapter, or the adapter cannot act as a peripheral.
    #[error("Bluetooth hardware is unavailable or cannot act as a peripheral")]
    HardwareUnavailable,
    /// Adapter present but powered off.
    #[error("Bluetooth is disabled")]
    HardwareDisabled,
    #[error("missing permissions: {}", .0.join(", "))]
    PermissionDenied(Vec<String>),
    #[error("advertising failed: {0}")]
    AdvertisingFailure(String),
    #[error("web server failed to bind: {0}")]
    WebServerBindFailure(String),
    #[error("BPM value {0} is outside 0..=255")]
    InvalidBpm(i32),
}
