//! Heart Rate Profile
//!
//! Identifiers and the measurement encoding for the standard Bluetooth SIG
//! Heart Rate Service.

use crate::domain::error::BridgeError;
use uuid::Uuid;

/// Heart Rate Service (0x180D)
pub const HEART_RATE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180D_0000_1000_8000_00805f9b34fb);

/// Heart Rate Measurement Characteristic (0x2A37), READ + NOTIFY
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x00002A37_0000_1000_8000_00805f9b34fb);

/// Client Characteristic Configuration Descriptor (0x2902)
pub const CCCD_UUID: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// Measurement flags byte
///
/// ```text
/// bit 0    : value format (0 = UINT8, 1 = UINT16)
/// bits 1-2 : sensor contact status
/// bit 3    : energy expended present
/// bit 4    : RR-interval present
/// ```
pub mod flags {
    pub const VALUE_FORMAT_UINT16: u8 = 0x01;
    pub const SENSOR_CONTACT_SUPPORTED: u8 = 0x04;
    pub const ENERGY_EXPENDED_PRESENT: u8 = 0x08;
    pub const RR_INTERVAL_PRESENT: u8 = 0x10;

    /// UINT8 value, no sensor contact, no energy expended, no RR-interval
    pub const UINT8_ONLY: u8 = 0x00;
}

/// Encoded size of a UINT8 measurement
pub const MEASUREMENT_LEN: usize = 2;

/// Value served to reads before the first notification.
pub const EMPTY_MEASUREMENT: [u8; MEASUREMENT_LEN] = [flags::UINT8_ONLY, 0];

/// Check that a BPM value fits the UINT8 measurement format.
pub fn validate_bpm(bpm: i32) -> Result<u8, BridgeError> {
    u8::try_from(bpm).map_err(|_| BridgeError::InvalidBpm(bpm))
}

/// Encode a Heart Rate Measurement
///
/// ```text
/// [0] : flags (0x00)
/// [1] : heart rate (u8)
/// ```
pub fn encode_measurement(bpm: u8) -> [u8; MEASUREMENT_LEN] {
    [flags::UINT8_ONLY, bpm]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_strings() {
        assert_eq!(
            HEART_RATE_SERVICE_UUID.to_string(),
            "0000180d-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            HEART_RATE_MEASUREMENT_UUID.to_string(),
            "00002a37-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(CCCD_UUID.to_string(), "00002902-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn test_measurement_bytes() {
        assert_eq!(encode_measurement(72), [0x00, 72]);
        assert_eq!(encode_measurement(255), [0x00, 0xFF]);
    }

    #[test]
    fn test_flags_advertise_uint8_only() {
        let optional = flags::VALUE_FORMAT_UINT16
            | flags::SENSOR_CONTACT_SUPPORTED
            | flags::ENERGY_EXPENDED_PRESENT
            | flags::RR_INTERVAL_PRESENT;
        assert_eq!(flags::UINT8_ONLY & optional, 0);
        assert_eq!(encode_measurement(0)[0], flags::UINT8_ONLY);
        assert_eq!(EMPTY_MEASUREMENT[0], flags::UINT8_ONLY);
    }

    #[test]
    fn test_validate_bpm_bounds() {
        assert_eq!(validate_bpm(0), Ok(0));
        assert_eq!(validate_bpm(255), Ok(255));
        assert_eq!(validate_bpm(-1), Err(BridgeError::InvalidBpm(-1)));
        assert_eq!(validate_bpm(256), Err(BridgeError::InvalidBpm(256)));
    }
}
