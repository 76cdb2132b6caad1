//! Kano Wand Protocol
//!
//! GATT profile constants for the wand and decoding of its notification
//! payloads.

use crate::domain::models::{ButtonEvent, Notification, RawSample};
use anyhow::Result;
use tracing::trace;

/// Advertised local name prefix of every wand
pub const WAND_NAME_PREFIX: &str = "Kano-Wand";

// Information service
pub const INFORMATION_SERVICE_UUID: u128 = 0x64a70010_f691_4b93_a6f4_0968f5b648f8;
pub const INFORMATION_ORGANISATION_CHAR_UUID: u128 = 0x64a7000b_f691_4b93_a6f4_0968f5b648f8;
pub const INFORMATION_SOFTWARE_CHAR_UUID: u128 = 0x64a70013_f691_4b93_a6f4_0968f5b648f8;
pub const INFORMATION_HARDWARE_CHAR_UUID: u128 = 0x64a70001_f691_4b93_a6f4_0968f5b648f8;

// IO service
pub const IO_SERVICE_UUID: u128 = 0x64a70012_f691_4b93_a6f4_0968f5b648f8;
pub const IO_BATTERY_CHAR_UUID: u128 = 0x64a70007_f691_4b93_a6f4_0968f5b648f8;
pub const IO_USER_BUTTON_CHAR_UUID: u128 = 0x64a7000d_f691_4b93_a6f4_0968f5b648f8;
pub const IO_VIBRATOR_CHAR_UUID: u128 = 0x64a70008_f691_4b93_a6f4_0968f5b648f8;
pub const IO_LED_CHAR_UUID: u128 = 0x64a70009_f691_4b93_a6f4_0968f5b648f8;
pub const IO_KEEP_ALIVE_CHAR_UUID: u128 = 0x64a7000f_f691_4b93_a6f4_0968f5b648f8;

// Sensor service
pub const SENSOR_SERVICE_UUID: u128 = 0x64a70011_f691_4b93_a6f4_0968f5b648f8;
pub const SENSOR_QUATERNIONS_CHAR_UUID: u128 = 0x64a70002_f691_4b93_a6f4_0968f5b648f8;
pub const SENSOR_RAW_CHAR_UUID: u128 = 0x64a7000a_f691_4b93_a6f4_0968f5b648f8;
pub const SENSOR_MOTION_CHAR_UUID: u128 = 0x64a7000c_f691_4b93_a6f4_0968f5b648f8;
pub const SENSOR_MAGN_CALIBRATE_CHAR_UUID: u128 = 0x64a70021_f691_4b93_a6f4_0968f5b648f8;
pub const SENSOR_QUATERNIONS_RESET_CHAR_UUID: u128 = 0x64a70004_f691_4b93_a6f4_0968f5b648f8;
pub const SENSOR_TEMPERATURE_CHAR_UUID: u128 = 0x64a70014_f691_4b93_a6f4_0968f5b648f8;

/// GATT "Service Changed" (0x2A05) on the Bluetooth base UUID
pub const SERVICE_CHANGED_CHAR_UUID: u128 = 0x00002a05_0000_1000_8000_00805f9b34fb;

/// Vendor-reserved characteristic (write + notify) some hosts expose on
/// every peripheral. Writing its CCCD upsets the host stack.
pub const VENDOR_RESERVED_CHAR_UUID: u128 = 0x8667556c_9a37_4c91_84ed_54ee27d90049;

/// Characteristics the gesture pipeline consumes
pub fn is_wand_input(uuid: u128) -> bool {
    uuid == IO_USER_BUTTON_CHAR_UUID || uuid == SENSOR_QUATERNIONS_CHAR_UUID
}

/// Characteristics that must never be subscribed
pub fn is_never_subscribed(uuid: u128) -> bool {
    uuid == SERVICE_CHANGED_CHAR_UUID || uuid == VENDOR_RESERVED_CHAR_UUID
}

/// Human-readable name for known profile UUIDs
pub fn uuid_name(uuid: u128) -> &'static str {
    match uuid {
        INFORMATION_SERVICE_UUID => "Information",
        INFORMATION_ORGANISATION_CHAR_UUID => "Organisation",
        INFORMATION_SOFTWARE_CHAR_UUID => "Software Version",
        INFORMATION_HARDWARE_CHAR_UUID => "Hardware Build",
        IO_SERVICE_UUID => "IO",
        IO_BATTERY_CHAR_UUID => "Battery",
        IO_USER_BUTTON_CHAR_UUID => "User Button",
        IO_VIBRATOR_CHAR_UUID => "Vibrator",
        IO_LED_CHAR_UUID => "LED",
        IO_KEEP_ALIVE_CHAR_UUID => "Keep Alive",
        SENSOR_SERVICE_UUID => "Sensor",
        SENSOR_QUATERNIONS_CHAR_UUID => "Quaternions",
        SENSOR_RAW_CHAR_UUID => "Raw Sensor",
        SENSOR_MOTION_CHAR_UUID => "Motion",
        SENSOR_MAGN_CALIBRATE_CHAR_UUID => "Magnetometer Calibrate",
        SENSOR_QUATERNIONS_RESET_CHAR_UUID => "Quaternions Reset",
        SENSOR_TEMPERATURE_CHAR_UUID => "Temperature",
        SERVICE_CHANGED_CHAR_UUID => "Service Changed",
        _ => "",
    }
}

/// Combine two bytes big-endian
pub fn to_u16(hi: u8, lo: u8) -> u16 {
    (hi as u16) << 8 | lo as u16
}

/// Decode a notification payload
///
/// # Payloads
///
/// ```text
/// 1-2 bytes : user button, [0] == 1 while pressed
/// 8 bytes   : quaternion, w x y z as big-endian u16
/// ```
///
/// Any other length is an unknown frame and is dropped.
pub fn decode(payload: &[u8]) -> Option<Notification> {
    match payload.len() {
        1 | 2 => Some(Notification::Button(ButtonEvent { value: payload[0] })),
        8 => {
            let sample = RawSample {
                w: to_u16(payload[0], payload[1]),
                x: to_u16(payload[2], payload[3]),
                y: to_u16(payload[4], payload[5]),
                z: to_u16(payload[6], payload[7]),
            };
            Some(Notification::Motion(sample))
        }
        len => {
            trace!("Ignoring {}-byte frame", len);
            None
        }
    }
}

/// Parse a 128-bit UUID, with or without dashes
pub fn parse_uuid(uuid_str: &str) -> Result<u128> {
    let uuid_str = uuid_str.trim().replace('-', "");

    if uuid_str.len() != 32 {
        return Err(anyhow::anyhow!("Invalid UUID format"));
    }

    Ok(u128::from_str_radix(&uuid_str, 16)?)
}

/// Canonical dashed lowercase form
pub fn format_uuid(uuid: u128) -> String {
    let hex = format!("{:032x}", uuid);
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// GATT characteristic property bits
pub mod property {
    pub const BROADCAST: u8 = 0x01;
    pub const READ: u8 = 0x02;
    pub const WRITE_WITHOUT_RESPONSE: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
    pub const INDICATE: u8 = 0x20;
    pub const SIGNED_WRITE: u8 = 0x40;
    pub const EXTENDED: u8 = 0x80;
}

/// Short flag string for a property mask, e.g. `RN`
pub fn property_string(props: u8) -> String {
    const FLAGS: [(u8, char); 8] = [
        (property::BROADCAST, 'B'),
        (property::READ, 'R'),
        (property::WRITE_WITHOUT_RESPONSE, 'w'),
        (property::WRITE, 'W'),
        (property::NOTIFY, 'N'),
        (property::INDICATE, 'I'),
        (property::SIGNED_WRITE, 'S'),
        (property::EXTENDED, 'E'),
    ];
    FLAGS
        .iter()
        .filter(|(bit, _)| props & bit != 0)
        .map(|(_, c)| *c)
        .collect()
}
