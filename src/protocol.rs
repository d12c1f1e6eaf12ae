use std::time::Duration;

use strum_macros::{Display, EnumIter};

/// Constant command-type byte at frame offset 0.
pub const COMMAND_TYPE: u8 = 0xF1;

/// Default chunk size (payload bytes per frame), `0x1F0`.
pub const DEFAULT_CHUNK_SIZE: usize = 0x1F0;

/// Default delay between successive data-chunk writes.
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(100);

/// Default delay between the info frame and the first data chunk.
pub const DEFAULT_IMAGE_INFO_DELAY: Duration = Duration::from_millis(10);

/// Default scan timeout.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait for the first device-status notification after subscribing.
pub const DEFAULT_AWAIT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait for a terminal notification after the last chunk is written.
pub const DEFAULT_FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default wait used by a standalone status query.
pub const DEFAULT_STATUS_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Settle delay the device requires between `Ready` and the first write.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum payload size accepted by an upload, 2 MiB.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 2 * 1024 * 1024;

/// Default maximum packet count accepted by an upload.
pub const DEFAULT_MAX_PACKET_COUNT: usize = 20_000;

/// Default advertised local-name fragment used to identify the device while scanning.
pub const DEFAULT_DEVICE_NAME_FRAGMENT: &str = "beambox e-Badge Pulse";

/// Storage safety margin applied to the device's reported free space.
pub const STORAGE_SAFETY_MARGIN: f64 = 1.10;

/// Default short UUID (as `0000XXXX-...`) of the write characteristic.
pub const DEFAULT_WRITE_SHORT_UUID: u16 = 0x01F1;

/// Default short UUID of the notify characteristic.
pub const DEFAULT_NOTIFY_SHORT_UUID: u16 = 0x01F2;

/// Packet-type codes used as frame header byte 1 and as the JSON `"type"` value.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
#[repr(u8)]
pub enum PacketType {
    /// Animation container body (`xV4`).
    #[strum(to_string = "dynamic_ambience")]
    DynamicAmbience = 0x05,
    /// Single-image body and all info announcements.
    #[strum(to_string = "image")]
    Image = 0x06,
    /// Reserved, unused by this controller.
    #[strum(to_string = "photo_album_count")]
    PhotoAlbumCount = 0x0C,
    /// Inbound device-state notification.
    #[strum(to_string = "device_status")]
    DeviceStatus = 0x0D,
}

impl PacketType {
    /// Returns the raw protocol byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x05 => Ok(Self::DynamicAmbience),
            0x06 => Ok(Self::Image),
            0x0C => Ok(Self::PhotoAlbumCount),
            0x0D => Ok(Self::DeviceStatus),
            other => Err(other),
        }
    }
}

/// Device response sentinel substrings (§6).
pub mod sentinel {
    pub const SUCCESS: &str = "GetPacketSuccess";
    pub const FAIL: &str = "PacketFail";
    pub const ERROR: &str = "1111111111";
}

/// Normalizes a BLE UUID for comparison: lowercases hex, strips dashes, and
/// collapses the Bluetooth Base UUID `0000XXXX-0000-1000-8000-00805F9B34FB`
/// to its 4-hex-digit short form.
#[must_use]
pub fn normalize_uuid(uuid: &str) -> String {
    let stripped: String = uuid
        .chars()
        .filter(|character| *character != '-')
        .map(|character| character.to_ascii_lowercase())
        .collect();

    const BASE_SUFFIX: &str = "00001000800000805f9b34fb";
    if stripped.len() == 32 && stripped.ends_with(BASE_SUFFIX) && stripped.starts_with("0000") {
        stripped[4..8].to_string()
    } else {
        stripped
    }
}

/// Returns the normalized default write-characteristic UUID.
#[must_use]
pub fn default_write_uuid_normalized() -> String {
    format!("{DEFAULT_WRITE_SHORT_UUID:04x}")
}

/// Returns the normalized default notify-characteristic UUID.
#[must_use]
pub fn default_notify_uuid_normalized() -> String {
    format!("{DEFAULT_NOTIFY_SHORT_UUID:04x}")
}

/// Returns whether two UUIDs are equivalent under normalization.
#[must_use]
pub fn uuids_match(a: &str, b: &str) -> bool {
    normalize_uuid(a) == normalize_uuid(b)
}
