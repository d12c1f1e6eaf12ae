use std::time::Duration;

use bon::Builder;

use crate::protocol::{
    DEFAULT_AWAIT_STATUS_TIMEOUT, DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_SIZE,
    DEFAULT_DEVICE_NAME_FRAGMENT, DEFAULT_FINALIZE_TIMEOUT, DEFAULT_IMAGE_INFO_DELAY,
    DEFAULT_MAX_PACKET_COUNT, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_SCAN_TIMEOUT,
    DEFAULT_SETTLE_DELAY, DEFAULT_STATUS_QUERY_TIMEOUT, DEFAULT_WRITE_SHORT_UUID,
    DEFAULT_NOTIFY_SHORT_UUID,
};

/// Tunables for [`super::UploadEngine`] (spec §4.6, §6).
#[derive(Debug, Clone, Builder)]
pub struct EngineConfig {
    /// Payload bytes per frame.
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Delay between successive data-chunk writes.
    #[builder(default = DEFAULT_CHUNK_DELAY)]
    pub chunk_delay: Duration,
    /// Delay between the info frame and the first data chunk.
    #[builder(default = DEFAULT_IMAGE_INFO_DELAY)]
    pub image_info_delay: Duration,
    /// How long to scan before giving up with [`crate::UploadError::DeviceNotFound`].
    #[builder(default = DEFAULT_SCAN_TIMEOUT)]
    pub scan_timeout: Duration,
    /// How long to wait for the first device-status notification after subscribing.
    #[builder(default = DEFAULT_AWAIT_STATUS_TIMEOUT)]
    pub await_status_timeout: Duration,
    /// How long to wait for a terminal notification after the last chunk is written.
    #[builder(default = DEFAULT_FINALIZE_TIMEOUT)]
    pub finalize_timeout: Duration,
    /// Default wait used by a standalone [`super::UploadEngine::query_status`] call.
    #[builder(default = DEFAULT_STATUS_QUERY_TIMEOUT)]
    pub status_query_timeout: Duration,
    /// Minimum delay enforced between entering `Ready` and announcing an upload.
    #[builder(default = DEFAULT_SETTLE_DELAY)]
    pub settle_delay: Duration,
    /// Maximum accepted composed-payload size in bytes.
    #[builder(default = DEFAULT_MAX_PAYLOAD_SIZE)]
    pub max_payload_size: usize,
    /// Maximum accepted packet count for one transfer.
    #[builder(default = DEFAULT_MAX_PACKET_COUNT)]
    pub max_packet_count: usize,
    /// Advertised local-name fragment used to identify the device while scanning.
    #[builder(default = DEFAULT_DEVICE_NAME_FRAGMENT.to_string())]
    pub device_name_fragment: String,
    /// Write-characteristic UUID to match, in any form (normalized before comparison).
    #[builder(default = format!("{DEFAULT_WRITE_SHORT_UUID:04x}"))]
    pub write_uuid: String,
    /// Notify-characteristic UUID to match, in any form (normalized before comparison).
    #[builder(default = format!("{DEFAULT_NOTIFY_SHORT_UUID:04x}"))]
    pub notify_uuid: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
