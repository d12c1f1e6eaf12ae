use thiserror::Error;

use crate::frame::FrameError;
use crate::payload::PayloadError;

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Errors returned while reading image/animation source files for the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read `{path}`")]
    ReadFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{path}` does not look like a JPEG file (missing 0xFFD8 marker)")]
    NotAJpeg { path: std::path::PathBuf },
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Top-level error taxonomy for upload engine operations (spec §7).
#[derive(Debug, Error)]
pub enum UploadError {
    /// Transport is not powered on or is not permitted to operate.
    #[error("BLE adapter is down or not permitted")]
    AdapterDown,
    /// The scan timeout elapsed without finding a matching peripheral.
    #[error("no matching device was found within the scan timeout")]
    DeviceNotFound,
    /// The transport's connect operation failed.
    #[error("connection to the device failed: {reason}")]
    ConnectionFailed { reason: String },
    /// Required write and/or notify UUIDs were not present on the peripheral.
    #[error("required write/notify characteristics are missing: {missing}")]
    CharacteristicsMissing { missing: String },
    /// An inbound frame failed checksum or structural verification.
    #[error(transparent)]
    ProtocolViolation(#[from] FrameError),
    /// Composing the envelope payload failed.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// The `"1111111111"` error sentinel was observed; the upload was aborted.
    #[error("device reported an error during the transfer")]
    DeviceError,
    /// The storage predicate failed against the device's reported free space.
    #[error("insufficient device storage: need {needed_kb} KiB, {free_kb} KiB free")]
    InsufficientStorage { needed_kb: u64, free_kb: u64 },
    /// The payload exceeds `max_payload_size` or `max_packet_count`.
    #[error("payload too large: {size} bytes across {packet_count} packets exceeds the configured limit")]
    PayloadTooLarge { size: usize, packet_count: usize },
    /// The underlying transport refused a write.
    #[error("transport write failed: {reason}")]
    TransportWriteFailed { reason: String },
    /// A bounded wait elapsed (await-status, finalize, or status query).
    #[error("timed out waiting for {stage}")]
    Timeout { stage: &'static str },
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::xv4::XvFourError;

    #[test]
    fn frame_error_converts_into_protocol_violation() {
        let frame_error = FrameError::TooShort { actual: 2 };
        let upload_error: UploadError = frame_error.into();
        assert_matches!(upload_error, UploadError::ProtocolViolation(FrameError::TooShort { actual: 2 }));
    }

    #[test]
    fn payload_error_converts_into_upload_error() {
        let upload_error: UploadError = PayloadError::XvFour(XvFourError::EmptyAnimation).into();
        assert_matches!(upload_error, UploadError::Payload(_));
    }
}
