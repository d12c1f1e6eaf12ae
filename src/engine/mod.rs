//! Component F: the upload engine (spec §4.6, §5) — the state machine that
//! drives a connection, announces content, streams it in chunks, and watches
//! the notification-driven error and completion signals.

mod config;
mod shared;
mod state;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tokio_stream::StreamExt;
use tracing::{info, instrument, warn};

pub use self::config::EngineConfig;
pub use self::shared::NotificationLogEntry;
pub use self::state::DeviceState;

use crate::error::UploadError;
use crate::frame::Framer;
use crate::payload::PayloadComposer;
use crate::protocol::{normalize_uuid, uuids_match, PacketType, STORAGE_SAFETY_MARGIN};
use crate::response::{DeviceStatus, ResponseParser};
use crate::transport::{
    CharacteristicDescriptor, PeripheralHandle, PowerState, ScanFilter, ServiceDescriptor,
    Transport,
};
use crate::xv4::AnimationFrame;
use shared::SharedState;

/// A progress callback invoked with a monotonically non-decreasing
/// percentage in `[0, 100]`, with the final call guaranteed to be `100` on
/// success (spec §4.6).
pub type ProgressCallback = dyn Fn(u8) + Send + Sync;

/// Drives one device connection end-to-end (spec §4.6).
///
/// Exactly one device at a time; reconnect by constructing a new engine.
pub struct UploadEngine {
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    state: Mutex<DeviceState>,
    peripheral: Mutex<Option<PeripheralHandle>>,
    write_uuid: Mutex<Option<String>>,
    shared: Arc<SharedState>,
    notify_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    ready_since: Mutex<Option<Instant>>,
    last_progress: AtomicU8,
}

impl UploadEngine {
    /// Creates an engine bound to `transport`, using `config` for all
    /// timeouts, limits, and UUIDs.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(DeviceState::Idle),
            peripheral: Mutex::new(None),
            write_uuid: Mutex::new(None),
            shared: Arc::new(SharedState::new()),
            notify_task: Mutex::new(None),
            ready_since: Mutex::new(None),
            last_progress: AtomicU8::new(0),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        *self.state.lock().unwrap()
    }

    /// Returns the latest device-status record, if one has been observed.
    #[must_use]
    pub fn device_status(&self) -> Option<DeviceStatus> {
        self.shared.device_status()
    }

    fn set_state(&self, next: DeviceState) {
        *self.state.lock().unwrap() = next;
    }

    /// Runs the connection algorithm (spec §4.6): ensure the adapter is
    /// powered, scan for a matching peripheral, connect, discover
    /// characteristics, subscribe, and wait briefly for an initial
    /// device-status notification.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::AdapterDown`], [`UploadError::DeviceNotFound`],
    /// [`UploadError::ConnectionFailed`], or
    /// [`UploadError::CharacteristicsMissing`] as each step fails.
    #[instrument(skip(self), fields(address = address.unwrap_or("<scan-by-name>")))]
    pub async fn connect(&self, address: Option<&str>) -> Result<(), UploadError> {
        self.set_state(DeviceState::Scanning);
        if !matches!(self.transport.power_state().await, PowerState::PoweredOn) {
            return Err(UploadError::AdapterDown);
        }

        let filter = ScanFilter {
            address: address.map(ToString::to_string),
            name_fragment: address
                .is_none()
                .then(|| self.config.device_name_fragment.clone()),
        };
        info!(?filter, "scan-start");
        self.transport
            .scan_start(filter.clone())
            .await
            .map_err(|source| UploadError::ConnectionFailed {
                reason: source.to_string(),
            })?;

        let mut events = self.transport.scan_events();
        let found = timeout(self.config.scan_timeout, async {
            while let Some(peripheral) = events.next().await {
                if matches(&filter, &peripheral.name, &peripheral.address) {
                    return Some(peripheral);
                }
            }
            None
        })
        .await;
        let _ = self.transport.scan_stop().await;

        let Ok(Some(peripheral)) = found else {
            return Err(UploadError::DeviceNotFound);
        };
        info!(address = %peripheral.address, "device-found");

        self.set_state(DeviceState::Connecting);
        info!("connect-start");
        let handle = self
            .transport
            .connect(&peripheral.address)
            .await
            .map_err(|source| UploadError::ConnectionFailed {
                reason: source.to_string(),
            })?;
        info!("connected");

        self.set_state(DeviceState::Discovering);
        let services =
            self.transport
                .discover(&handle)
                .await
                .map_err(|source| UploadError::ConnectionFailed {
                    reason: source.to_string(),
                })?;
        let (write_uuid, notify_uuid) = resolve_characteristics(
            &services,
            &self.config.write_uuid,
            &self.config.notify_uuid,
        )?;
        info!(%write_uuid, %notify_uuid, "discover-char");

        let stream = self
            .transport
            .subscribe(&handle, &notify_uuid)
            .map_err(|source| UploadError::CharacteristicsMissing {
                missing: source.to_string(),
            })?;
        let shared = Arc::clone(&self.shared);
        let mut stream = stream;
        let task = tokio::spawn(async move {
            while let Some(raw) = stream.next().await {
                let parsed = ResponseParser::parse(&raw);
                shared.record_notification(raw, parsed);
            }
        });
        *self.notify_task.lock().unwrap() = Some(task);

        self.set_state(DeviceState::AwaitingStatus);
        info!("status-wait");
        if timeout(self.config.await_status_timeout, self.shared.status_waiter.notified())
            .await
            .is_ok()
        {
            info!("status-received");
        } else {
            warn!("no device-status notification received within the await-status timeout; proceeding anyway");
        }

        *self.peripheral.lock().unwrap() = Some(handle);
        *self.write_uuid.lock().unwrap() = Some(write_uuid);
        *self.ready_since.lock().unwrap() = Some(Instant::now());
        self.set_state(DeviceState::Ready);
        Ok(())
    }

    /// Runs a standalone status query: waits up to `wait` for a
    /// device-status record (returning immediately if one is already known)
    /// and returns it alongside the full notification log collected since
    /// subscription.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Timeout`] if no device-status record is
    /// available before `wait` elapses.
    pub async fn query_status(
        &self,
        wait: Duration,
    ) -> Result<(DeviceStatus, Vec<NotificationLogEntry>), UploadError> {
        if let Some(status) = self.shared.device_status() {
            return Ok((status, self.shared.notifications_snapshot()));
        }
        if timeout(wait, self.shared.status_waiter.notified()).await.is_err() {
            return Err(UploadError::Timeout { stage: "status query" });
        }
        let status = self
            .shared
            .device_status()
            .ok_or(UploadError::Timeout { stage: "status query" })?;
        Ok((status, self.shared.notifications_snapshot()))
    }

    /// Uploads a single still image (spec §4.4, §4.6).
    ///
    /// # Errors
    ///
    /// Returns any error from composing the `IMB` envelope, the limit and
    /// storage checks, or the streaming loop itself.
    #[instrument(skip(self, jpeg, progress), fields(jpeg_len = jpeg.len()))]
    pub async fn upload_image(
        &self,
        jpeg: &[u8],
        dimensions: (u16, u16),
        progress: Option<&ProgressCallback>,
    ) -> Result<(), UploadError> {
        let payload = PayloadComposer::image_data(jpeg, dimensions, PacketType::Image)?;
        self.stream_payload(payload, PacketType::Image, progress).await
    }

    /// Uploads an animation (spec §4.3, §4.4, §4.6).
    ///
    /// # Errors
    ///
    /// Returns any error from composing the `xV4` envelope, the limit and
    /// storage checks, or the streaming loop itself.
    #[instrument(skip(self, frames, progress), fields(frame_count = frames.len()))]
    pub async fn upload_animation(
        &self,
        frames: &[AnimationFrame<'_>],
        interval_ms: u32,
        dimensions: (u16, u16),
        progress: Option<&ProgressCallback>,
    ) -> Result<(), UploadError> {
        let payload = PayloadComposer::animation_data(frames, interval_ms, dimensions)?;
        self.stream_payload(payload, PacketType::DynamicAmbience, progress)
            .await
    }

    async fn stream_payload(
        &self,
        payload: Vec<u8>,
        content_subtype: PacketType,
        progress: Option<&ProgressCallback>,
    ) -> Result<(), UploadError> {
        if self.state() != DeviceState::Ready {
            return Err(UploadError::ConnectionFailed {
                reason: "upload attempted before connect() completed or after disconnect()"
                    .to_string(),
            });
        }

        self.settle().await;

        let packet_count = payload.len().div_ceil(self.config.chunk_size).max(1);
        if payload.len() > self.config.max_payload_size || packet_count > self.config.max_packet_count
        {
            return Err(UploadError::PayloadTooLarge {
                size: payload.len(),
                packet_count,
            });
        }

        if let Some(status) = self.shared.device_status() {
            let needed_kb = ((payload.len() as f64 * STORAGE_SAFETY_MARGIN) / 1024.0).ceil() as u64;
            if status.free_space_kb < needed_kb {
                return Err(UploadError::InsufficientStorage {
                    needed_kb,
                    free_kb: status.free_space_kb,
                });
            }
        }

        let peripheral_guard = self.peripheral.lock().unwrap().clone();
        let peripheral = peripheral_guard.ok_or(UploadError::ConnectionFailed {
            reason: "not connected".to_string(),
        })?;
        let write_uuid = self
            .write_uuid
            .lock()
            .unwrap()
            .clone()
            .ok_or(UploadError::ConnectionFailed {
                reason: "not connected".to_string(),
            })?;

        self.set_state(DeviceState::AnnouncingInfo);
        let info_frame = Framer::build(
            PacketType::Image.as_u8(),
            0,
            0,
            &PayloadComposer::image_info(PacketType::Image, 1),
        );
        self.write(&peripheral, &write_uuid, &info_frame).await?;
        info!("info-sent");
        sleep(self.config.image_info_delay).await;

        self.set_state(DeviceState::Streaming {
            total: packet_count,
            sent: 0,
            errored: false,
        });
        info!(packet_count, "data-start");
        let frames = Framer::build_sequence(content_subtype.as_u8(), &payload, self.config.chunk_size);
        self.last_progress.store(0, Ordering::SeqCst);
        for (index, frame) in frames.iter().enumerate() {
            self.write(&peripheral, &write_uuid, frame).await?;

            if self.shared.is_errored() {
                self.set_state(DeviceState::Streaming {
                    total: packet_count,
                    sent: index + 1,
                    errored: true,
                });
                return Err(UploadError::DeviceError);
            }

            let percent = (((index + 1) * 100) / packet_count).min(100) as u8;
            self.last_progress.store(percent, Ordering::SeqCst);
            if let Some(callback) = progress {
                callback(percent);
            }
            tracing::debug!(index, packet_count, percent, "data-progress");

            self.set_state(DeviceState::Streaming {
                total: packet_count,
                sent: index + 1,
                errored: false,
            });
            sleep(self.config.chunk_delay).await;
        }

        self.set_state(DeviceState::Finalizing);
        let _ = timeout(self.config.finalize_timeout, self.shared.notification_waiter.notified()).await;
        self.set_state(DeviceState::Ready);

        if self.shared.is_errored() {
            return Err(UploadError::DeviceError);
        }
        info!("data-complete");
        Ok(())
    }

    async fn settle(&self) {
        let ready_since = *self.ready_since.lock().unwrap();
        if let Some(ready_since) = ready_since {
            let elapsed = ready_since.elapsed();
            if elapsed < self.config.settle_delay {
                sleep(self.config.settle_delay - elapsed).await;
            }
        }
    }

    async fn write(
        &self,
        peripheral: &PeripheralHandle,
        write_uuid: &str,
        frame: &[u8],
    ) -> Result<(), UploadError> {
        self.transport
            .write(peripheral, write_uuid, frame, true)
            .await
            .map_err(|source| UploadError::TransportWriteFailed {
                reason: source.to_string(),
            })
    }

    /// Disconnects, idempotently. Unsubscribes the notify task, tears down
    /// the peripheral (best-effort), and transitions to `Closed`.
    pub async fn disconnect(&self) -> Result<(), UploadError> {
        {
            let mut state = self.state.lock().unwrap();
            if *state == DeviceState::Closed {
                return Ok(());
            }
            *state = DeviceState::Closed;
        }

        if let Some(task) = self.notify_task.lock().unwrap().take() {
            task.abort();
        }
        let peripheral = self.peripheral.lock().unwrap().take();
        if let Some(peripheral) = peripheral {
            let _ = self.transport.disconnect(&peripheral).await;
        }
        Ok(())
    }
}

fn matches(filter: &ScanFilter, name: &Option<String>, address: &str) -> bool {
    if let Some(expected_address) = &filter.address {
        return expected_address == address;
    }
    match (&filter.name_fragment, name) {
        (Some(fragment), Some(name)) => name.to_lowercase().contains(&fragment.to_lowercase()),
        _ => false,
    }
}

fn resolve_characteristics(
    services: &[ServiceDescriptor],
    write_uuid_cfg: &str,
    notify_uuid_cfg: &str,
) -> Result<(String, String), UploadError> {
    let characteristics: Vec<&CharacteristicDescriptor> = services
        .iter()
        .flat_map(|service| service.characteristics.iter())
        .collect();

    let write_uuid = characteristics
        .iter()
        .find(|characteristic| uuids_match(&characteristic.uuid, write_uuid_cfg))
        .map(|characteristic| characteristic.uuid.clone());
    let notify_uuid = characteristics
        .iter()
        .find(|characteristic| uuids_match(&characteristic.uuid, notify_uuid_cfg))
        .map(|characteristic| characteristic.uuid.clone());

    match (write_uuid, notify_uuid) {
        (Some(write_uuid), Some(notify_uuid)) => Ok((write_uuid, notify_uuid)),
        (write_uuid, notify_uuid) => {
            let mut missing = Vec::new();
            if write_uuid.is_none() {
                missing.push(format!("write ({})", normalize_uuid(write_uuid_cfg)));
            }
            if notify_uuid.is_none() {
                missing.push(format!("notify ({})", normalize_uuid(notify_uuid_cfg)));
            }
            Err(UploadError::CharacteristicsMissing {
                missing: missing.join(", "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hw::fake_backend::FakeBackend;

    fn image_jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02, 0x03, 0x04]
    }

    #[tokio::test]
    async fn full_upload_round_trip_against_fake_backend() {
        let backend = Arc::new(FakeBackend::with_default_device());
        let engine = UploadEngine::new(backend, EngineConfig::default());

        engine.connect(None).await.expect("should connect");
        assert_eq!(DeviceState::Ready, engine.state());
        assert!(engine.device_status().is_some());

        let percentages = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&percentages);
        let callback = move |percent: u8| recorded.lock().unwrap().push(percent);
        engine
            .upload_image(&image_jpeg(), (64, 32), Some(&callback))
            .await
            .expect("upload should succeed");

        let observed = percentages.lock().unwrap().clone();
        assert_eq!(Some(&100u8), observed.last());
        assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));

        engine.disconnect().await.expect("disconnect should succeed");
        engine.disconnect().await.expect("disconnect should be idempotent");
    }

    #[tokio::test]
    async fn state_reports_streaming_progress_mid_upload() {
        let backend = Arc::new(FakeBackend::with_default_device());
        let engine = UploadEngine::new(
            backend,
            EngineConfig::builder().chunk_size(64).build(),
        );
        engine.connect(None).await.expect("should connect");

        let large_jpeg = vec![0xAB; 1024];
        let states = Arc::new(Mutex::new(Vec::new()));
        let engine = Arc::new(engine);
        let engine_for_callback = Arc::clone(&engine);
        let recorded_states = Arc::clone(&states);
        let progress_callback = move |_percent: u8| {
            recorded_states.lock().unwrap().push(engine_for_callback.state());
        };

        engine
            .upload_image(&large_jpeg, (64, 32), Some(&progress_callback))
            .await
            .expect("upload should succeed");

        let states = states.lock().unwrap().clone();
        assert!(states.len() > 1, "expected more than one chunk for a 1024-byte image");
        let mut saw_partial_progress = false;
        for state in &states {
            match state {
                DeviceState::Streaming { total, sent, errored } => {
                    assert!(!errored);
                    assert!(*sent <= *total);
                    if *sent < *total {
                        saw_partial_progress = true;
                    }
                }
                DeviceState::AnnouncingInfo => {}
                other => panic!("unexpected state observed mid-upload: {other:?}"),
            }
        }
        assert!(saw_partial_progress, "expected to observe partial progress before completion");
    }

    #[tokio::test]
    async fn upload_fails_when_device_reports_error_sentinel() {
        let backend = Arc::new(FakeBackend::with_error_after_first_chunk());
        let engine = UploadEngine::new(backend, EngineConfig::default());
        engine.connect(None).await.expect("should connect");

        let result = engine.upload_image(&image_jpeg(), (64, 32), None).await;
        assert!(matches!(result, Err(UploadError::DeviceError)));
    }

    #[tokio::test]
    async fn connect_fails_with_device_not_found_when_no_fixture_matches() {
        let backend = Arc::new(FakeBackend::with_no_devices());
        let engine = UploadEngine::new(
            backend,
            EngineConfig::builder()
                .scan_timeout(Duration::from_millis(50))
                .build(),
        );

        let result = engine.connect(None).await;
        assert!(matches!(result, Err(UploadError::DeviceNotFound)));
    }

    #[tokio::test]
    async fn query_status_returns_record_and_notification_log() {
        let backend = Arc::new(FakeBackend::with_default_device());
        let engine = UploadEngine::new(backend, EngineConfig::default());
        engine.connect(None).await.expect("should connect");

        let (status, log) = engine
            .query_status(Duration::from_secs(1))
            .await
            .expect("status should be available");
        assert_eq!("BeamBox", status.device_name);
        assert!(!log.is_empty());
    }
}
