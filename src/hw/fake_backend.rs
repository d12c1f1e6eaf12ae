//! A fixture-driven, in-memory [`Transport`] used to exercise the upload
//! engine's full state machine without real Bluetooth hardware.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::frame::Framer;
use crate::protocol::{default_notify_uuid_normalized, default_write_uuid_normalized, PacketType};
use crate::transport::{
    BoxStream, CharacteristicDescriptor, DiscoveredPeripheral, PeripheralHandle, PowerState,
    ScanFilter, ServiceDescriptor, Transport, TransportError,
};

const FIXTURE_ADDRESS: &str = "AA:BB:CC:DD:EE:FF";
const FIXTURE_NAME: &str = "beambox e-Badge Pulse #1234";

fn device_status_notification() -> Vec<u8> {
    br#"{"type":13,"allspace":16384,"freespace":13892,"devname":"BeamBox","size":"64x32","brand":1}"#.to_vec()
}

fn error_sentinel_notification() -> Vec<u8> {
    b"1111111111".to_vec()
}

/// Fixture-driven fake transport (spec §6's `Transport` capability).
pub struct FakeBackend {
    has_devices: bool,
    send_device_status: bool,
    error_after_first_data_chunk: bool,
    written_frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FakeBackend {
    /// A fixture with one matching device that reports a device-status
    /// notification shortly after subscription.
    #[must_use]
    pub fn with_default_device() -> Self {
        Self {
            has_devices: true,
            send_device_status: true,
            error_after_first_data_chunk: false,
            written_frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A fixture with a matching device that raises the `"1111111111"`
    /// error sentinel immediately after the first streamed data chunk.
    #[must_use]
    pub fn with_error_after_first_chunk() -> Self {
        Self {
            has_devices: true,
            send_device_status: true,
            error_after_first_data_chunk: true,
            written_frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A fixture with no advertising devices, to exercise scan-timeout paths.
    #[must_use]
    pub fn with_no_devices() -> Self {
        Self {
            has_devices: false,
            send_device_status: false,
            error_after_first_data_chunk: false,
            written_frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns every frame written to the write characteristic, in order.
    #[must_use]
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.written_frames.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn power_state(&self) -> PowerState {
        PowerState::PoweredOn
    }

    async fn scan_start(&self, _filter: ScanFilter) -> Result<(), TransportError> {
        Ok(())
    }

    async fn scan_stop(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn scan_events(&self) -> BoxStream<DiscoveredPeripheral> {
        let devices = if self.has_devices {
            vec![DiscoveredPeripheral {
                name: Some(FIXTURE_NAME.to_string()),
                address: FIXTURE_ADDRESS.to_string(),
            }]
        } else {
            Vec::new()
        };
        Box::pin(tokio_stream::iter(devices))
    }

    async fn connect(&self, address: &str) -> Result<PeripheralHandle, TransportError> {
        if address != FIXTURE_ADDRESS {
            return Err(TransportError::ConnectFailed {
                reason: format!("no fixture device at `{address}`"),
            });
        }
        Ok(PeripheralHandle::new(address))
    }

    async fn discover(
        &self,
        _peripheral: &PeripheralHandle,
    ) -> Result<Vec<ServiceDescriptor>, TransportError> {
        Ok(vec![ServiceDescriptor {
            uuid: "0000fee9-0000-1000-8000-00805f9b34fb".to_string(),
            characteristics: vec![
                CharacteristicDescriptor {
                    uuid: format!("0000{}-0000-1000-8000-00805f9b34fb", default_write_uuid_normalized()),
                    properties: vec!["write_without_response".to_string()],
                },
                CharacteristicDescriptor {
                    uuid: format!("0000{}-0000-1000-8000-00805f9b34fb", default_notify_uuid_normalized()),
                    properties: vec!["notify".to_string()],
                },
            ],
        }])
    }

    async fn write(
        &self,
        _peripheral: &PeripheralHandle,
        _characteristic_uuid: &str,
        bytes: &[u8],
        _without_response: bool,
    ) -> Result<(), TransportError> {
        self.written_frames.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    fn subscribe(
        &self,
        _peripheral: &PeripheralHandle,
        _characteristic_uuid: &str,
    ) -> Result<BoxStream<Vec<u8>>, TransportError> {
        let (sender, receiver) = mpsc::unbounded_channel();

        if self.send_device_status {
            let sender = sender.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                let _ = sender.send(device_status_notification());
            });
        }

        if self.error_after_first_data_chunk {
            let sender = sender.clone();
            let poll_interval = std::time::Duration::from_millis(1);
            let written_frames = Arc::clone(&self.written_frames);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(poll_interval).await;
                    let has_data_chunk = written_frames.lock().unwrap().iter().any(|frame| {
                        Framer::verify(frame)
                            .map(|decoded| {
                                decoded.subtype() == PacketType::Image.as_u8()
                                    && !(decoded.total() == 0 && decoded.remaining() == 0)
                            })
                            .unwrap_or(false)
                    });
                    if has_data_chunk {
                        let _ = sender.send(error_sentinel_notification());
                        break;
                    }
                }
            });
        }

        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }

    async fn disconnect(&self, _peripheral: &PeripheralHandle) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::ScanFilter;

    #[tokio::test]
    async fn scan_events_yields_fixture_device() {
        let backend = FakeBackend::with_default_device();
        backend
            .scan_start(ScanFilter::default())
            .await
            .expect("scan should start");
        let mut events = backend.scan_events();
        let first = tokio_stream::StreamExt::next(&mut events).await;
        assert_eq!(Some(FIXTURE_ADDRESS.to_string()), first.map(|event| event.address));
    }

    #[tokio::test]
    async fn connect_rejects_unknown_address() {
        let backend = FakeBackend::with_default_device();
        let result = backend.connect("00:00:00:00:00:00").await;
        assert!(result.is_err());
    }
}
