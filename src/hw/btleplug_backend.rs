//! A `btleplug`-based [`Transport`] talking to real Bluetooth hardware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, CharPropFlags, Characteristic, Manager as _,
    Peripheral as _, ScanFilter as BtScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::transport::{
    BoxStream, CharacteristicDescriptor, DiscoveredPeripheral, PeripheralHandle, PowerState,
    ScanFilter, ServiceDescriptor, Transport, TransportError,
};

/// A `btleplug`-based [`Transport`] bound to the host's first BLE adapter.
///
/// Only one adapter is supported; a controller talking to a single e-Badge
/// has no use for adapter selection.
pub struct BtleplugBackend {
    adapter: Adapter,
    peripherals: Arc<Mutex<HashMap<String, Peripheral>>>,
    characteristics: Arc<Mutex<HashMap<String, HashMap<String, Characteristic>>>>,
}

impl BtleplugBackend {
    /// Creates the real BLE backend, using the host's first adapter.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AdapterUnavailable`] if no adapter is present.
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|_| TransportError::AdapterUnavailable)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|_| TransportError::AdapterUnavailable)?
            .into_iter()
            .next()
            .ok_or(TransportError::AdapterUnavailable)?;
        Ok(Self {
            adapter,
            peripherals: Arc::new(Mutex::new(HashMap::new())),
            characteristics: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn peripheral_for(&self, handle: &PeripheralHandle) -> Result<Peripheral, TransportError> {
        self.peripherals
            .lock()
            .unwrap()
            .get(handle.address())
            .cloned()
            .ok_or_else(|| TransportError::NotConnected {
                address: handle.address().to_string(),
            })
    }

    fn characteristic_for(
        &self,
        handle: &PeripheralHandle,
        uuid: &str,
    ) -> Result<Characteristic, TransportError> {
        self.characteristics
            .lock()
            .unwrap()
            .get(handle.address())
            .and_then(|by_uuid| by_uuid.get(&uuid.to_lowercase()))
            .cloned()
            .ok_or_else(|| TransportError::NotConnected {
                address: handle.address().to_string(),
            })
    }
}

#[async_trait]
impl Transport for BtleplugBackend {
    async fn power_state(&self) -> PowerState {
        match self.adapter.adapter_state().await {
            Ok(CentralState::PoweredOn) => PowerState::PoweredOn,
            Ok(CentralState::PoweredOff) => PowerState::PoweredOff,
            Ok(CentralState::Unknown) | Err(_) => PowerState::Unsupported,
        }
    }

    async fn scan_start(&self, _filter: ScanFilter) -> Result<(), TransportError> {
        self.adapter
            .start_scan(BtScanFilter::default())
            .await
            .map_err(|_| TransportError::AdapterUnavailable)
    }

    async fn scan_stop(&self) -> Result<(), TransportError> {
        self.adapter
            .stop_scan()
            .await
            .map_err(|_| TransportError::AdapterUnavailable)
    }

    fn scan_events(&self) -> BoxStream<DiscoveredPeripheral> {
        let adapter = self.adapter.clone();
        let peripherals = Arc::clone(&self.peripherals);
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let Ok(mut events) = adapter.events().await else {
                return;
            };
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let Ok(Some(properties)) = peripheral.properties().await else {
                    continue;
                };
                let address = peripheral.address().to_string();
                peripherals.lock().unwrap().insert(address.clone(), peripheral);
                let event = DiscoveredPeripheral {
                    name: properties.local_name,
                    address,
                };
                if sender.send(event).is_err() {
                    break;
                }
            }
        });

        Box::pin(UnboundedReceiverStream::new(receiver))
    }

    async fn connect(&self, address: &str) -> Result<PeripheralHandle, TransportError> {
        let peripheral = self
            .peripherals
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::ConnectFailed {
                reason: format!("no scanned peripheral at `{address}`"),
            })?;
        peripheral
            .connect()
            .await
            .map_err(|source| TransportError::ConnectFailed {
                reason: source.to_string(),
            })?;
        Ok(PeripheralHandle::new(address))
    }

    async fn discover(
        &self,
        handle: &PeripheralHandle,
    ) -> Result<Vec<ServiceDescriptor>, TransportError> {
        let peripheral = self.peripheral_for(handle)?;
        peripheral
            .discover_services()
            .await
            .map_err(|source| TransportError::DiscoverFailed {
                reason: source.to_string(),
            })?;

        let mut characteristics_by_uuid = HashMap::new();
        let services = peripheral
            .services()
            .into_iter()
            .map(|service| {
                let characteristics = service
                    .characteristics
                    .iter()
                    .map(|characteristic| {
                        let uuid = characteristic.uuid.to_string();
                        characteristics_by_uuid.insert(uuid.to_lowercase(), characteristic.clone());
                        CharacteristicDescriptor {
                            uuid,
                            properties: property_labels(characteristic.properties),
                        }
                    })
                    .collect();
                ServiceDescriptor {
                    uuid: service.uuid.to_string(),
                    characteristics,
                }
            })
            .collect();

        self.characteristics
            .lock()
            .unwrap()
            .insert(handle.address().to_string(), characteristics_by_uuid);
        Ok(services)
    }

    async fn write(
        &self,
        handle: &PeripheralHandle,
        characteristic_uuid: &str,
        bytes: &[u8],
        without_response: bool,
    ) -> Result<(), TransportError> {
        let peripheral = self.peripheral_for(handle)?;
        let characteristic = self.characteristic_for(handle, characteristic_uuid)?;
        let write_type = if without_response {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };
        peripheral
            .write(&characteristic, bytes, write_type)
            .await
            .map_err(|source| TransportError::WriteFailed {
                reason: source.to_string(),
            })
    }

    fn subscribe(
        &self,
        handle: &PeripheralHandle,
        characteristic_uuid: &str,
    ) -> Result<BoxStream<Vec<u8>>, TransportError> {
        let peripheral = self.peripheral_for(handle)?;
        let characteristic = self.characteristic_for(handle, characteristic_uuid)?;
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if peripheral.subscribe(&characteristic).await.is_err() {
                return;
            }
            let Ok(mut notifications) = peripheral.notifications().await else {
                return;
            };
            while let Some(notification) = notifications.next().await {
                if notification.uuid == characteristic.uuid && sender.send(notification.value).is_err() {
                    break;
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }

    async fn disconnect(&self, handle: &PeripheralHandle) -> Result<(), TransportError> {
        let peripheral = self.peripheral_for(handle)?;
        peripheral
            .disconnect()
            .await
            .map_err(|source| TransportError::WriteFailed {
                reason: source.to_string(),
            })
    }
}

fn property_labels(flags: CharPropFlags) -> Vec<String> {
    let mut labels = Vec::new();
    if flags.contains(CharPropFlags::READ) {
        labels.push("read".to_string());
    }
    if flags.contains(CharPropFlags::WRITE) {
        labels.push("write".to_string());
    }
    if flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        labels.push("write_without_response".to_string());
    }
    if flags.contains(CharPropFlags::NOTIFY) {
        labels.push("notify".to_string());
    }
    if flags.contains(CharPropFlags::INDICATE) {
        labels.push("indicate".to_string());
    }
    labels
}
