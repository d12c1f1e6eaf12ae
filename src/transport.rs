//! The `Transport` capability (spec §6): the narrow seam between the
//! protocol core and whatever BLE stack the environment supplies.

use std::pin::Pin;

use async_trait::async_trait;
use thiserror::Error;
use tokio_stream::Stream;

/// Adapter power state, as reported by the transport.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PowerState {
    /// The adapter is on and available.
    PoweredOn,
    /// The adapter is present but switched off.
    PoweredOff,
    /// The host has no usable adapter.
    Unsupported,
    /// The process is not permitted to use the adapter.
    Unauthorized,
}

/// Filter applied while scanning for a peripheral.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ScanFilter {
    /// Match an exact backend address, if known.
    pub address: Option<String>,
    /// Match peripherals whose advertised local name contains this fragment
    /// (case-insensitively).
    pub name_fragment: Option<String>,
}

/// One peripheral observed during scanning.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DiscoveredPeripheral {
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Backend-specific address used to `connect`.
    pub address: String,
}

/// An opaque handle to a connected peripheral.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PeripheralHandle {
    address: String,
}

impl PeripheralHandle {
    /// Wraps a backend address as a peripheral handle.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Returns the backend address this handle refers to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// A discovered characteristic and its supported operations.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CharacteristicDescriptor {
    /// Raw, backend-supplied UUID (any form; compare via [`crate::protocol::normalize_uuid`]).
    pub uuid: String,
    /// Backend-reported property labels, e.g. `"write"`, `"notify"`.
    pub properties: Vec<String>,
}

/// A discovered GATT service and its characteristics.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServiceDescriptor {
    /// Raw, backend-supplied service UUID.
    pub uuid: String,
    /// Characteristics discovered under this service.
    pub characteristics: Vec<CharacteristicDescriptor>,
}

/// A boxed, pinned stream of items, the shape used for scan events and
/// notification streams.
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Errors a transport implementation may raise.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TransportError {
    /// The adapter is not usable (off, missing, or unauthorized).
    #[error("adapter is not usable")]
    AdapterUnavailable,
    /// `connect` failed.
    #[error("connect failed: {reason}")]
    ConnectFailed { reason: String },
    /// `discover` failed.
    #[error("service discovery failed: {reason}")]
    DiscoverFailed { reason: String },
    /// `write` failed.
    #[error("write failed: {reason}")]
    WriteFailed { reason: String },
    /// `subscribe` failed.
    #[error("subscribe failed: {reason}")]
    SubscribeFailed { reason: String },
    /// The named peripheral was not currently connected.
    #[error("peripheral `{address}` is not connected")]
    NotConnected { address: String },
}

/// The narrow BLE capability the upload engine consumes (spec §6).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the adapter's current power state.
    async fn power_state(&self) -> PowerState;

    /// Begins scanning for peripherals matching `filter`.
    async fn scan_start(&self, filter: ScanFilter) -> Result<(), TransportError>;

    /// Stops an in-progress scan.
    async fn scan_stop(&self) -> Result<(), TransportError>;

    /// Returns a stream of peripherals observed since `scan_start`.
    fn scan_events(&self) -> BoxStream<DiscoveredPeripheral>;

    /// Connects to the peripheral at `address`.
    async fn connect(&self, address: &str) -> Result<PeripheralHandle, TransportError>;

    /// Discovers services and characteristics on a connected peripheral.
    async fn discover(
        &self,
        peripheral: &PeripheralHandle,
    ) -> Result<Vec<ServiceDescriptor>, TransportError>;

    /// Writes `bytes` to a characteristic. `without_response` selects
    /// write-without-response when `true`.
    async fn write(
        &self,
        peripheral: &PeripheralHandle,
        characteristic_uuid: &str,
        bytes: &[u8],
        without_response: bool,
    ) -> Result<(), TransportError>;

    /// Subscribes to a characteristic's notifications.
    fn subscribe(
        &self,
        peripheral: &PeripheralHandle,
        characteristic_uuid: &str,
    ) -> Result<BoxStream<Vec<u8>>, TransportError>;

    /// Disconnects from a peripheral. Safe to call more than once.
    async fn disconnect(&self, peripheral: &PeripheralHandle) -> Result<(), TransportError>;
}
