mod cli;
mod engine;
mod error;
mod frame;
mod hw;
mod imb;
mod payload;
mod protocol;
mod response;
mod telemetry;
mod transport;
mod xv4;

pub use cli::{run, Args, Command};
pub use engine::{DeviceState, EngineConfig, NotificationLogEntry, ProgressCallback, UploadEngine};
pub use error::{CliError, UploadError};
pub use frame::{DecodedFrame, FrameError, Framer};
pub use hw::{BtleplugBackend, FakeBackend};
pub use imb::{ImbBuilder, ImbError};
pub use payload::{PayloadComposer, PayloadError};
pub use protocol::PacketType;
pub use response::{DeviceStatus, ParsedResponse, ResponseParser, StatusTag};
pub use transport::{
    BoxStream, CharacteristicDescriptor, DiscoveredPeripheral, PeripheralHandle, PowerState,
    ScanFilter, ServiceDescriptor, Transport, TransportError,
};
pub use xv4::{AnimationFrame, XvFourBuilder, XvFourError};
