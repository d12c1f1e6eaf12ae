use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Command-line options for the e-Badge upload tool.
#[derive(Debug, Parser)]
#[command(name = "idm", about = "Upload images and animations to a beambox e-Badge Pulse.")]
pub struct Args {
    /// Uses the fake in-memory backend instead of real Bluetooth hardware.
    #[arg(long, global = true)]
    pub(crate) fake: bool,
    /// Payload bytes per frame.
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,
    /// Delay between successive data-chunk writes.
    #[arg(long, global = true, value_parser = parse_duration)]
    pub chunk_delay: Option<Duration>,
    /// Delay between the info frame and the first data chunk.
    #[arg(long, global = true, value_parser = parse_duration)]
    pub image_info_delay: Option<Duration>,
    /// How long to scan before giving up.
    #[arg(long, global = true, value_parser = parse_duration)]
    pub scan_timeout: Option<Duration>,
    /// How long to wait for the first device-status notification after subscribing.
    #[arg(long, global = true, value_parser = parse_duration)]
    pub await_status_timeout: Option<Duration>,
    /// How long to wait for a terminal notification after the last chunk is written.
    #[arg(long, global = true, value_parser = parse_duration)]
    pub finalize_timeout: Option<Duration>,
    /// Default wait used by a standalone status query.
    #[arg(long, global = true, value_parser = parse_duration)]
    pub status_query_timeout: Option<Duration>,
    /// Maximum accepted composed-payload size in bytes.
    #[arg(long, global = true)]
    pub max_payload_size: Option<usize>,
    /// Maximum accepted packet count for one transfer.
    #[arg(long, global = true)]
    pub max_packet_count: Option<usize>,
    /// Advertised local-name fragment used to identify the device while scanning.
    #[arg(long, global = true)]
    pub device_name: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Uploads a single JPEG as a static image.
    UploadImage(UploadImageArgs),
    /// Uploads an ordered sequence of JPEGs as an animation.
    UploadAnimation(UploadAnimationArgs),
    /// Connects and prints the device's status and negotiated endpoints.
    Inspect(InspectArgs),
}

impl Command {
    pub(crate) fn address(&self) -> Option<String> {
        match self {
            Self::UploadImage(args) => args.address.clone(),
            Self::UploadAnimation(args) => args.address.clone(),
            Self::Inspect(args) => args.address.clone(),
        }
    }
}

/// Arguments for the `upload-image` command.
#[derive(Debug, ClapArgs)]
pub struct UploadImageArgs {
    /// Path to a JPEG file.
    pub path: PathBuf,
    /// Panel width, in pixels.
    #[arg(long)]
    pub width: u16,
    /// Panel height, in pixels.
    #[arg(long)]
    pub height: u16,
    /// Connect to a specific Bluetooth address instead of scanning by name.
    #[arg(long)]
    pub address: Option<String>,
}

/// Arguments for the `upload-animation` command.
#[derive(Debug, ClapArgs)]
pub struct UploadAnimationArgs {
    /// Paths to JPEG files, in playback order.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    /// Panel width, in pixels.
    #[arg(long)]
    pub width: u16,
    /// Panel height, in pixels.
    #[arg(long)]
    pub height: u16,
    /// Per-frame interval in milliseconds, clamped to the device's 50-99 ms range.
    #[arg(long, default_value_t = 99)]
    pub interval_ms: u32,
    /// Connect to a specific Bluetooth address instead of scanning by name.
    #[arg(long)]
    pub address: Option<String>,
}

/// Arguments for the `inspect` command.
#[derive(Debug, ClapArgs)]
pub struct InspectArgs {
    /// Connect to a specific Bluetooth address instead of scanning by name.
    #[arg(long)]
    pub address: Option<String>,
}
