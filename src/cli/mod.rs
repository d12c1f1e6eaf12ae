mod command;

pub use self::command::{Args, Command};

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::engine::{EngineConfig, UploadEngine};
use crate::error::CliError;
use crate::hw::FakeBackend;
use crate::transport::Transport;
use crate::xv4::AnimationFrame;

/// Runs the CLI with already-parsed arguments.
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, a source file cannot be
/// read, or the upload itself fails.
pub async fn run<W>(args: Args, out: &mut W) -> Result<()>
where
    W: io::Write,
{
    crate::telemetry::initialise_tracing().map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let transport: Arc<dyn Transport> = if args.fake {
        Arc::new(FakeBackend::with_default_device())
    } else {
        Arc::new(crate::hw::btleplug_backend::BtleplugBackend::new().await?)
    };
    let config = EngineConfig::builder()
        .maybe_chunk_size(args.chunk_size)
        .maybe_chunk_delay(args.chunk_delay)
        .maybe_image_info_delay(args.image_info_delay)
        .maybe_scan_timeout(args.scan_timeout)
        .maybe_await_status_timeout(args.await_status_timeout)
        .maybe_finalize_timeout(args.finalize_timeout)
        .maybe_status_query_timeout(args.status_query_timeout)
        .maybe_max_payload_size(args.max_payload_size)
        .maybe_max_packet_count(args.max_packet_count)
        .maybe_device_name_fragment(args.device_name)
        .build();
    let engine = UploadEngine::new(transport, config);
    let address = args.command.address();
    engine.connect(address.as_deref()).await?;

    match args.command {
        Command::UploadImage(upload) => {
            let jpeg = read_jpeg(&upload.path)?;
            engine
                .upload_image(&jpeg, (upload.width, upload.height), None)
                .await?;
            writeln!(out, "uploaded {}", upload.path.display())?;
        }
        Command::UploadAnimation(upload) => {
            let jpegs: Result<Vec<Vec<u8>>, CliError> =
                upload.paths.iter().map(|path| read_jpeg(path)).collect();
            let jpegs = jpegs?;
            let names: Vec<String> = (0..jpegs.len()).map(|index| format!("frame_{index:05}")).collect();
            let frames: Vec<AnimationFrame<'_>> = names
                .iter()
                .zip(jpegs.iter())
                .map(|(name, jpeg)| AnimationFrame::new(name, jpeg))
                .collect();
            engine
                .upload_animation(&frames, upload.interval_ms, (upload.width, upload.height), None)
                .await?;
            writeln!(out, "uploaded {} animation frames", jpegs.len())?;
        }
        Command::Inspect(_) => {
            let (status, log) = engine.query_status(std::time::Duration::from_secs(5)).await?;
            info!(?status, notifications = log.len(), "device status");
            writeln!(out, "{status:#?}")?;
        }
    }

    engine.disconnect().await?;
    Ok(())
}

fn read_jpeg(path: &Path) -> Result<Vec<u8>, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() < 2 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return Err(CliError::NotAJpeg {
            path: path.to_path_buf(),
        });
    }
    Ok(bytes)
}
