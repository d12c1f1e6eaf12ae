use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;

static TRACING_INITIALISED: OnceLock<Result<(), TelemetryError>> = OnceLock::new();

/// Initialises structured logging, defaulting to `warn` when `RUST_LOG` is unset.
pub(crate) fn initialise_tracing() -> Result<(), &'static TelemetryError> {
    match TRACING_INITIALISED.get_or_init(initialise_tracing_once) {
        Ok(()) => Ok(()),
        Err(error) => Err(error),
    }
}

fn initialise_tracing_once() -> Result<(), TelemetryError> {
    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(log_filter),
        )
        .try_init()?;

    Ok(())
}
