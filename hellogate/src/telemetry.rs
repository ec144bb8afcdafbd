//! Tracing subscriber setup shared by the server and the client binaries.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from `log.level` in the config file.
//! Output is plain text by default; `log.format: json` emits one JSON object per event and
//! `log.format: pretty` the multi-line human format.

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_telemetry(config: &LogConfig) -> anyhow::Result<()> {
    let env_filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init()?,
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init()?,
    }

    info!(format = ?config.format, "Telemetry initialized");
    Ok(())
}

fn build_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.level)?),
    }
}
