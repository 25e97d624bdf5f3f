use crate::application::aggregator::RECONNECT_DELAY;
use crate::application::buffer::POLL_INTERVAL;
use crate::application::emitter::EMIT_INTERVAL;
use crate::domain::window::AGGREGATE_WINDOW;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

/// Optional config file, relative to the working directory, any format the
/// `config` crate understands.
pub const CONFIG_FILE: &str = "config/telemetry";

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Listen port of the push emitter
    pub port: u16,
    /// Listen port of the aggregator service
    pub aggregate_port: u16,
    pub emit_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub reconnect_delay_ms: u64,
    pub window_size: usize,
    pub stream_url: String,
    pub aggregate_url: String,
}

impl SyncConfig {
    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Load configuration: defaults, then `config/telemetry.*`, then
/// `TELEMETRY_*` environment variables, then `PORT`.
pub fn load_sync_config() -> anyhow::Result<SyncConfig> {
    build_sync_config(
        Some(CONFIG_FILE),
        config::Environment::with_prefix("TELEMETRY"),
        std::env::var("PORT").ok(),
    )
}

pub fn build_sync_config(
    file: Option<&str>,
    environment: config::Environment,
    port_override: Option<String>,
) -> anyhow::Result<SyncConfig> {
    let mut builder = config::Config::builder()
        .set_default("port", 3000)?
        .set_default("aggregate_port", 8000)?
        .set_default("emit_interval_ms", EMIT_INTERVAL.as_millis() as i64)?
        .set_default("poll_interval_ms", POLL_INTERVAL.as_millis() as i64)?
        .set_default("reconnect_delay_ms", RECONNECT_DELAY.as_millis() as i64)?
        .set_default("window_size", AGGREGATE_WINDOW as i64)?
        .set_default("stream_url", "http://localhost:3000/stream")?
        .set_default("aggregate_url", "http://localhost:8000/processed")?;

    if let Some(file) = file {
        builder = builder.add_source(config::File::with_name(file).required(false));
    }

    let settings = builder
        .add_source(environment)
        .set_override_option("port", port_override)?
        .build()
        .context("Failed to build configuration")?;

    settings
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
