// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use telemetry_sync::application::aggregator::AggregatorService;
use telemetry_sync::application::buffer::DualSourceBuffer;
use telemetry_sync::cli::{Cli, Commands};
use telemetry_sync::infrastructure::config::{SyncConfig, load_sync_config};
use telemetry_sync::infrastructure::http_sources::{HttpAggregateSource, HttpReadingSource};
use telemetry_sync::presentation::app_state::{AggregatorState, EmitterState};
use telemetry_sync::presentation::renderer::render_until;
use telemetry_sync::presentation::routes::{aggregator_router, emitter_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telemetry_sync=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = load_sync_config()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve_emitter(config).await,
        Commands::Aggregate => serve_aggregator(config).await,
        Commands::Watch {
            stream_url,
            aggregate_url,
        } => {
            let stream_url = stream_url.unwrap_or_else(|| config.stream_url.clone());
            let aggregate_url = aggregate_url.unwrap_or_else(|| config.aggregate_url.clone());
            watch(config, stream_url, aggregate_url).await
        }
    }
}

async fn serve_emitter(config: SyncConfig) -> anyhow::Result<()> {
    let state = Arc::new(EmitterState {
        emit_interval: config.emit_interval(),
    });
    let router = emitter_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Streaming API running on http://{}/stream", addr);

    // Open streams never finish, so there is no graceful drain: Ctrl-C
    // drops the server and every connection with it.
    tokio::select! {
        result = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()) => {
            result.context("Emitter server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down emitter");
        }
    }

    Ok(())
}

async fn serve_aggregator(config: SyncConfig) -> anyhow::Result<()> {
    let aggregator = Arc::new(AggregatorService::new(config.window_size));
    let shutdown = CancellationToken::new();

    let consumer = tokio::spawn(aggregator.clone().run_consumer(
        Arc::new(HttpReadingSource::new(config.stream_url.clone())),
        config.reconnect_delay(),
        shutdown.clone(),
    ));

    let router = aggregator_router(Arc::new(AggregatorState { aggregator }));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.aggregate_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        "Aggregator running on http://{}/processed, consuming {}",
        addr,
        config.stream_url
    );

    let signal = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            signal.cancel();
        })
        .await
        .context("Aggregator server failed")?;

    shutdown.cancel();
    consumer.await.context("Aggregator consumer panicked")?;
    Ok(())
}

async fn watch(config: SyncConfig, stream_url: String, aggregate_url: String) -> anyhow::Result<()> {
    tracing::info!("Watching raw stream {} and aggregate {}", stream_url, aggregate_url);

    let buffer = DualSourceBuffer::new();
    buffer.subscribe_raw(Arc::new(HttpReadingSource::new(stream_url)));
    buffer.subscribe_sliding(
        Arc::new(HttpAggregateSource::new(aggregate_url)),
        config.poll_interval(),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        signal.cancel();
    });

    render_until(&buffer, shutdown).await;
    tracing::info!("Buffer torn down");
    Ok(())
}
