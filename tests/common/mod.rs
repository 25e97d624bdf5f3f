// Shared helpers for integration tests
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use telemetry_sync::application::aggregator::AggregatorService;
use telemetry_sync::presentation::app_state::{AggregatorState, EmitterState};
use telemetry_sync::presentation::routes::{aggregator_router, emitter_router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const FAST_INTERVAL: Duration = Duration::from_millis(30);

/// Bind an emitter on an ephemeral port and serve it until `shutdown` resolves.
pub async fn spawn_emitter_with_shutdown<F>(
    interval: Duration,
    shutdown: F,
) -> (SocketAddr, JoinHandle<std::io::Result<()>>)
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = emitter_router(Arc::new(EmitterState {
        emit_interval: interval,
    }));

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    });

    (addr, handle)
}

pub async fn spawn_emitter(interval: Duration) -> SocketAddr {
    spawn_emitter_with_shutdown(interval, std::future::pending()).await.0
}

pub async fn spawn_aggregator(aggregator: Arc<AggregatorService>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = aggregator_router(Arc::new(AggregatorState { aggregator }));

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
