// Routers for the emitter and aggregator services
use crate::presentation::app_state::{AggregatorState, EmitterState};
use crate::presentation::handlers::{aggregator_root, health_check, processed, stream_readings};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn emitter_router(state: Arc<EmitterState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/stream", get(stream_readings))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn aggregator_router(state: Arc<AggregatorState>) -> Router {
    Router::new()
        .route("/", get(aggregator_root))
        .route("/processed", get(processed))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
