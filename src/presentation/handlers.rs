// HTTP request handlers
use crate::application::aggregator::ProcessedSnapshot;
use crate::application::emitter::ReadingFeed;
use crate::infrastructure::event_stream::event_stream_response;
use crate::presentation::app_state::{AggregatorState, EmitterState};
use axum::{
    Json,
    extract::{ConnectInfo, State},
    response::IntoResponse,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Open a reading feed for this connection and stream it until the peer leaves
pub async fn stream_readings(
    State(state): State<Arc<EmitterState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> impl IntoResponse {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let feed = ReadingFeed::new(peer, state.emit_interval);
    event_stream_response(feed.into_events())
}

pub async fn aggregator_root() -> Json<Value> {
    Json(json!({
        "message": "Sliding window aggregator is running. Use /processed to get data."
    }))
}

/// Latest reading plus sliding-window averages
pub async fn processed(State(state): State<Arc<AggregatorState>>) -> Json<ProcessedSnapshot> {
    Json(state.aggregator.processed())
}
