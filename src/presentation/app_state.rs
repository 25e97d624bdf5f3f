// Application state for HTTP handlers
use crate::application::aggregator::AggregatorService;
use std::sync::Arc;
use std::time::Duration;

/// Emitter state. Holds configuration only; every connection builds its
/// own feed, so there is nothing mutable to share.
#[derive(Clone)]
pub struct EmitterState {
    pub emit_interval: Duration,
}

#[derive(Clone)]
pub struct AggregatorState {
    pub aggregator: Arc<AggregatorService>,
}
