// Source traits for the two inbound channels
use crate::domain::display::AggregateSample;
use crate::error::SyncError;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Decoded event payloads from a push subscription. An `Err` item means
/// the transport failed and the stream should be treated as finished.
pub type FrameStream = BoxStream<'static, Result<String, SyncError>>;

#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Open a persistent subscription and return its frames as they arrive
    async fn open(&self) -> Result<FrameStream, SyncError>;
}

#[async_trait]
pub trait AggregateSource: Send + Sync {
    /// Fetch the current aggregate once
    async fn fetch(&self) -> Result<AggregateSample, SyncError>;
}
