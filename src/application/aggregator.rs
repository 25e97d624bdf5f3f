// Aggregator service - consumes the push stream and keeps sliding-window averages
use crate::application::sources::ReadingSource;
use crate::domain::reading::Reading;
use crate::domain::window::SlidingWindow;
use crate::error::SyncError;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default pause before the consumer reopens a failed stream.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Body served on the pull endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessedSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<Reading>,
    pub avg_temp: f64,
    pub avg_hum: f64,
}

#[derive(Default)]
struct AggregatorInner {
    window: SlidingWindow,
    processed: ProcessedSnapshot,
}

#[derive(Default)]
pub struct AggregatorService {
    inner: Mutex<AggregatorInner>,
}

impl AggregatorService {
    pub fn new(window_size: usize) -> Self {
        Self {
            inner: Mutex::new(AggregatorInner {
                window: SlidingWindow::new(window_size),
                processed: ProcessedSnapshot::default(),
            }),
        }
    }

    /// Fold one reading into the window and return the new averages.
    pub fn record(&self, reading: Reading) -> Result<ProcessedSnapshot, SyncError> {
        let temperature = reading.temperature_value()?;
        let humidity = reading.humidity_value()?;

        let mut inner = self.inner.lock();
        let sample = inner.window.push(temperature, humidity);
        inner.processed = ProcessedSnapshot {
            latest: Some(reading),
            avg_temp: sample.avg_temp,
            avg_hum: sample.avg_hum,
        };

        tracing::info!(
            "Processed: Temp={}°C, Hum={}% | Avg Temp={}°C, Avg Hum={}% | Window size={}",
            temperature,
            humidity,
            sample.avg_temp,
            sample.avg_hum,
            inner.window.len()
        );

        Ok(inner.processed.clone())
    }

    pub fn processed(&self) -> ProcessedSnapshot {
        self.inner.lock().processed.clone()
    }

    /// Consume `source` until `shutdown` fires, reconnecting after
    /// `reconnect_delay` whenever the stream fails or ends.
    pub async fn run_consumer(
        self: Arc<Self>,
        source: Arc<dyn ReadingSource>,
        reconnect_delay: Duration,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.consume_once(source.as_ref()) => {
                    if let Err(e) = result {
                        tracing::error!("Stream connection error: {}", e);
                    }
                }
            }

            tracing::info!(delay_ms = reconnect_delay.as_millis() as u64, "Reconnecting to stream");
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(reconnect_delay) => {}
            }
        }
        tracing::info!("Aggregator consumer stopped");
    }

    async fn consume_once(&self, source: &dyn ReadingSource) -> Result<(), SyncError> {
        let mut frames = source.open().await?;
        tracing::info!("Connected to stream");

        while let Some(frame) = frames.next().await {
            let frame = frame?;
            match Reading::from_json(&frame).and_then(|reading| self.record(reading)) {
                Ok(_) => {}
                Err(e) => tracing::warn!("Discarding malformed stream frame: {}", e),
            }
        }

        Err(SyncError::Transport("stream ended".to_string()))
    }
}
