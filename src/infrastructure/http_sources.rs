// HTTP implementations of the push and pull sources
use crate::application::sources::{AggregateSource, FrameStream, ReadingSource};
use crate::domain::display::AggregateSample;
use crate::error::SyncError;
use crate::infrastructure::event_stream::EVENT_STREAM;
use crate::infrastructure::sse_decoder::SseDecoder;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header;

/// Subscribes to a remote `text/event-stream` endpoint.
#[derive(Debug, Clone)]
pub struct HttpReadingSource {
    client: reqwest::Client,
    url: String,
}

impl HttpReadingSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ReadingSource for HttpReadingSource {
    async fn open(&self) -> Result<FrameStream, SyncError> {
        tracing::debug!("Opening event stream at {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .header(header::ACCEPT, EVENT_STREAM)
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("failed to connect to {}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Transport(format!(
                "stream endpoint {} returned {}",
                self.url,
                response.status()
            )));
        }

        let mut chunks = Box::pin(response.bytes_stream());
        let frames = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) => {
                        for frame in decoder.push(&chunk) {
                            yield Ok(frame);
                        }
                    }
                    Err(e) => {
                        yield Err(SyncError::Transport(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(frames.boxed())
    }
}

/// Polls a JSON endpoint returning `{avg_temp, avg_hum}`.
#[derive(Debug, Clone)]
pub struct HttpAggregateSource {
    client: reqwest::Client,
    url: String,
}

impl HttpAggregateSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl AggregateSource for HttpAggregateSource {
    async fn fetch(&self) -> Result<AggregateSample, SyncError> {
        let response = self
            .client
            .get(&self.url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::Request(format!("failed to reach {}: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Request(format!(
                "aggregate endpoint {} returned {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Request(format!("failed to read aggregate body: {}", e)))?;

        Ok(serde_json::from_str(&body)?)
    }
}
