// Push emitter - one synthetic reading feed per open connection
use crate::domain::reading::Reading;
use axum::response::sse::Event;
use chrono::Utc;
use futures::stream::Stream;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

pub const EMIT_INTERVAL: Duration = Duration::from_millis(5000);

/// Per-connection emitter state: timer, id counter and RNG.
///
/// Nothing here is shared with other connections. Dropping the feed (which
/// happens when the response body is dropped on disconnect) stops the timer
/// and releases everything it owns.
pub struct ReadingFeed {
    peer: String,
    next_id: u64,
    interval: Interval,
    rng: StdRng,
}

impl ReadingFeed {
    pub fn new(peer: impl Into<String>, period: Duration) -> Self {
        let peer = peer.into();
        // First reading one full period after connect, then every period.
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(peer = %peer, period_ms = period.as_millis() as u64, "Stream connection opened");

        Self {
            peer,
            next_id: 0,
            interval,
            rng: StdRng::from_entropy(),
        }
    }

    /// Wait for the next tick and manufacture one reading.
    pub async fn next_reading(&mut self) -> Reading {
        self.interval.tick().await;
        let reading = Reading::synthesize(self.next_id, Utc::now(), &mut self.rng);
        self.next_id += 1;
        reading
    }

    /// Turn the feed into an unbounded stream of `data: <json>` events.
    pub fn into_events(self) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
        async_stream::stream! {
            let mut feed = self;
            loop {
                let reading = feed.next_reading().await;
                match Event::default().json_data(&reading) {
                    Ok(event) => {
                        tracing::debug!(peer = %feed.peer, id = reading.id, "Emitting reading");
                        yield Ok::<Event, Infallible>(event);
                    }
                    Err(e) => {
                        tracing::warn!(peer = %feed.peer, id = reading.id, "Skipping unencodable reading: {}", e);
                    }
                }
            }
        }
    }
}

impl Drop for ReadingFeed {
    fn drop(&mut self) {
        tracing::info!(peer = %self.peer, emitted = self.next_id, "Stream connection closed, feed released");
    }
}
