// Dual-source buffer - merges the push and pull channels into two display series
use crate::application::sources::{AggregateSource, ReadingSource};
use crate::domain::dashboard::DashboardSnapshot;
use crate::domain::display::{RawPoint, SlidingPoint, receipt_time};
use crate::domain::reading::Reading;
use crate::domain::series::BoundedSeries;
use crate::error::SyncError;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

/// Default period of the pull channel.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Lifecycle of one subscription. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Active,
    Closed,
}

/// Outcome of offering a point to a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Duplicate,
    /// The buffer was torn down; nothing is admitted any more.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Raw,
    Sliding,
}

struct BufferState {
    raw: BoundedSeries<RawPoint>,
    sliding: BoundedSeries<SlidingPoint>,
    raw_state: SubscriptionState,
    sliding_state: SubscriptionState,
    closed: bool,
}

impl BufferState {
    fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            raw: self.raw.to_vec(),
            sliding: self.sliding.to_vec(),
        }
    }

    fn state_mut(&mut self, channel: Channel) -> &mut SubscriptionState {
        match channel {
            Channel::Raw => &mut self.raw_state,
            Channel::Sliding => &mut self.sliding_state,
        }
    }
}

/// State shared between the owning buffer and its subscription tasks.
///
/// Every admission takes the lock and re-checks `closed`, so a result that
/// lands after teardown is dropped rather than admitted.
struct Shared {
    state: Mutex<BufferState>,
    updates: watch::Sender<DashboardSnapshot>,
}

impl Shared {
    fn admit_raw(&self, point: RawPoint) -> Admission {
        let mut state = self.state.lock();
        if state.closed {
            return Admission::Discarded;
        }
        if !state.raw.admit(point) {
            return Admission::Duplicate;
        }
        self.updates.send_replace(state.snapshot());
        Admission::Admitted
    }

    fn admit_sliding(&self, point: SlidingPoint) -> Admission {
        let mut state = self.state.lock();
        if state.closed {
            return Admission::Discarded;
        }
        if !state.sliding.admit(point) {
            return Admission::Duplicate;
        }
        self.updates.send_replace(state.snapshot());
        Admission::Admitted
    }

    /// Idle -> Active. Returns false if the channel was already used.
    fn activate(&self, channel: Channel) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        let current = state.state_mut(channel);
        if *current != SubscriptionState::Idle {
            return false;
        }
        *current = SubscriptionState::Active;
        true
    }

    fn mark_closed(&self, channel: Channel) {
        *self.state.lock().state_mut(channel) = SubscriptionState::Closed;
    }
}

/// Cancellable handle to one running subscription task.
pub struct SubscriptionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    /// Stop the subscription. Safe to call repeatedly.
    pub fn close(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owns the raw and sliding series for one display context.
///
/// Both series start empty. They are only changed by admissions from the
/// two subscriptions, and they are discarded with the buffer. Dropping the
/// buffer tears down both subscriptions.
pub struct DualSourceBuffer {
    shared: Arc<Shared>,
    raw: Mutex<Option<SubscriptionHandle>>,
    sliding: Mutex<Option<SubscriptionHandle>>,
}

impl DualSourceBuffer {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(DashboardSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BufferState {
                    raw: BoundedSeries::new(),
                    sliding: BoundedSeries::new(),
                    raw_state: SubscriptionState::Idle,
                    sliding_state: SubscriptionState::Idle,
                    closed: false,
                }),
                updates,
            }),
            raw: Mutex::new(None),
            sliding: Mutex::new(None),
        }
    }

    /// Start the push subscription. Returns false if it was already started
    /// or the buffer is closed.
    pub fn subscribe_raw(&self, source: Arc<dyn ReadingSource>) -> bool {
        if !self.shared.activate(Channel::Raw) {
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_raw(self.shared.clone(), source, cancel.clone()));
        *self.raw.lock() = Some(SubscriptionHandle { cancel, task });
        true
    }

    /// Start polling `source` every `period`. Returns false if polling was
    /// already started or the buffer is closed.
    pub fn subscribe_sliding(&self, source: Arc<dyn AggregateSource>, period: Duration) -> bool {
        if !self.shared.activate(Channel::Sliding) {
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_sliding(
            self.shared.clone(),
            source,
            period,
            cancel.clone(),
        ));
        *self.sliding.lock() = Some(SubscriptionHandle { cancel, task });
        true
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.shared.state.lock().snapshot()
    }

    /// Receiver that observes a fresh snapshot after every admission.
    pub fn updates(&self) -> watch::Receiver<DashboardSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn raw_state(&self) -> SubscriptionState {
        self.shared.state.lock().raw_state
    }

    pub fn sliding_state(&self) -> SubscriptionState {
        self.shared.state.lock().sliding_state
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Tear down both subscriptions. Once this returns no further point is
    /// admitted. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if !state.closed {
                tracing::debug!("Closing dual-source buffer");
            }
            state.closed = true;
            state.raw_state = SubscriptionState::Closed;
            state.sliding_state = SubscriptionState::Closed;
        }

        if let Some(handle) = self.raw.lock().as_ref() {
            handle.close();
        }
        if let Some(handle) = self.sliding.lock().as_ref() {
            handle.close();
        }
    }
}

impl Default for DualSourceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DualSourceBuffer {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_frame(frame: &str) -> Result<RawPoint, SyncError> {
    let reading = Reading::from_json(frame)?;
    RawPoint::from_reading(&reading, receipt_time())
}

async fn run_raw(shared: Arc<Shared>, source: Arc<dyn ReadingSource>, cancel: CancellationToken) {
    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = source.open() => opened,
    };

    let mut frames = match opened {
        Ok(frames) => frames,
        Err(e) => {
            tracing::error!("Raw subscription failed to open, closing: {}", e);
            shared.mark_closed(Channel::Raw);
            return;
        }
    };
    tracing::info!("Raw subscription active");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(frame)) => match parse_frame(&frame) {
                Ok(point) => {
                    if shared.admit_raw(point) == Admission::Discarded {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Discarding malformed stream frame: {}", e);
                }
            },
            Some(Err(e)) => {
                tracing::error!("Raw subscription transport error, closing: {}", e);
                break;
            }
            None => {
                tracing::info!("Raw stream ended, closing subscription");
                break;
            }
        }
    }

    shared.mark_closed(Channel::Raw);
}

// Pulls are serialised: the next tick is not awaited until the current
// request has settled or timed out, and late ticks are delayed rather than
// bunched.
async fn run_sliding(
    shared: Arc<Shared>,
    source: Arc<dyn AggregateSource>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(period_ms = period.as_millis() as u64, "Sliding subscription active");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // A pull that outlives its period counts as a failed tick.
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            fetched = tokio::time::timeout(period, source.fetch()) => fetched.unwrap_or_else(|_| {
                Err(SyncError::Request(format!(
                    "no aggregate response within {} ms",
                    period.as_millis()
                )))
            }),
        };

        match fetched {
            Ok(sample) => {
                let point = SlidingPoint::from_sample(&sample, receipt_time());
                if shared.admit_sliding(point) == Admission::Discarded {
                    tracing::debug!("Dropping aggregate that arrived after teardown");
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Skipping aggregate tick: {}", e);
            }
        }
    }

    shared.mark_closed(Channel::Sliding);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sources::FrameStream;
    use crate::domain::display::AggregateSample;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{Notify, mpsc};
    use tokio_stream::wrappers::ReceiverStream;

    const FAST: Duration = Duration::from_millis(10);

    fn frame(id: u64, temp: &str, hum: &str) -> String {
        format!(
            r#"{{"id":{},"timestamp":"2024-05-01T10:00:00.000Z","temperature":"{}","humidity":"{}"}}"#,
            id, temp, hum
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Push source fed from a channel; stays open until the sender drops.
    struct ChannelSource {
        rx: Mutex<Option<mpsc::Receiver<Result<String, SyncError>>>>,
    }

    impl ChannelSource {
        fn new() -> (mpsc::Sender<Result<String, SyncError>>, Arc<Self>) {
            let (tx, rx) = mpsc::channel(64);
            (tx, Arc::new(Self { rx: Mutex::new(Some(rx)) }))
        }
    }

    #[async_trait]
    impl ReadingSource for ChannelSource {
        async fn open(&self) -> Result<FrameStream, SyncError> {
            let rx = self
                .rx
                .lock()
                .take()
                .ok_or_else(|| SyncError::Transport("already opened".into()))?;
            Ok(ReceiverStream::new(rx).boxed())
        }
    }

    /// Pull source replaying scripted responses, repeating the last one.
    struct ScriptedAggregate {
        responses: Mutex<VecDeque<Result<AggregateSample, SyncError>>>,
        last: AggregateSample,
        calls: AtomicUsize,
    }

    impl ScriptedAggregate {
        fn new(responses: Vec<Result<AggregateSample, SyncError>>, last: AggregateSample) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                last,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AggregateSource for ScriptedAggregate {
        async fn fetch(&self) -> Result<AggregateSample, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.lock().pop_front() {
                Some(response) => response,
                None => Ok(self.last.clone()),
            }
        }
    }

    /// Pull source whose response is held until released.
    struct HeldAggregate {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl AggregateSource for HeldAggregate {
        async fn fetch(&self) -> Result<AggregateSample, SyncError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(AggregateSample { avg_temp: 25.0, avg_hum: 40.0 })
        }
    }

    /// Pull source whose first request never answers.
    struct StalledFirstAggregate {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AggregateSource for StalledFirstAggregate {
        async fn fetch(&self) -> Result<AggregateSample, SyncError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(AggregateSample { avg_temp: 26.0, avg_hum: 42.0 })
        }
    }

    fn sample(t: f64, h: f64) -> AggregateSample {
        AggregateSample { avg_temp: t, avg_hum: h }
    }

    #[tokio::test]
    async fn test_starts_idle_and_empty() {
        let buffer = DualSourceBuffer::new();
        assert_eq!(buffer.raw_state(), SubscriptionState::Idle);
        assert_eq!(buffer.sliding_state(), SubscriptionState::Idle);
        assert_eq!(buffer.snapshot(), DashboardSnapshot::default());
    }

    #[tokio::test]
    async fn test_keeps_last_twenty_raw_readings() {
        let (tx, source) = ChannelSource::new();
        let buffer = DualSourceBuffer::new();
        assert!(buffer.subscribe_raw(source));

        for i in 0..21u64 {
            let temp = format!("{}.00", 20 + i % 10);
            let hum = format!("{}.00", 30 + i);
            tx.send(Ok(frame(i, &temp, &hum))).await.unwrap();
        }

        wait_until(|| buffer.snapshot().raw.last().map(|p| p.humidity) == Some(50.0)).await;

        let raw = buffer.snapshot().raw;
        assert_eq!(raw.len(), 20);
        let hums: Vec<f64> = raw.iter().map(|p| p.humidity).collect();
        let expected: Vec<f64> = (1..21).map(|i| 30.0 + i as f64).collect();
        assert_eq!(hums, expected);
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_close_subscription() {
        let (tx, source) = ChannelSource::new();
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_raw(source);

        tx.send(Ok(frame(0, "21.00", "40.00"))).await.unwrap();
        tx.send(Ok("{not json".to_string())).await.unwrap();
        tx.send(Ok(frame(2, "22.00", "41.00"))).await.unwrap();

        wait_until(|| buffer.snapshot().raw.len() == 2).await;

        let raw = buffer.snapshot().raw;
        assert_eq!(raw[0].temp, 21.0);
        assert_eq!(raw[1].temp, 22.0);
        assert_eq!(buffer.raw_state(), SubscriptionState::Active);
    }

    #[tokio::test]
    async fn test_duplicate_raw_reading_admitted_once() {
        let (tx, source) = ChannelSource::new();
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_raw(source);

        tx.send(Ok(frame(0, "21.00", "40.00"))).await.unwrap();
        tx.send(Ok(frame(1, "21.00", "40.00"))).await.unwrap();
        tx.send(Ok(frame(2, "21.00", "40.01"))).await.unwrap();

        wait_until(|| buffer.snapshot().raw.len() == 2).await;
        assert_eq!(buffer.snapshot().raw[1].humidity, 40.01);
    }

    #[tokio::test]
    async fn test_transport_error_closes_only_raw_channel() {
        let (tx, source) = ChannelSource::new();
        let aggregate = ScriptedAggregate::new(vec![], sample(25.0, 40.0));
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_raw(source);
        buffer.subscribe_sliding(aggregate, FAST);

        tx.send(Ok(frame(0, "21.00", "40.00"))).await.unwrap();
        tx.send(Err(SyncError::Transport("connection reset".into()))).await.unwrap();

        wait_until(|| buffer.raw_state() == SubscriptionState::Closed).await;
        wait_until(|| buffer.snapshot().sliding.len() == 1).await;

        assert_eq!(buffer.snapshot().raw.len(), 1);
        assert_eq!(buffer.sliding_state(), SubscriptionState::Active);
        assert!(!buffer.is_closed());
    }

    #[tokio::test]
    async fn test_stream_end_closes_raw_channel() {
        let (tx, source) = ChannelSource::new();
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_raw(source);

        tx.send(Ok(frame(0, "21.00", "40.00"))).await.unwrap();
        drop(tx);

        wait_until(|| buffer.raw_state() == SubscriptionState::Closed).await;
        assert_eq!(buffer.snapshot().raw.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_channel_cannot_be_resubscribed() {
        let (tx, source) = ChannelSource::new();
        let buffer = DualSourceBuffer::new();
        assert!(buffer.subscribe_raw(source));
        drop(tx);
        wait_until(|| buffer.raw_state() == SubscriptionState::Closed).await;

        let (_tx, again) = ChannelSource::new();
        assert!(!buffer.subscribe_raw(again));
    }

    #[tokio::test]
    async fn test_identical_pulls_admit_one_point() {
        let aggregate = ScriptedAggregate::new(vec![], sample(25.0, 40.0));
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_sliding(aggregate.clone(), FAST);

        wait_until(|| aggregate.calls.load(Ordering::SeqCst) >= 3).await;

        let sliding = buffer.snapshot().sliding;
        assert_eq!(sliding.len(), 1);
        assert_eq!(sliding[0].avg_temp, 25.0);
        assert_eq!(sliding[0].avg_humidity, 40.0);
    }

    #[tokio::test]
    async fn test_failed_pull_skips_tick_and_keeps_polling() {
        let aggregate = ScriptedAggregate::new(
            vec![
                Err(SyncError::Request("connection refused".into())),
                Err(SyncError::Parse("bad body".into())),
            ],
            sample(24.5, 39.5),
        );
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_sliding(aggregate.clone(), FAST);

        wait_until(|| buffer.snapshot().sliding.len() == 1).await;
        assert!(aggregate.calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(buffer.sliding_state(), SubscriptionState::Active);
    }

    #[tokio::test]
    async fn test_unanswered_pull_does_not_stop_polling() {
        let aggregate = Arc::new(StalledFirstAggregate {
            calls: AtomicUsize::new(0),
        });
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_sliding(aggregate.clone(), FAST);

        wait_until(|| buffer.snapshot().sliding.len() == 1).await;
        wait_until(|| aggregate.calls.load(Ordering::SeqCst) >= 4).await;

        let sliding = buffer.snapshot().sliding;
        assert_eq!(sliding[0].avg_temp, 26.0);
        assert_eq!(sliding[0].avg_humidity, 42.0);
        assert_eq!(buffer.sliding_state(), SubscriptionState::Active);
    }

    #[tokio::test]
    async fn test_in_flight_pull_discarded_after_teardown() {
        let aggregate = Arc::new(HeldAggregate {
            started: Notify::new(),
            release: Notify::new(),
        });
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_sliding(aggregate.clone(), FAST);

        aggregate.started.notified().await;
        let before = buffer.snapshot().sliding.len();
        buffer.close();
        aggregate.release.notify_one();
        tokio::time::sleep(FAST * 5).await;

        assert_eq!(buffer.snapshot().sliding.len(), before);
        assert_eq!(buffer.sliding_state(), SubscriptionState::Closed);
    }

    #[tokio::test]
    async fn test_admission_after_close_is_discarded() {
        let buffer = DualSourceBuffer::new();
        buffer.close();

        let point = SlidingPoint::from_sample(&sample(25.0, 40.0), "t".into());
        assert_eq!(buffer.shared.admit_sliding(point), Admission::Discarded);
        assert!(buffer.snapshot().sliding.is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_both_channels() {
        let (tx, source) = ChannelSource::new();
        let aggregate = ScriptedAggregate::new(vec![], sample(25.0, 40.0));
        let buffer = DualSourceBuffer::new();
        buffer.subscribe_raw(source);
        buffer.subscribe_sliding(aggregate, FAST);

        buffer.close();
        buffer.close();

        let _ = tx.send(Ok(frame(0, "21.00", "40.00"))).await;
        tokio::time::sleep(FAST * 5).await;

        assert_eq!(buffer.raw_state(), SubscriptionState::Closed);
        assert_eq!(buffer.sliding_state(), SubscriptionState::Closed);
        assert_eq!(buffer.snapshot(), DashboardSnapshot::default());
        assert!(!buffer.subscribe_sliding(ScriptedAggregate::new(vec![], sample(1.0, 1.0)), FAST));
    }

    #[tokio::test]
    async fn test_updates_observe_admissions() {
        let (tx, source) = ChannelSource::new();
        let buffer = DualSourceBuffer::new();
        let mut updates = buffer.updates();
        buffer.subscribe_raw(source);

        tx.send(Ok(frame(0, "21.00", "40.00"))).await.unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().raw.len(), 1);
    }
}
