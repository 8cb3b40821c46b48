//! The authoritative, observable sensor state.
//!
//! `current()` reads from a `watch` channel and never blocks. `subscribe()` hands out a
//! bounded `broadcast` receiver per subscriber: a subscriber that falls more than
//! `subscriber_buffer` snapshots behind loses the oldest ones and skips ahead. Delivery is
//! lossy but live, and the producer never waits on a consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SensorStreamConfig;
use crate::error::SensorError;
use crate::generator::{ForcedState, SyntheticGenerator};
use crate::history::{HistoryWindow, SensorHistory};
use crate::model::{SensorDelta, SensorEvent, SensorSnapshot};
use crate::source::SensorSource;

#[derive(Debug)]
struct StreamInner {
    config: SensorStreamConfig,
    current: watch::Sender<Arc<SensorSnapshot>>,
    updates: broadcast::Sender<Arc<SensorSnapshot>>,
    history: Mutex<SensorHistory>,
    generator: Mutex<SyntheticGenerator>,
    publish_lock: Mutex<()>,
    cancel: CancellationToken,
    generator_started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Versioned, copy-on-write sensor state shared by every agent. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SensorStream {
    inner: Arc<StreamInner>,
}

impl Default for SensorStream {
    fn default() -> Self {
        Self::new(SensorStreamConfig::default())
    }
}

impl SensorStream {
    /// Creates a stream holding default readings.
    #[must_use]
    pub fn new(config: SensorStreamConfig) -> Self {
        let initial = Arc::new(SensorSnapshot::initial(Utc::now()));
        let (current, _) = watch::channel(initial);
        let (updates, _) = broadcast::channel(config.subscriber_buffer.max(1));
        let history = SensorHistory::new(config.history_capacity, config.history_max_age());
        let generator = SyntheticGenerator::new(config.seed);
        Self {
            inner: Arc::new(StreamInner {
                config,
                current,
                updates,
                history: Mutex::new(history),
                generator: Mutex::new(generator),
                publish_lock: Mutex::new(()),
                cancel: CancellationToken::new(),
                generator_started: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Stream configuration.
    #[must_use]
    pub fn config(&self) -> &SensorStreamConfig {
        &self.inner.config
    }

    /// Latest snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<SensorSnapshot> {
        self.inner.current.borrow().clone()
    }

    /// Receiver that always observes the latest snapshot, skipping intermediate ones.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<SensorSnapshot>> {
        self.inner.current.subscribe()
    }

    /// Ordered subscription to every snapshot published after this call.
    #[must_use]
    pub fn subscribe(&self) -> SensorSubscription {
        SensorSubscription {
            receiver: self.inner.updates.subscribe(),
            cancel: self.inner.cancel.clone(),
            dropped: 0,
        }
    }

    /// Number of live ordered subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.updates.receiver_count()
    }

    /// Merges `delta` into the current snapshot and publishes the result.
    pub fn update(&self, delta: &SensorDelta) -> Result<Arc<SensorSnapshot>, SensorError> {
        self.update_at(delta, Utc::now())
    }

    /// Like [`Self::update`] with a caller-supplied capture time.
    pub fn update_at(
        &self,
        delta: &SensorDelta,
        timestamp: DateTime<Utc>,
    ) -> Result<Arc<SensorSnapshot>, SensorError> {
        let _publishing = self.inner.publish_lock.lock();
        if self.inner.cancel.is_cancelled() {
            return Err(SensorError::Closed);
        }
        let previous = self.current();
        let next = Arc::new(previous.apply(delta, timestamp));
        {
            let mut history = self.inner.history.lock();
            history.push(Arc::clone(&next));
            history.prune(timestamp);
        }
        self.inner.current.send_replace(Arc::clone(&next));
        // Send only fails when nobody subscribed.
        let _ = self.inner.updates.send(Arc::clone(&next));
        Ok(next)
    }

    /// Merges a discrete real-sensor event.
    pub fn ingest(&self, event: SensorEvent) -> Result<Arc<SensorSnapshot>, SensorError> {
        self.update(&event.into_delta())
    }

    /// Snapshots captured within `[now - duration, now]`.
    #[must_use]
    pub fn history(&self, duration: Duration) -> HistoryWindow {
        self.history_at(Utc::now(), duration)
    }

    /// Snapshots captured within `[now - duration, now]` for an explicit `now`.
    #[must_use]
    pub fn history_at(&self, now: DateTime<Utc>, duration: Duration) -> HistoryWindow {
        let mut history = self.inner.history.lock();
        history.prune(now);
        history.window(now, duration)
    }

    /// Number of retained history entries.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.inner.history.lock().len()
    }

    /// Overrides synthetic readings from the next generated snapshot onward.
    pub fn force_state(&self, state: ForcedState) {
        self.inner.generator.lock().force(state);
        info!(state = %state, "sensors.force_state");
    }

    /// Active override.
    #[must_use]
    pub fn forced_state(&self) -> ForcedState {
        self.inner.generator.lock().forced()
    }

    /// Generates and publishes one synthetic snapshot.
    pub fn tick_once(&self) -> Result<Arc<SensorSnapshot>, SensorError> {
        let now = Utc::now();
        let delta = self.inner.generator.lock().next_delta(now);
        self.update_at(&delta, now)
    }

    /// Starts the periodic generator. Calling it again is a no-op. Requires a tokio runtime.
    pub fn start(&self) {
        if self.inner.cancel.is_cancelled()
            || self.inner.generator_started.swap(true, Ordering::SeqCst)
        {
            return;
        }
        let period = self.inner.config.tick();
        let cancel = self.inner.cancel.clone();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(generator_loop(weak, cancel, period));
        self.inner.tasks.lock().push(handle);
        info!(tick_ms = self.inner.config.tick_ms, "sensors.generator.started");
    }

    /// Forwards a source's events into the stream until shutdown or source exhaustion.
    pub fn attach_source<S>(&self, mut source: S) -> JoinHandle<()>
    where
        S: SensorSource + 'static,
    {
        let cancel = self.inner.cancel.clone();
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    next = source.next_event() => next,
                };
                let Some(inner) = weak.upgrade() else { break };
                let stream = SensorStream { inner };
                match next {
                    Ok(Some(event)) => {
                        if stream.ingest(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(source = source.name(), "sensors.source.exhausted");
                        break;
                    }
                    Err(err) => {
                        warn!(source = source.name(), error = %err, "sensors.source.failed");
                        break;
                    }
                }
            }
        })
    }

    /// Stops the generator and attached sources and ends every subscription. Idempotent.
    pub fn shutdown(&self) {
        {
            let _publishing = self.inner.publish_lock.lock();
            if self.inner.cancel.is_cancelled() {
                return;
            }
            self.inner.cancel.cancel();
        }
        for handle in self.inner.tasks.lock().drain(..) {
            handle.abort();
        }
        info!(
            version = self.current().version,
            "sensors.stream.shutdown"
        );
    }

    /// Whether [`Self::shutdown`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Token cancelled on shutdown.
    #[must_use]
    pub fn closed_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }
}

async fn generator_loop(
    weak: Weak<StreamInner>,
    cancel: CancellationToken,
    period: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = weak.upgrade() else { break };
        if (SensorStream { inner }).tick_once().is_err() {
            break;
        }
    }
    debug!("sensors.generator.stopped");
}

/// Ordered per-subscriber view of published snapshots.
#[derive(Debug)]
pub struct SensorSubscription {
    receiver: broadcast::Receiver<Arc<SensorSnapshot>>,
    cancel: CancellationToken,
    dropped: u64,
}

impl SensorSubscription {
    /// Next snapshot in publication order, or `None` once the stream is shut down.
    ///
    /// Snapshots overwritten while this subscriber lagged are skipped and counted.
    pub async fn next(&mut self) -> Option<Arc<SensorSnapshot>> {
        loop {
            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return None,
                received = self.receiver.recv() => received,
            };
            match received {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.dropped += skipped;
                    warn!(skipped, total = self.dropped, "sensors.subscriber.lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Snapshots skipped so far because this subscriber fell behind.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}
