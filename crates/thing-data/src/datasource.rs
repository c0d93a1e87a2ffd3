//! In-memory Thing store
//!
//! Owns the id counter and the broadcast channel. Generation is a short
//! critical section: take the id, bump the counter, remember the Thing and
//! publish it, all under one lock. Publication order therefore always
//! matches id order, no matter how many threads generate at once.
//!
//! Ids never wrap. Once `i64::MAX` has been handed out the store refuses to
//! generate and its state stays as it was.

use crate::subscription::ThingSubscription;
use crate::thing::Thing;
use crate::usecase::{GenerateThing, GetLastGeneratedThing, ObserveThings};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use things_core::config::StoreConfig;
use things_core::{Error, Result};
use things_telemetry::{names, shared_metrics, MetricsRegistry};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

#[derive(Debug)]
struct CounterState {
    /// `None` once every id has been used
    next_id: Option<i64>,
    last_generated: Option<Thing>,
}

/// Thing store backed by a tokio broadcast channel
///
/// Things published while nobody is subscribed are dropped, but still
/// become the last generated Thing.
pub struct ThingsLocalDatasource {
    state: Mutex<CounterState>,
    sender: broadcast::Sender<Thing>,
    fake_delay: Duration,
    channel_capacity: usize,
    metrics: Arc<MetricsRegistry>,
}

impl ThingsLocalDatasource {
    /// Create a store from validated configuration
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let (sender, _) = broadcast::channel(config.channel_capacity);

        debug!(
            first_thing_id = config.first_thing_id,
            fake_delay_ms = config.fake_delay_ms,
            channel_capacity = config.channel_capacity,
            "Thing store created"
        );

        Ok(Self {
            state: Mutex::new(CounterState {
                next_id: Some(config.first_thing_id),
                last_generated: None,
            }),
            sender,
            fake_delay: config.fake_delay(),
            channel_capacity: config.channel_capacity,
            metrics: shared_metrics(),
        })
    }

    /// Record metrics into `metrics` instead of the global registry
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Store starting at `first_thing_id` with the default delay and capacity
    pub fn with_defaults(first_thing_id: i64) -> Result<Self> {
        Self::new(&StoreConfig::starting_at(first_thing_id))
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// The artificial delay applied to every delivery
    #[must_use]
    pub fn fake_delay(&self) -> Duration {
        self.fake_delay
    }

    /// Per-subscriber buffer size
    #[must_use]
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }
}

impl GenerateThing for ThingsLocalDatasource {
    #[instrument(level = "trace", skip(self))]
    fn generate_thing(&self) -> Result<Thing> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(id) = state.next_id else {
            let last_id = state.last_generated.map_or(i64::MAX, |thing| thing.id());
            return Err(Error::ids_exhausted(last_id));
        };
        let thing = Thing::new(id);
        state.next_id = id.checked_add(1);
        state.last_generated = Some(thing);

        match self.sender.send(thing) {
            Ok(receivers) => debug!(thing_id = thing.id(), receivers, "Thing published"),
            Err(_) => {
                self.metrics.increment(names::DROPPED_UNOBSERVED);
                debug!(thing_id = thing.id(), "Thing published with no subscribers");
            }
        }
        drop(state);

        self.metrics.increment(names::GENERATED);
        Ok(thing)
    }
}

impl ObserveThings for ThingsLocalDatasource {
    fn observe_things(&self) -> ThingSubscription {
        let subscription = ThingSubscription::new(
            self.sender.subscribe(),
            self.fake_delay,
            Arc::clone(&self.metrics),
        );
        debug!(subscribers = self.subscriber_count(), "Subscriber registered");
        subscription
    }
}

impl GetLastGeneratedThing for ThingsLocalDatasource {
    fn last_generated_thing(&self) -> Option<Thing> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_generated
    }
}

impl std::fmt::Debug for ThingsLocalDatasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThingsLocalDatasource")
            .field("state", &self.state)
            .field("fake_delay", &self.fake_delay)
            .field("channel_capacity", &self.channel_capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use things_core::ErrorCode;
    use tokio::time::Instant;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    const DELAY: Duration = Duration::from_millis(1000);

    fn store(first: i64) -> ThingsLocalDatasource {
        ThingsLocalDatasource::new(&StoreConfig::starting_at(first).with_fake_delay(DELAY)).unwrap()
    }

    fn instant_store(first: i64, capacity: usize) -> ThingsLocalDatasource {
        ThingsLocalDatasource::new(
            &StoreConfig::starting_at(first)
                .with_fake_delay(Duration::ZERO)
                .with_channel_capacity(capacity),
        )
        .unwrap()
    }

    fn metered(store: ThingsLocalDatasource) -> (ThingsLocalDatasource, Arc<MetricsRegistry>) {
        let registry = Arc::new(MetricsRegistry::new());
        (store.with_metrics(Arc::clone(&registry)), registry)
    }

    fn drain(mut sub: ThingSubscription) -> Vec<i64> {
        tokio_test::block_on(async {
            let mut ids = Vec::new();
            while let Some(thing) = sub.next().await {
                ids.push(thing.id());
            }
            ids
        })
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StoreConfig::default().with_channel_capacity(0);
        assert!(ThingsLocalDatasource::new(&config).is_err());
    }

    #[test]
    fn test_last_generated_absent_before_generation() {
        let store = store(1);
        assert_eq!(store.last_generated_thing(), None);
    }

    #[test]
    fn test_last_generated_tracks_most_recent() {
        let store = store(1);
        store.generate_thing().unwrap();
        assert_eq!(store.last_generated_thing(), Some(Thing::new(1)));
        store.generate_thing().unwrap();
        assert_eq!(store.last_generated_thing(), Some(Thing::new(2)));
    }

    #[test]
    fn test_generation_without_subscribers_still_counts() {
        let store = store(10);
        assert_eq!(store.generate_thing().unwrap(), Thing::new(10));
        assert_eq!(store.generate_thing().unwrap(), Thing::new(11));
        assert_eq!(store.last_generated_thing(), Some(Thing::new(11)));
    }

    #[test]
    fn test_store_starting_at_max_generates_once() {
        let store = store(i64::MAX);

        assert_eq!(store.generate_thing().unwrap(), Thing::new(i64::MAX));
        for _ in 0..2 {
            let err = store.generate_thing().unwrap_err();
            assert_eq!(err.code, ErrorCode::IdsExhausted);
        }
        assert_eq!(store.last_generated_thing(), Some(Thing::new(i64::MAX)));
    }

    #[test]
    fn test_exhausted_store_publishes_nothing_more() {
        let (store, registry) = metered(instant_store(i64::MAX - 1, 4));
        let sub = store.observe_things();

        store.generate_thing().unwrap();
        store.generate_thing().unwrap();
        assert!(store.generate_thing().is_err());
        assert_eq!(registry.counter(names::GENERATED), 2);
        drop(store);

        assert_eq!(drain(sub), vec![i64::MAX - 1, i64::MAX]);
    }

    #[test]
    fn test_unobserved_things_are_counted() {
        let (store, registry) = metered(instant_store(10, 4));
        store.generate_thing().unwrap();
        store.generate_thing().unwrap();

        assert_eq!(registry.counter(names::GENERATED), 2);
        assert_eq!(registry.counter(names::DROPPED_UNOBSERVED), 2);

        let _sub = store.observe_things();
        store.generate_thing().unwrap();

        assert_eq!(registry.counter(names::GENERATED), 3);
        assert_eq!(registry.counter(names::DROPPED_UNOBSERVED), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_metrics_follow_subscribers() {
        let (store, registry) = metered(store(1));
        let mut first = store.observe_things();
        let second = store.observe_things();
        assert_eq!(registry.gauge_value(names::SUBSCRIBERS), 2);

        store.generate_thing().unwrap();
        assert_eq!(first.next().await, Some(Thing::new(1)));

        assert_eq!(registry.counter(names::DELIVERED), 1);
        let latency = registry.histogram_stats(names::DELIVERY_MS);
        assert_eq!(latency.count, 1);
        assert!(latency.min >= DELAY.as_secs_f64() * 1000.0);

        drop(second);
        assert_eq!(registry.gauge_value(names::SUBSCRIBERS), 1);
        drop(first);
        assert_eq!(registry.gauge_value(names::SUBSCRIBERS), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_while_waiting_records_no_delivery() {
        let (store, registry) = metered(store(1));
        let mut sub = store.observe_things();
        store.generate_thing().unwrap();

        assert!(tokio::time::timeout(DELAY / 2, sub.next()).await.is_err());
        drop(sub);

        assert_eq!(registry.counter(names::DELIVERED), 0);
        assert_eq!(registry.histogram_stats(names::DELIVERY_MS).count, 0);
        assert_eq!(registry.gauge_value(names::SUBSCRIBERS), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_subscriber_sees_every_thing_after_delay() {
        let store = store(1);
        let mut sub = store.observe_things();
        let start = Instant::now();

        for _ in 0..3 {
            store.generate_thing().unwrap();
        }

        for (n, expected) in (1..=3).enumerate() {
            assert_eq!(sub.next().await, Some(Thing::new(expected)));
            assert!(start.elapsed() >= DELAY * (n as u32 + 1));
        }
        assert_eq!(store.last_generated_thing(), Some(Thing::new(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_gets_no_replay() {
        let store = store(1);
        store.generate_thing().unwrap();
        store.generate_thing().unwrap();

        let mut sub = store.observe_things();
        store.generate_thing().unwrap();

        assert_eq!(sub.next().await, Some(Thing::new(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_subscriber_sees_the_same_sequence() {
        let store = store(0);
        let mut first = store.observe_things();
        let mut second = store.observe_things();
        assert_eq!(store.subscriber_count(), 2);

        store.generate_thing().unwrap();
        store.generate_thing().unwrap();

        for expected in 0..2 {
            assert_eq!(first.next().await, Some(Thing::new(expected)));
            assert_eq!(second.next().await, Some(Thing::new(expected)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_one_subscriber_leaves_others() {
        let store = store(1);
        let first = store.observe_things();
        let mut second = store.observe_things();

        drop(first);
        assert_eq!(store.subscriber_count(), 1);

        store.generate_thing().unwrap();
        assert_eq!(second.next().await, Some(Thing::new(1)));
    }

    #[test]
    fn test_observe_before_generation_is_pending() {
        let store = store(1);
        let mut sub = store.observe_things();

        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());
    }

    #[test]
    fn test_instant_delivery_wakes_subscriber() {
        let store = instant_store(1, 4);
        let mut sub = store.observe_things();

        let mut next = task::spawn(sub.next());
        assert_pending!(next.poll());

        store.generate_thing().unwrap();
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Some(Thing::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_resumes_same_thing() {
        let store = store(1);
        let mut sub = store.observe_things();
        let start = Instant::now();
        store.generate_thing().unwrap();

        let early = tokio::time::timeout(DELAY / 2, sub.next()).await;
        assert!(early.is_err());

        assert_eq!(sub.next().await, Some(Thing::new(1)));
        assert!(start.elapsed() >= DELAY);
        assert!(start.elapsed() < DELAY + DELAY / 2);
    }

    #[tokio::test]
    async fn test_closed_store_drains_then_ends() {
        let store = instant_store(1, 4);
        let mut sub = store.observe_things();
        store.generate_thing().unwrap();
        drop(store);

        assert_eq!(sub.next().await, Some(Thing::new(1)));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_oldest() {
        let (store, registry) = metered(instant_store(1, 2));
        let mut sub = store.observe_things();

        for _ in 0..5 {
            store.generate_thing().unwrap();
        }

        assert_eq!(sub.next().await, Some(Thing::new(4)));
        assert_eq!(registry.counter(names::LAGGED), 3);
        assert_eq!(sub.next().await, Some(Thing::new(5)));
        assert_eq!(registry.counter(names::DELIVERED), 2);
        assert_eq!(registry.counter(names::LAGGED), 3);
    }

    #[tokio::test]
    async fn test_concurrent_generation_never_duplicates() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 100;

        let store = Arc::new(instant_store(1, THREADS * PER_THREAD));
        let mut sub = store.observe_things();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| store.generate_thing().unwrap().id())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut generated = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(generated.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(generated.len(), THREADS * PER_THREAD);

        let mut observed = Vec::with_capacity(THREADS * PER_THREAD);
        for _ in 0..THREADS * PER_THREAD {
            observed.push(sub.next().await.unwrap().id());
        }
        let expected: Vec<i64> = (1..=(THREADS * PER_THREAD) as i64).collect();
        assert_eq!(observed, expected);
    }

    proptest! {
        #[test]
        fn prop_early_subscriber_sees_exact_range(first in -1_000i64..1_000, count in 0usize..40) {
            let store = instant_store(first, 64);
            let sub = store.observe_things();

            for _ in 0..count {
                store.generate_thing().unwrap();
            }
            drop(store);

            let observed = drain(sub);

            let expected: Vec<i64> = (first..first + count as i64).collect();
            prop_assert_eq!(observed, expected);
        }
    }
}
