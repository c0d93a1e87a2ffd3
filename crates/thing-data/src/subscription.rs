//! Per-subscriber view of the Thing broadcast

use crate::thing::Thing;
use std::sync::Arc;
use std::time::Duration;
use things_telemetry::{names, MetricsRegistry};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// A Thing received from the channel and waiting out its artificial delay
struct Pending {
    thing: Thing,
    received_at: Instant,
    deliver_at: Instant,
}

/// Live sequence of Things for one subscriber
///
/// Things arrive in generation order, each surfaced only after the
/// configured delay. Dropping the subscription unsubscribes it.
///
/// A subscriber that falls more than the channel capacity behind skips the
/// oldest Things it has not read yet and continues from the oldest one still
/// buffered.
pub struct ThingSubscription {
    receiver: broadcast::Receiver<Thing>,
    fake_delay: Duration,
    pending: Option<Pending>,
    metrics: Arc<MetricsRegistry>,
}

impl ThingSubscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Thing>,
        fake_delay: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        metrics.gauge_inc(names::SUBSCRIBERS);
        Self {
            receiver,
            fake_delay,
            pending: None,
            metrics,
        }
    }

    /// Wait for the next Thing
    ///
    /// Returns `None` once the store is gone and every buffered Thing has
    /// been delivered. Cancel safe: if the future is dropped while a Thing is
    /// waiting out its delay, the next call delivers that same Thing at the
    /// first deadline.
    pub async fn next(&mut self) -> Option<Thing> {
        loop {
            if let Some(pending) = &self.pending {
                if !self.fake_delay.is_zero() {
                    time::sleep_until(pending.deliver_at).await;
                }
            }

            if let Some(pending) = self.pending.take() {
                let latency = pending.received_at.elapsed();
                self.metrics.histogram(names::DELIVERY_MS, latency.as_secs_f64() * 1000.0);
                self.metrics.increment(names::DELIVERED);
                debug!(thing_id = pending.thing.id(), "Thing delivered");
                return Some(pending.thing);
            }

            match self.receiver.recv().await {
                Ok(thing) => {
                    let received_at = Instant::now();
                    self.pending = Some(Pending {
                        thing,
                        received_at,
                        deliver_at: received_at + self.fake_delay,
                    });
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged, oldest Things dropped");
                    self.metrics.increment_by(names::LAGGED, skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("Thing store closed");
                    return None;
                }
            }
        }
    }

    /// The artificial delay applied before each delivery
    #[must_use]
    pub fn fake_delay(&self) -> Duration {
        self.fake_delay
    }
}

impl Drop for ThingSubscription {
    fn drop(&mut self) {
        self.metrics.gauge_dec(names::SUBSCRIBERS);
    }
}

impl std::fmt::Debug for ThingSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThingSubscription")
            .field("fake_delay", &self.fake_delay)
            .field("pending", &self.pending.as_ref().map(|p| p.thing))
            .finish_non_exhaustive()
    }
}
