//! View model behind the "add thing" surfaces

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use things_core::{Error, ErrorCode, Result};
use things_data::{GenerateThing, ObserveThings, Thing};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

/// Drives a generate button and shows the latest delivered Thing
///
/// A background task subscribes on construction and keeps
/// [`thing_live_data`](Self::thing_live_data) pointing at the most recently
/// delivered Thing. The task is stopped when the view model is dropped.
///
/// Only the latest Thing and a delivery count are kept, so a long-lived
/// view model does not grow with the number of Things it has shown.
pub struct AddThingViewModel {
    name: String,
    generate_thing: Arc<dyn GenerateThing>,
    thing_live_data: watch::Receiver<Option<Thing>>,
    deliveries: Arc<AtomicUsize>,
    collector: JoinHandle<()>,
}

impl AddThingViewModel {
    /// Create a view model and start collecting Things
    ///
    /// Fails if called outside a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        observe_things: &Arc<dyn ObserveThings>,
        generate_thing: Arc<dyn GenerateThing>,
    ) -> Result<Self> {
        let name = name.into();
        let handle = Handle::try_current().map_err(|e| {
            Error::new(ErrorCode::Internal, "View models need a tokio runtime")
                .with_context(format!("creating view model {name}"))
                .with_source(e)
        })?;

        let mut subscription = observe_things.observe_things();
        let (sender, thing_live_data) = watch::channel(None);
        let deliveries = Arc::new(AtomicUsize::new(0));

        let collector = handle.spawn({
            let deliveries = Arc::clone(&deliveries);
            let name = name.clone();
            async move {
                loop {
                    tokio::select! {
                        () = sender.closed() => break,
                        next = subscription.next() => {
                            let Some(thing) = next else { break };
                            deliveries.fetch_add(1, Ordering::Release);
                            debug!(view_model = %name, thing_id = thing.id(), "Thing shown");
                            if sender.send(Some(thing)).is_err() {
                                break;
                            }
                        }
                    }
                }
                debug!(view_model = %name, "Stopped collecting Things");
            }
        });

        Ok(Self {
            name,
            generate_thing,
            thing_live_data,
            deliveries,
            collector,
        })
    }

    /// Handle a press of the generate button
    #[instrument(skip(self), fields(view_model = %self.name))]
    pub fn generate_thing_button_clicked(&self) -> Result<Thing> {
        self.generate_thing.generate_thing()
    }

    /// Latest-value holder for the delivered Things
    ///
    /// Holds `None` until the first delivery.
    #[must_use]
    pub fn thing_live_data(&self) -> watch::Receiver<Option<Thing>> {
        self.thing_live_data.clone()
    }

    /// The most recently delivered Thing
    #[must_use]
    pub fn latest(&self) -> Option<Thing> {
        *self.thing_live_data.borrow()
    }

    /// Number of Things delivered so far
    #[must_use]
    pub fn deliveries(&self) -> usize {
        self.deliveries.load(Ordering::Acquire)
    }

    /// Wait until at least `count` Things have been delivered
    ///
    /// Returns `false` if collection stopped first.
    pub async fn wait_for_deliveries(&self, count: usize) -> bool {
        let mut live_data = self.thing_live_data.clone();
        loop {
            if self.deliveries() >= count {
                return true;
            }
            if live_data.changed().await.is_err() {
                return self.deliveries() >= count;
            }
        }
    }

    /// Name used in logs and reports
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for AddThingViewModel {
    fn drop(&mut self) {
        self.collector.abort();
    }
}

impl std::fmt::Debug for AddThingViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddThingViewModel")
            .field("name", &self.name)
            .field("latest", &self.latest())
            .field("deliveries", &self.deliveries())
            .finish_non_exhaustive()
    }
}
