//! Composition root
//!
//! Builds the one Thing store an application uses and hands out narrow
//! capabilities over it. Nothing here is global: whoever owns the container
//! owns the store.

use crate::last_thing::LastThingPresenter;
use crate::view_model::AddThingViewModel;
use std::sync::Arc;
use things_core::config::Config;
use things_core::{Result, ResultExt};
use things_data::{GenerateThing, GetLastGeneratedThing, ObserveThings, ThingsLocalDatasource};
use tracing::info;

/// Owns the Thing store and wires consumers to it
#[derive(Debug)]
pub struct AppContainer {
    config: Config,
    datasource: Arc<ThingsLocalDatasource>,
}

impl AppContainer {
    /// Build the container from loaded configuration
    pub fn new(config: Config) -> Result<Self> {
        let datasource = ThingsLocalDatasource::new(&config.schema.store)
            .context("building the Thing store")?;

        info!(
            first_thing_id = config.schema.store.first_thing_id,
            fake_delay_ms = config.schema.store.fake_delay_ms,
            config_path = config.path.as_deref().unwrap_or("<defaults>"),
            "App container ready"
        );

        Ok(Self {
            config,
            datasource: Arc::new(datasource),
        })
    }

    /// The configuration the container was built from
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Capability to observe Things
    #[must_use]
    pub fn observe_things(&self) -> Arc<dyn ObserveThings> {
        self.datasource.clone()
    }

    /// Capability to generate Things
    #[must_use]
    pub fn generate_thing(&self) -> Arc<dyn GenerateThing> {
        self.datasource.clone()
    }

    /// Capability to read the last generated Thing
    #[must_use]
    pub fn last_generated_thing(&self) -> Arc<dyn GetLastGeneratedThing> {
        self.datasource.clone()
    }

    /// A fresh view model with its own subscription
    pub fn add_thing_view_model(&self, name: impl Into<String>) -> Result<AddThingViewModel> {
        AddThingViewModel::new(name, &self.observe_things(), self.generate_thing())
    }

    /// Presenter for the last generated Thing
    #[must_use]
    pub fn last_thing_presenter(&self) -> LastThingPresenter {
        LastThingPresenter::new(self.last_generated_thing())
    }

    /// Static text shown on the secondary screen
    #[must_use]
    pub fn screen_one_text(&self) -> &str {
        &self.config.schema.app.screen_one_text
    }

    /// Live subscriptions on the store
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.datasource.subscriber_count()
    }
}
