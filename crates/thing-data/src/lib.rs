//! Sequential Thing generation with broadcast observation
//!
//! A [`ThingsLocalDatasource`] hands out Things with strictly increasing ids
//! and fans each one out to every live [`ThingSubscription`], after an
//! artificial delay that stands in for I/O latency.
//!
//! Consumers should depend on the narrow capability they need:
//!
//! - [`GenerateThing`]: produce the next Thing
//! - [`ObserveThings`]: subscribe to Things generated from now on
//! - [`GetLastGeneratedThing`]: read the most recent Thing, if any
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use things_core::config::StoreConfig;
//! use things_data::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> things_core::Result<()> {
//!     let config = StoreConfig::starting_at(1).with_fake_delay(Duration::from_millis(100));
//!     let store = ThingsLocalDatasource::new(&config)?;
//!
//!     let mut things = store.observe_things();
//!     store.generate_thing()?;
//!
//!     assert_eq!(things.next().await, Some(Thing::new(1)));
//!     assert_eq!(store.last_generated_thing(), Some(Thing::new(1)));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod datasource;
pub mod subscription;
pub mod thing;
pub mod usecase;

pub use datasource::ThingsLocalDatasource;
pub use subscription::ThingSubscription;
pub use thing::Thing;
pub use usecase::{GenerateThing, GetLastGeneratedThing, ObserveThings};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::datasource::ThingsLocalDatasource;
    pub use crate::subscription::ThingSubscription;
    pub use crate::thing::Thing;
    pub use crate::usecase::{GenerateThing, GetLastGeneratedThing, ObserveThings};
}
