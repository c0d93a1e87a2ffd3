//! Narrow capabilities over the Thing store
//!
//! Consumers depend on the one capability they need rather than on the
//! datasource itself, so a view model that only observes cannot generate.

use crate::subscription::ThingSubscription;
use crate::thing::Thing;
use things_core::Result;

/// Request generation of the next Thing
pub trait GenerateThing: Send + Sync {
    /// Generate, record and publish the next Thing
    ///
    /// Never waits on subscribers. Returns the Thing that was published, or
    /// an `IdsExhausted` error once no larger id is left.
    fn generate_thing(&self) -> Result<Thing>;
}

/// Subscribe to the live sequence of generated Things
pub trait ObserveThings: Send + Sync {
    /// Start observing; only Things generated after this call are delivered
    fn observe_things(&self) -> ThingSubscription;
}

/// Query the most recently generated Thing
pub trait GetLastGeneratedThing: Send + Sync {
    /// `None` until the first generation
    fn last_generated_thing(&self) -> Option<Thing>;
}
