//! Text for the "last thing" surfaces

use std::sync::Arc;
use things_data::GetLastGeneratedThing;

/// Renders the most recently generated Thing as display text
#[derive(Clone)]
pub struct LastThingPresenter {
    last_generated_thing: Arc<dyn GetLastGeneratedThing>,
}

impl LastThingPresenter {
    /// Create a presenter over the last-generated capability
    pub fn new(last_generated_thing: Arc<dyn GetLastGeneratedThing>) -> Self {
        Self {
            last_generated_thing,
        }
    }

    /// `Thing(id=N)` for the last generated Thing, empty before any generation
    #[must_use]
    pub fn text(&self) -> String {
        self.last_generated_thing
            .last_generated_thing()
            .map(|thing| thing.to_string())
            .unwrap_or_default()
    }
}
