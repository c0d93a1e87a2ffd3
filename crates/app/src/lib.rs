//! Application layer over the Thing store
//!
//! - [`AppContainer`]: builds the store from configuration and hands out capabilities
//! - [`AddThingViewModel`]: generate button plus latest delivered Thing
//! - [`LastThingPresenter`]: text for the last generated Thing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod container;
pub mod last_thing;
pub mod view_model;

pub use container::AppContainer;
pub use last_thing::LastThingPresenter;
pub use view_model::AddThingViewModel;
