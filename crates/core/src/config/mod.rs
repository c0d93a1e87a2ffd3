//! Configuration loading and schema definitions
//!
//! Shared configuration types used by the store, the app layer and the CLI.

mod loader;
mod schema;

pub use loader::{
    apply_env_overrides, Config, ENV_CHANNEL_CAPACITY, ENV_FAKE_DELAY_MS, ENV_FIRST_ID,
};
pub use schema::*;
