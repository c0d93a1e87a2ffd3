//! Configuration schema definitions

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the artificial delivery delay
pub const MAX_FAKE_DELAY_MS: u64 = 60 * 60 * 1000;

/// Upper bound for the per-subscriber buffer
pub const MAX_CHANNEL_CAPACITY: usize = 1 << 16;

/// Root configuration schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub telemetry: LogConfig,
}

impl ConfigSchema {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.store.validate()
    }
}

/// Thing store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Id given to the first generated Thing
    #[serde(default = "default_first_thing_id")]
    pub first_thing_id: i64,

    /// Artificial delay before each delivery, in milliseconds
    #[serde(default = "default_fake_delay_ms")]
    pub fake_delay_ms: u64,

    /// Per-subscriber buffer; slower subscribers lose the oldest Things
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            first_thing_id: default_first_thing_id(),
            fake_delay_ms: default_fake_delay_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StoreConfig {
    /// Store starting at `first_thing_id` with default delay and capacity
    #[must_use]
    pub fn starting_at(first_thing_id: i64) -> Self {
        Self {
            first_thing_id,
            ..Self::default()
        }
    }

    /// Builder-style method to set the delivery delay
    #[must_use]
    pub fn with_fake_delay(mut self, delay: Duration) -> Self {
        self.fake_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder-style method to set the channel capacity
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Artificial delay as a `Duration`
    #[must_use]
    pub fn fake_delay(&self) -> Duration {
        Duration::from_millis(self.fake_delay_ms)
    }

    /// Validate the store configuration
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::config_validation("store.channel_capacity must be at least 1")
                .with_suggestion("Use the default of 64 unless you need a tighter bound"));
        }

        if self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(Error::config_validation(format!(
                "store.channel_capacity must not exceed {} (got {})",
                MAX_CHANNEL_CAPACITY, self.channel_capacity
            )));
        }

        if self.fake_delay_ms > MAX_FAKE_DELAY_MS {
            return Err(Error::config_validation(format!(
                "store.fake_delay_ms must not exceed {} (got {})",
                MAX_FAKE_DELAY_MS, self.fake_delay_ms
            )));
        }

        Ok(())
    }
}

fn default_first_thing_id() -> i64 {
    1
}

fn default_fake_delay_ms() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    64
}

/// Application layer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Static text shown on the secondary screen
    #[serde(default = "default_screen_one_text")]
    pub screen_one_text: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            screen_one_text: default_screen_one_text(),
        }
    }
}

fn default_screen_one_text() -> String {
    "This text provided by AppModule!!!".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub show_target: bool,

    #[serde(default)]
    pub show_thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            show_target: false,
            show_thread_ids: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
