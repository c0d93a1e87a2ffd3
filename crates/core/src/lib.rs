//! Core utilities for the things workspace
//!
//! This crate provides the functionality shared by every other crate:
//!
//! - **Error handling**: Structured errors with codes, context, and recovery suggestions
//! - **Configuration**: TOML-based configuration with environment overrides and validation
//!
//! # Example
//!
//! ```rust,no_run
//! use things_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! println!("first id: {}", config.schema.store.first_thing_id);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AppConfig, Config, ConfigSchema, LogConfig, StoreConfig};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
}
