//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result, ResultExt};
use std::path::Path;

/// Environment variable overriding `store.first_thing_id`
pub const ENV_FIRST_ID: &str = "THINGS_FIRST_ID";
/// Environment variable overriding `store.fake_delay_ms`
pub const ENV_FAKE_DELAY_MS: &str = "THINGS_FAKE_DELAY_MS";
/// Environment variable overriding `store.channel_capacity`
pub const ENV_CHANNEL_CAPACITY: &str = "THINGS_CHANNEL_CAPACITY";

/// Configuration wrapper
#[derive(Debug, Clone)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from a file path or use defaults
    ///
    /// An explicit path must exist. Without one, the standard locations are
    /// searched and defaults are used when none is found. Environment
    /// overrides are applied last, then the result is validated.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !Path::new(p).exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_string()),
            None => find_config_file(),
        };

        let mut schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        apply_env_overrides(&mut schema, |key| std::env::var(key).ok())?;
        schema.validate()?;

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Load with defaults only (no file)
    pub fn default() -> Self {
        Self {
            schema: ConfigSchema::default(),
            path: None,
        }
    }

    /// Wrap an already-built schema
    pub fn from_schema(schema: ConfigSchema) -> Self {
        Self { schema, path: None }
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<String> {
    let candidates = [".things.toml", "things.toml", ".config/things.toml"];

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
    }

    None
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &str) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .context(format!("Failed to read config file {}", path))?;

    toml::from_str::<ConfigSchema>(&content)
        .map_err(Error::from)
        .context(format!("Failed to parse config file {}", path))
}

/// Apply `THINGS_*` overrides read through `lookup`
pub fn apply_env_overrides<F>(schema: &mut ConfigSchema, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_FIRST_ID) {
        schema.store.first_thing_id = raw
            .trim()
            .parse()
            .map_err(|_| Error::invalid_config_value(ENV_FIRST_ID, &raw))?;
    }

    if let Some(raw) = lookup(ENV_FAKE_DELAY_MS) {
        schema.store.fake_delay_ms = raw
            .trim()
            .parse()
            .map_err(|_| Error::invalid_config_value(ENV_FAKE_DELAY_MS, &raw))?;
    }

    if let Some(raw) = lookup(ENV_CHANNEL_CAPACITY) {
        schema.store.channel_capacity = raw
            .trim()
            .parse()
            .map_err(|_| Error::invalid_config_value(ENV_CHANNEL_CAPACITY, &raw))?;
    }

    Ok(())
}
