//! Print the effective configuration

use crate::OutputFormat;
use owo_colors::OwoColorize;
use things_core::config::Config;

/// Print the configuration as TOML (text) or JSON
pub fn run(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "path": config.path,
                "config": config.schema,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            let source = config.path.as_deref().unwrap_or("built-in defaults");
            println!("{} {}", "# Loaded from:".dimmed(), source.dimmed());
            print!("{}", toml::to_string_pretty(&config.schema)?);
        }
    }

    Ok(())
}
