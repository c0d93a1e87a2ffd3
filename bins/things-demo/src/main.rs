//! things-demo - press the generate button, watch every surface update
//!
//! Builds the app container from configuration, attaches several observing
//! view models and reports what each of them received.

use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::process::ExitCode;
use std::time::Duration;
use things_core::config::Config;
use things_core::error::exit_codes;
use things_telemetry::TelemetryConfig;

mod commands;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Sequential Thing generation, observed by many surfaces
#[derive(Parser)]
#[command(name = "things-demo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "THINGS_CONFIG")]
    config: Option<String>,

    /// Override the id of the first generated Thing
    #[arg(long, global = true)]
    first_id: Option<i64>,

    /// Override the artificial delivery delay in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Press the generate button and wait for every observer
    Run {
        /// Number of button presses
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,

        /// Number of observing surfaces
        #[arg(short, long, default_value = "3")]
        observers: usize,

        /// Pause between presses in milliseconds
        #[arg(short, long, default_value = "0")]
        interval_ms: u64,

        /// Give up waiting for deliveries after this many milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => return fail(&e, cli.format),
    };

    let mut telemetry = TelemetryConfig::from(&config.schema.telemetry);
    if cli.verbose {
        telemetry = telemetry.verbose();
    }
    if let Err(e) = things_telemetry::init_with_config(telemetry) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    let result = match cli.command {
        Commands::Run {
            count,
            observers,
            interval_ms,
            timeout_ms,
        } => {
            let options = commands::run::RunOptions {
                count,
                observers,
                interval: Duration::from_millis(interval_ms),
                timeout: timeout_ms.map(Duration::from_millis),
            };
            commands::run::run(config, &options, cli.format).await
        }
        Commands::Config => commands::config::run(&config, cli.format).map(|()| true),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => exit_code(exit_codes::FAILURE),
        Err(e) => fail(&e, cli.format),
    }
}

/// Load the config file, then apply command-line overrides
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(first_id) = cli.first_id {
        config.schema.store.first_thing_id = first_id;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.schema.store.fake_delay_ms = delay_ms;
    }
    config.schema.validate()?;

    Ok(config)
}

fn fail(error: &anyhow::Error, format: OutputFormat) -> ExitCode {
    let core = error.downcast_ref::<things_core::Error>();

    match (format, core) {
        (OutputFormat::Json, Some(core)) => {
            let report = serde_json::json!({ "error": core.to_report() });
            println!("{report:#}");
        }
        (OutputFormat::Json, None) => {
            let report = serde_json::json!({ "error": { "message": error.to_string() } });
            println!("{report:#}");
        }
        (OutputFormat::Text, _) => eprintln!("{} {}", "Error:".red().bold(), error),
    }

    exit_code(core.map_or(exit_codes::FAILURE, |e| e.code.exit_code()))
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
