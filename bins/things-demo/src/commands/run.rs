//! Press the generate button and watch the observers

use crate::OutputFormat;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::time::Duration;
use things_app::{AddThingViewModel, AppContainer};
use things_core::config::Config;
use things_data::ThingSubscription;
use tracing::{info, warn};

/// Names given to the first observing surfaces
const SURFACE_NAMES: &[&str] = &["activity", "tab", "screen"];

/// Slack added to the computed delivery deadline
const TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Options for the run command
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub count: usize,
    pub observers: usize,
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Serialize)]
struct ObserverReport {
    name: String,
    deliveries: usize,
    latest: Option<i64>,
    complete: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    session_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    first_thing_id: i64,
    fake_delay_ms: u64,
    presses: Vec<i64>,
    observed: Vec<i64>,
    observers: Vec<ObserverReport>,
    last_thing: String,
    screen_one_text: String,
    metrics: serde_json::Value,
}

/// Run the demo; `Ok(false)` when some observer missed Things
pub async fn run(config: Config, options: &RunOptions, format: OutputFormat) -> anyhow::Result<bool> {
    if options.observers == 0 {
        return Err(things_core::Error::validation("--observers must be at least 1").into());
    }

    let container = AppContainer::new(config)?;
    let store = container.config().schema.store.clone();

    let view_models = (0..options.observers)
        .map(|i| container.add_thing_view_model(surface_name(i)))
        .collect::<things_core::Result<Vec<_>>>()?;
    let mut recorder = container.observe_things().observe_things();

    let started_at = Utc::now();
    let mut presses = Vec::new();

    for i in 0..options.count {
        let view_model = &view_models[i % view_models.len()];
        let thing = view_model.generate_thing_button_clicked()?;
        presses.push(thing.id());

        if format == OutputFormat::Text {
            println!(
                "{} {} {}",
                view_model.name().cyan(),
                "pressed ->".dimmed(),
                thing.to_string().bold()
            );
        }

        if !options.interval.is_zero() && i + 1 < options.count {
            tokio::time::sleep(options.interval).await;
        }
    }

    let timeout = options.timeout.unwrap_or_else(|| default_timeout(&store, options.count));
    let mut observed = Vec::new();
    let all_delivered = tokio::time::timeout(timeout, async {
        record_ids(&mut recorder, &mut observed, options.count).await;
        wait_for_all(&view_models, options.count).await;
    })
    .await
    .is_ok();
    if !all_delivered {
        warn!(?timeout, "Timed out waiting for deliveries");
    }

    let last_press = presses.last().copied();
    let observers: Vec<ObserverReport> = view_models
        .iter()
        .map(|view_model| {
            let deliveries = view_model.deliveries();
            let latest = view_model.latest().map(|thing| thing.id());
            ObserverReport {
                name: view_model.name().to_string(),
                complete: deliveries == presses.len() && latest == last_press,
                deliveries,
                latest,
            }
        })
        .collect();
    let complete = observed == presses && observers.iter().all(|o| o.complete);

    let report = RunReport {
        session_id: things_telemetry::session_id().to_string(),
        started_at,
        finished_at: Utc::now(),
        first_thing_id: store.first_thing_id,
        fake_delay_ms: store.fake_delay_ms,
        presses,
        observed,
        observers,
        last_thing: container.last_thing_presenter().text(),
        screen_one_text: container.screen_one_text().to_string(),
        metrics: things_telemetry::metrics().export_json(),
    };

    info!(complete, observers = report.observers.len(), "Run finished");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }

    Ok(complete)
}

fn surface_name(index: usize) -> String {
    SURFACE_NAMES
        .get(index)
        .map_or_else(|| format!("observer-{}", index + 1), |name| (*name).to_string())
}

/// Every delivery is delayed in turn, so the last one lands after `count` delays
fn default_timeout(store: &things_core::config::StoreConfig, count: usize) -> Duration {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    store
        .fake_delay()
        .saturating_mul(count.saturating_add(1))
        .saturating_add(TIMEOUT_SLACK)
}

/// Collect delivered ids in order until `count` arrive or the store closes
async fn record_ids(recorder: &mut ThingSubscription, ids: &mut Vec<i64>, count: usize) {
    while ids.len() < count {
        match recorder.next().await {
            Some(thing) => ids.push(thing.id()),
            None => break,
        }
    }
}

async fn wait_for_all(view_models: &[AddThingViewModel], count: usize) {
    for view_model in view_models {
        view_model.wait_for_deliveries(count).await;
    }
}

fn print_text(report: &RunReport) {
    println!();
    for observer in &report.observers {
        let latest = observer
            .latest
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let status = if observer.complete {
            "ok".green().bold().to_string()
        } else {
            "missed Things".red().bold().to_string()
        };
        println!(
            "{:>12}  {} delivered, latest {}  {}",
            observer.name.cyan(),
            observer.deliveries,
            latest,
            status
        );
    }

    let ids = report
        .observed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    println!("{:>12}  [{}]", "order".dimmed(), ids);

    println!();
    let last = if report.last_thing.is_empty() {
        "<none>"
    } else {
        report.last_thing.as_str()
    };
    println!("{} {}", "Last generated:".bold(), last);
    println!("{} {}", "Screen one:".bold(), report.screen_one_text);
}
