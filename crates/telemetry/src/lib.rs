//! Telemetry for the things workspace
//!
//! - Structured logging with tracing
//! - In-process counters, gauges and bounded histograms

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use things_core::config::LogConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Metric names recorded by the store and its subscriptions
pub mod names {
    /// Things produced by `generate_thing`
    pub const GENERATED: &str = "things.generated";
    /// Things surfaced to a subscriber after the artificial delay
    pub const DELIVERED: &str = "things.delivered";
    /// Things published while nobody was subscribed
    pub const DROPPED_UNOBSERVED: &str = "things.dropped_unobserved";
    /// Things a slow subscriber skipped
    pub const LAGGED: &str = "things.lagged";
    /// Live subscriptions
    pub const SUBSCRIBERS: &str = "things.subscribers";
    /// Time from receipt to delivery, in milliseconds
    pub const DELIVERY_MS: &str = "things.delivery_ms";
}

/// Samples kept per histogram for percentiles; older samples are overwritten
pub const HISTOGRAM_SAMPLES: usize = 1024;

/// Global metrics registry
static METRICS: Lazy<Arc<MetricsRegistry>> = Lazy::new(|| Arc::new(MetricsRegistry::new()));

/// Global session ID for correlating logs
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Initialize the telemetry system
pub fn init() -> anyhow::Result<()> {
    init_with_config(TelemetryConfig::default())
}

/// Initialize with custom configuration
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .compact());

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::info!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(())
}

/// Get the current session ID
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub show_target: bool,
    pub show_thread_ids: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from(&LogConfig::default())
    }
}

impl From<&LogConfig> for TelemetryConfig {
    fn from(config: &LogConfig) -> Self {
        Self {
            log_level: config.log_level.clone(),
            show_target: config.show_target,
            show_thread_ids: config.show_thread_ids,
        }
    }
}

impl TelemetryConfig {
    /// Force debug output, as `--verbose` does
    #[must_use]
    pub fn verbose(mut self) -> Self {
        self.log_level = "debug".to_string();
        self.show_target = true;
        self
    }
}

/// Metrics registry for collecting and exporting metrics
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, AtomicU64>>,
    gauges: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, Histogram>>,
    start_time: Instant,
}

impl MetricsRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Increment a counter by a specific amount
    pub fn increment_by(&self, name: &str, value: u64) {
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        } else {
            drop(counters);
            let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
            counters
                .entry(name.to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Current value of a counter, zero if never incremented
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        counters.get(name).map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Set a gauge value
    pub fn gauge(&self, name: &str, value: u64) {
        let mut gauges = self.gauges.write().unwrap_or_else(|e| e.into_inner());
        gauges
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Raise a gauge by one
    pub fn gauge_inc(&self, name: &str) {
        let mut gauges = self.gauges.write().unwrap_or_else(|e| e.into_inner());
        gauges
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Lower a gauge by one, saturating at zero
    pub fn gauge_dec(&self, name: &str) {
        let gauges = self.gauges.read().unwrap_or_else(|e| e.into_inner());
        if let Some(gauge) = gauges.get(name) {
            let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
        }
    }

    /// Current value of a gauge, zero if never set
    pub fn gauge_value(&self, name: &str) -> u64 {
        let gauges = self.gauges.read().unwrap_or_else(|e| e.into_inner());
        gauges.get(name).map_or(0, |g| g.load(Ordering::Relaxed))
    }

    /// Record a histogram value
    pub fn histogram(&self, name: &str, value: f64) {
        let mut histograms = self.histograms.write().unwrap_or_else(|e| e.into_inner());
        histograms
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    /// Summary of a histogram, empty if nothing was recorded
    pub fn histogram_stats(&self, name: &str) -> HistogramStats {
        let histograms = self.histograms.read().unwrap_or_else(|e| e.into_inner());
        histograms
            .get(name)
            .map_or_else(HistogramStats::empty, HistogramStats::from_histogram)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics as JSON
    pub fn export_json(&self) -> serde_json::Value {
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());
        let gauges = self.gauges.read().unwrap_or_else(|e| e.into_inner());
        let histograms = self.histograms.read().unwrap_or_else(|e| e.into_inner());

        let counter_values: HashMap<String, u64> = counters
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let gauge_values: HashMap<String, u64> = gauges
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let histogram_stats: HashMap<String, HistogramStats> = histograms
            .iter()
            .map(|(k, v)| (k.clone(), HistogramStats::from_histogram(v)))
            .collect();

        serde_json::json!({
            "session_id": session_id(),
            "uptime_secs": self.uptime_secs(),
            "counters": counter_values,
            "gauges": gauge_values,
            "histograms": histogram_stats,
        })
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Running summary plus a fixed window of recent samples
#[derive(Debug, Default)]
struct Histogram {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    samples: Vec<f64>,
    next: usize,
}

impl Histogram {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;

        if self.samples.len() < HISTOGRAM_SAMPLES {
            self.samples.push(value);
        } else {
            self.samples[self.next] = value;
        }
        self.next = (self.next + 1) % HISTOGRAM_SAMPLES;
    }
}

/// Histogram statistics
///
/// `count`, `min`, `max` and `mean` cover every recorded value; the
/// percentiles cover the most recent [`HISTOGRAM_SAMPLES`] values.
#[derive(Debug, Serialize)]
pub struct HistogramStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl HistogramStats {
    fn empty() -> Self {
        Self {
            count: 0,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            p50: 0.0,
            p95: 0.0,
            p99: 0.0,
        }
    }

    fn from_histogram(histogram: &Histogram) -> Self {
        if histogram.count == 0 {
            return Self::empty();
        }

        let mut sorted = histogram.samples.clone();
        sorted.sort_by(f64::total_cmp);

        Self {
            count: histogram.count,
            min: histogram.min,
            max: histogram.max,
            mean: histogram.sum / histogram.count as f64,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Get the global metrics registry
pub fn metrics() -> &'static MetricsRegistry {
    &METRICS
}

/// Shared handle to the global metrics registry
pub fn shared_metrics() -> Arc<MetricsRegistry> {
    Arc::clone(&METRICS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counter() {
        let registry = MetricsRegistry::new();
        registry.increment("test_counter");
        registry.increment("test_counter");
        registry.increment_by("test_counter", 3);

        assert_eq!(registry.counter("test_counter"), 5);
        assert_eq!(registry.counter("never_touched"), 0);
    }

    #[test]
    fn test_metrics_gauge() {
        let registry = MetricsRegistry::new();
        registry.gauge("test_gauge", 42);
        registry.gauge("test_gauge", 100);

        assert_eq!(registry.gauge_value("test_gauge"), 100);
    }

    #[test]
    fn test_gauge_inc_dec_saturates() {
        let registry = MetricsRegistry::new();
        registry.gauge_inc(names::SUBSCRIBERS);
        registry.gauge_inc(names::SUBSCRIBERS);
        registry.gauge_dec(names::SUBSCRIBERS);
        assert_eq!(registry.gauge_value(names::SUBSCRIBERS), 1);

        registry.gauge_dec(names::SUBSCRIBERS);
        registry.gauge_dec(names::SUBSCRIBERS);
        assert_eq!(registry.gauge_value(names::SUBSCRIBERS), 0);
    }

    #[test]
    fn test_histogram_stats() {
        let registry = MetricsRegistry::new();
        for value in 1..=10 {
            registry.histogram("test_histogram", f64::from(value));
        }
        let stats = registry.histogram_stats("test_histogram");

        assert_eq!(stats.count, 10);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.mean, 5.5);
        assert_eq!(registry.histogram_stats("never_recorded").count, 0);
    }

    #[test]
    fn test_histogram_keeps_bounded_window() {
        let mut histogram = Histogram::default();
        let total = HISTOGRAM_SAMPLES * 3;
        for value in 0..total {
            histogram.record(value as f64);
        }

        assert_eq!(histogram.samples.len(), HISTOGRAM_SAMPLES);

        let stats = HistogramStats::from_histogram(&histogram);
        assert_eq!(stats.count, total as u64);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, (total - 1) as f64);
        // Percentiles only see the newest window
        assert!(stats.p50 >= (total - HISTOGRAM_SAMPLES) as f64);
    }

    #[test]
    fn test_export_json_shape() {
        let registry = MetricsRegistry::new();
        registry.increment(names::GENERATED);
        registry.histogram(names::DELIVERY_MS, 12.0);

        let json = registry.export_json();
        assert_eq!(json["counters"][names::GENERATED], 1);
        assert_eq!(json["histograms"][names::DELIVERY_MS]["count"], 1);
    }

    #[test]
    fn test_shared_metrics_is_the_global_registry() {
        let shared = shared_metrics();
        shared.increment("test_shared_counter");
        assert!(metrics().counter("test_shared_counter") >= 1);
    }

    #[test]
    fn test_telemetry_config_from_log_config() {
        let log = LogConfig {
            log_level: "warn".to_string(),
            show_target: true,
            show_thread_ids: false,
        };
        let config = TelemetryConfig::from(&log);
        assert_eq!(config.log_level, "warn");
        assert!(config.show_target);
        assert_eq!(config.verbose().log_level, "debug");
    }

    #[test]
    fn test_session_id() {
        let id = session_id();
        assert!(!id.is_empty());
        assert!(Uuid::parse_str(id).is_ok());
    }
}
