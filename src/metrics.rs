//! Operational counters for a scan.
//!
//! The runner forwards the read statistics reported by the streams into a
//! [`MetricsCollector`]. These counters are informational only: they describe
//! where the bytes came from (local storage, a cache, a zero-copy view, a copy)
//! and never feed back into the histogram.
//!
//! # Example
//!
//! ```no_run
//! use bytehist::metrics::{MetricsCollector, BYTES_READ};
//! use bytehist::{Runner, ScanConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = MetricsCollector::new();
//! let runner = Runner::from_config(&ScanConfig::default())?.with_metrics(metrics.clone());
//! runner.run_paths(&["data/capture.bin"])?;
//!
//! metrics.print();
//! println!("{} bytes read", metrics.counter(BYTES_READ));
//! metrics.save_to_file("scan-metrics.json")?;
//! # Ok(())
//! # }
//! ```

use crate::io::fs::ReadStatistics;
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::any::Any;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const BYTES_READ: &str = "bytes_read";
pub const LOCAL_BYTES_READ: &str = "local_bytes_read";
pub const CACHED_BYTES_READ: &str = "cached_bytes_read";
pub const ZERO_COPY_BYTES_READ: &str = "zero_copy_bytes_read";
pub const COPIED_BYTES_READ: &str = "copied_bytes_read";
pub const RANGES_SCANNED: &str = "ranges_scanned";
pub const FILES_SCANNED: &str = "files_scanned";
pub const RELEASE_WARNINGS: &str = "release_warnings";

/// A named value that can be reported.
pub trait Metric: Send + Sync + Any {
    fn name(&self) -> &str;

    fn value(&self) -> Value;

    fn description(&self) -> Option<&str> {
        None
    }

    /// Cast to Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Thread-safe metric registry. Clones share the same metrics.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsCollectorInner>>,
}

struct MetricsCollectorInner {
    metrics: HashMap<String, Box<dyn Metric>>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsCollectorInner {
                metrics: HashMap::new(),
                start_time: None,
                end_time: None,
            })),
        }
    }

    /// Register a metric, replacing any metric of the same name.
    pub fn register(&self, metric: Box<dyn Metric>) {
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.insert(metric.name().to_string(), metric);
    }

    pub fn record_start(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.start_time = Some(Instant::now());
        inner.end_time = None;
    }

    pub fn record_end(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.end_time = Some(Instant::now());
    }

    /// Time between `record_start` and `record_end`, if both happened.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.inner.lock().unwrap();
        match (inner.start_time, inner.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Add `value` to a counter, creating it at zero first if needed.
    ///
    /// A non-counter metric registered under `name` is replaced.
    pub fn increment_counter(&self, name: &str, value: u64) {
        let mut inner = self.inner.lock().unwrap();
        let current = inner
            .metrics
            .get(name)
            .and_then(|m| m.as_any().downcast_ref::<CounterMetric>())
            .map_or(0, |c| c.count);
        inner.metrics.insert(
            name.to_string(),
            Box::new(CounterMetric::with_value(name, current + value)),
        );
    }

    pub fn set_counter(&self, name: &str, value: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .metrics
            .insert(name.to_string(), Box::new(CounterMetric::with_value(name, value)));
    }

    /// Current value of a counter; 0 if it was never touched.
    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner
            .metrics
            .get(name)
            .and_then(|m| m.as_any().downcast_ref::<CounterMetric>())
            .map_or(0, |c| c.count)
    }

    /// Forward a stream's read statistics into the byte counters.
    pub fn record_read_statistics(&self, stats: &ReadStatistics) {
        self.increment_counter(BYTES_READ, stats.total_bytes_read);
        self.increment_counter(LOCAL_BYTES_READ, stats.local_bytes_read);
        self.increment_counter(CACHED_BYTES_READ, stats.cached_bytes_read);
        self.increment_counter(ZERO_COPY_BYTES_READ, stats.zero_copy_bytes_read);
        self.increment_counter(COPIED_BYTES_READ, stats.copied_bytes_read());
    }

    /// All metrics as one JSON object, plus `execution_time_ms` when timed.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let inner = self.inner.lock().unwrap();
        let mut metrics_json = serde_json::Map::new();

        for (name, metric) in &inner.metrics {
            let mut metric_obj = serde_json::Map::new();
            metric_obj.insert("value".to_string(), metric.value());
            if let Some(desc) = metric.description() {
                metric_obj.insert("description".to_string(), json!(desc));
            }
            metrics_json.insert(name.clone(), Value::Object(metric_obj));
        }

        if let (Some(start), Some(end)) = (inner.start_time, inner.end_time) {
            let elapsed_ms = end.duration_since(start).as_millis();
            metrics_json.insert(
                "execution_time_ms".to_string(),
                json!({ "value": elapsed_ms, "description": "Wall time of the scan in milliseconds" }),
            );
        }
        drop(inner);
        Value::Object(metrics_json)
    }

    /// Human-readable dump to stdout, sorted by name.
    pub fn print(&self) {
        println!("\n=========== Scan Metrics ===========");
        let inner = self.inner.lock().unwrap();
        if let (Some(start), Some(end)) = (inner.start_time, inner.end_time) {
            let elapsed = end.duration_since(start);
            println!(
                "Execution Time: {:.3}s ({} ms)",
                elapsed.as_secs_f64(),
                elapsed.as_millis()
            );
            println!("------------------------------------");
        }
        let mut sorted: Vec<_> = inner.metrics.iter().collect();
        sorted.sort_by_key(|(name, _)| *name);
        for (name, metric) in sorted {
            match metric.description() {
                Some(desc) => println!("{name}: {} ({desc})", metric.value()),
                None => println!("{name}: {}", metric.value()),
            }
        }
        drop(inner);
        println!("====================================\n");
    }

    /// Write [`to_json`](Self::to_json) pretty-printed to `path`.
    ///
    /// # Errors
    /// If the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Name to value for every registered metric.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.value()))
            .collect()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Built-in Metrics ==========

/// A monotonically growing count.
pub struct CounterMetric {
    name: String,
    count: u64,
}

impl CounterMetric {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_value(name, 0)
    }

    pub fn with_value(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

impl Metric for CounterMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        json!(self.count)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A point-in-time value such as throughput.
pub struct GaugeMetric {
    name: String,
    value: f64,
    description: Option<String>,
}

impl GaugeMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Metric for GaugeMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        json!(self.value)
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
