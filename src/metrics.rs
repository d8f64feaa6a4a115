//! In-memory metrics collection.
//!
//! Installs a recorder for the `metrics` facade so the `counter!` /
//! `gauge!` / `histogram!` calls sprinkled through the crate land in one
//! process-local registry, exported in Prometheus text format at `/metrics`
//! and as JSON at `/metrics/json`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::{Key, KeyName, Recorder, SharedString, Unit};
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl metrics::CounterFn for Counter {
    fn increment(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    fn absolute(&self, value: u64) {
        self.value.fetch_max(value, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Gauge {
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn update(&self, f: impl Fn(f64) -> f64) {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self.bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

impl metrics::GaugeFn for Gauge {
    fn increment(&self, value: f64) {
        self.update(|v| v + value);
    }

    fn decrement(&self, value: f64) {
        self.update(|v| v - value);
    }

    fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Histogram {
    count: Arc<AtomicU64>,
    sum_bits: Arc<AtomicU64>,
}

impl Histogram {
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }
}

impl metrics::HistogramFn for Histogram {
    fn record(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let mut current = self.sum_bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self.sum_bits.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

#[derive(Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Counter>>,
    gauges: RwLock<HashMap<String, Gauge>>,
    histograms: RwLock<HashMap<String, Histogram>>,
}

impl MetricsRegistry {
    fn get_or_create_counter(&self, name: &str) -> Counter {
        if let Some(counter) = self.counters.read().ok().and_then(|m| m.get(name).cloned()) {
            return counter;
        }
        match self.counters.write() {
            Ok(mut map) => map.entry(name.to_string()).or_default().clone(),
            Err(_) => Counter::default(),
        }
    }

    fn get_or_create_gauge(&self, name: &str) -> Gauge {
        if let Some(gauge) = self.gauges.read().ok().and_then(|m| m.get(name).cloned()) {
            return gauge;
        }
        match self.gauges.write() {
            Ok(mut map) => map.entry(name.to_string()).or_default().clone(),
            Err(_) => Gauge::default(),
        }
    }

    fn get_or_create_histogram(&self, name: &str) -> Histogram {
        if let Some(histogram) = self
            .histograms
            .read()
            .ok()
            .and_then(|m| m.get(name).cloned())
        {
            return histogram;
        }
        match self.histograms.write() {
            Ok(mut map) => map.entry(name.to_string()).or_default().clone(),
            Err(_) => Histogram::default(),
        }
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn export_text(&self) -> Result<String, MetricsError> {
        let mut out = String::new();

        let counters = self
            .counters
            .read()
            .map_err(|e| MetricsError::ExportError(e.to_string()))?;
        let mut names: Vec<_> = counters.keys().collect();
        names.sort();
        for name in names {
            if let Some(counter) = counters.get(name) {
                out.push_str(&format!("# TYPE {} counter\n", base_name(name)));
                out.push_str(&format!("{} {}\n", name, counter.get()));
            }
        }

        let gauges = self
            .gauges
            .read()
            .map_err(|e| MetricsError::ExportError(e.to_string()))?;
        let mut names: Vec<_> = gauges.keys().collect();
        names.sort();
        for name in names {
            if let Some(gauge) = gauges.get(name) {
                out.push_str(&format!("# TYPE {} gauge\n", base_name(name)));
                out.push_str(&format!("{} {}\n", name, gauge.get()));
            }
        }

        let histograms = self
            .histograms
            .read()
            .map_err(|e| MetricsError::ExportError(e.to_string()))?;
        let mut names: Vec<_> = histograms.keys().collect();
        names.sort();
        for name in names {
            if let Some(histogram) = histograms.get(name) {
                out.push_str(&format!("# TYPE {} summary\n", base_name(name)));
                out.push_str(&format!("{}_sum {}\n", base_name(name), histogram.sum()));
                out.push_str(&format!(
                    "{}_count {}\n",
                    base_name(name),
                    histogram.count()
                ));
            }
        }

        Ok(out)
    }

    pub fn export_json(&self) -> Result<serde_json::Value, MetricsError> {
        let counters = self
            .counters
            .read()
            .map_err(|e| MetricsError::ExportError(e.to_string()))?;
        let gauges = self
            .gauges
            .read()
            .map_err(|e| MetricsError::ExportError(e.to_string()))?;
        let histograms = self
            .histograms
            .read()
            .map_err(|e| MetricsError::ExportError(e.to_string()))?;

        Ok(json!({
            "counters": counters
                .iter()
                .map(|(name, c)| (name.clone(), json!(c.get())))
                .collect::<serde_json::Map<_, _>>(),
            "gauges": gauges
                .iter()
                .map(|(name, g)| (name.clone(), json!(g.get())))
                .collect::<serde_json::Map<_, _>>(),
            "histograms": histograms
                .iter()
                .map(|(name, h)| {
                    (name.clone(), json!({"count": h.count(), "sum": h.sum()}))
                })
                .collect::<serde_json::Map<_, _>>(),
        }))
    }
}

static REGISTRY: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::default);

pub fn registry() -> &'static MetricsRegistry {
    &REGISTRY
}

// Dotted metric names become Prometheus-safe; labels render inline.
fn format_key(key: &Key) -> String {
    let name = key.name().replace('.', "_");
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}=\"{}\"", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        name
    } else {
        format!("{}{{{}}}", name, labels.join(","))
    }
}

fn base_name(name: &str) -> &str {
    name.split('{').next().unwrap_or(name)
}

struct RegistryRecorder;

impl Recorder for RegistryRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key) -> metrics::Counter {
        metrics::Counter::from_arc(Arc::new(REGISTRY.get_or_create_counter(&format_key(key))))
    }

    fn register_gauge(&self, key: &Key) -> metrics::Gauge {
        metrics::Gauge::from_arc(Arc::new(REGISTRY.get_or_create_gauge(&format_key(key))))
    }

    fn register_histogram(&self, key: &Key) -> metrics::Histogram {
        metrics::Histogram::from_arc(Arc::new(REGISTRY.get_or_create_histogram(&format_key(key))))
    }
}

static RECORDER: RegistryRecorder = RegistryRecorder;

/// Installs the registry as the global recorder for the `metrics` facade.
/// Safe to call more than once; later calls are no-ops.
pub fn init_metrics() {
    if metrics::set_recorder(&RECORDER).is_err() {
        warn!("Metrics recorder was already installed");
    }
}

/// Prometheus text endpoint
pub async fn metrics_handler() -> Result<String, MetricsError> {
    REGISTRY.export_text()
}

/// JSON metrics endpoint
pub async fn metrics_json_handler() -> Result<axum::Json<serde_json::Value>, MetricsError> {
    REGISTRY.export_json().map(axum::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{CounterFn, HistogramFn};

    #[test]
    fn counters_accumulate() {
        let counter = REGISTRY.get_or_create_counter("test_counter_accumulates");
        counter.increment(2);
        counter.increment(3);
        assert_eq!(counter.get(), 5);

        let again = REGISTRY.get_or_create_counter("test_counter_accumulates");
        assert_eq!(again.get(), 5);
    }

    #[test]
    fn histograms_track_count_and_sum() {
        let histogram = REGISTRY.get_or_create_histogram("test_histogram_sums");
        histogram.record(0.5);
        histogram.record(1.5);
        assert_eq!(histogram.count(), 2);
        assert!((histogram.sum() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn text_export_names_are_prometheus_safe() {
        let key = Key::from_parts("a.b.c", vec![metrics::Label::new("dir", "in")]);
        assert_eq!(format_key(&key), "a_b_c{dir=\"in\"}");
        assert_eq!(base_name("a_b_c{dir=\"in\"}"), "a_b_c");
    }
}
