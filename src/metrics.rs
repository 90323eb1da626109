//! Request metrics for the prediction service.

use crate::types::prediction::PredictionKind;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const LATENCY_WINDOW: usize = 10_000;

/// Metrics collector shared by all handlers
pub struct ServiceMetrics {
    /// Total successful predictions
    pub predictions_served: AtomicU64,
    /// Total failed prediction requests
    pub failures: AtomicU64,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Successful predictions per deployment
    per_deployment: RwLock<HashMap<String, u64>>,
    /// Predicted value counts per deployment (cluster and category kinds)
    outcomes: RwLock<HashMap<String, BTreeMap<String, u64>>>,
    /// Request latencies in microseconds, bounded window
    latencies: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            per_deployment: RwLock::new(HashMap::new()),
            outcomes: RwLock::new(HashMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(
        &self,
        deployment: &str,
        kind: PredictionKind,
        value: f64,
        latency: Duration,
    ) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut per) = self.per_deployment.write() {
            *per.entry(deployment.to_string()).or_insert(0) += 1;
        }

        if kind != PredictionKind::Regression {
            if let Ok(mut outcomes) = self.outcomes.write() {
                let key = crate::report::format_number(value);
                *outcomes
                    .entry(deployment.to_string())
                    .or_default()
                    .entry(key)
                    .or_insert(0) += 1;
            }
        }

        self.record_latency(latency);
    }

    /// Record a failed request
    pub fn record_failure(&self, kind: &str, latency: Duration) {
        self.failures.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }

        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only the most recent window
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }
    }

    /// Latency statistics over the current window
    pub fn latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Requests per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let total = self.predictions_served.load(Ordering::Relaxed)
            + self.failures.load(Ordering::Relaxed);
        if elapsed > 0.0 {
            total as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            throughput: self.throughput(),
            failures_by_kind: read_or_default(&self.failures_by_kind),
            per_deployment: read_or_default(&self.per_deployment),
            outcomes: read_or_default(&self.outcomes),
            latency: self.latency_stats(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let latency = &snapshot.latency;

        info!(
            served = snapshot.predictions_served,
            failures = snapshot.failures,
            throughput = format!("{:.2} req/s", snapshot.throughput),
            mean_us = latency.mean_us,
            p50_us = latency.p50_us,
            p95_us = latency.p95_us,
            p99_us = latency.p99_us,
            "Metrics summary"
        );
        for (deployment, count) in &snapshot.per_deployment {
            info!(deployment = %deployment, predictions = count, "Deployment summary");
        }
        for (kind, count) in &snapshot.failures_by_kind {
            info!(kind = %kind, count = count, "Failure summary");
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn read_or_default<T: Clone + Default>(lock: &RwLock<T>) -> T {
    lock.read().map(|v| v.clone()).unwrap_or_default()
}

/// Latency statistics
#[derive(Debug, Default, Clone, Serialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Point-in-time view served on `/metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub predictions_served: u64,
    pub failures: u64,
    pub throughput: f64,
    pub failures_by_kind: HashMap<String, u64>,
    pub per_deployment: HashMap<String, u64>,
    pub outcomes: HashMap<String, BTreeMap<String, u64>>,
    pub latency: LatencyStats,
}

/// Logs a metrics summary at a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
