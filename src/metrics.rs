//! Service metrics and statistics tracking.

use crate::models::id::ModelId;
use crate::service::PredictionReport;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the prediction service
pub struct ServiceMetrics {
    /// Predictions answered with a response
    pub requests_served: AtomicU64,
    /// Requests answered with an error reply
    pub requests_failed: AtomicU64,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Degraded item predictions by model
    degraded_by_model: RwLock<HashMap<ModelId, u64>>,
    /// Aggregate tier usage, keyed `<aggregate>:<source>`
    total_sources: RwLock<HashMap<String, u64>>,
    /// Request processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Model inference times (in microseconds)
    model_times: RwLock<HashMap<ModelId, Vec<u64>>>,
    started_at: DateTime<Utc>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_served: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            degraded_by_model: RwLock::new(HashMap::new()),
            total_sources: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            model_times: RwLock::new(HashMap::new()),
            started_at: Utc::now(),
            start_time: Instant::now(),
        }
    }

    /// Record a served prediction
    pub fn record_prediction(&self, processing_time: Duration, report: &PredictionReport) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut degraded) = self.degraded_by_model.write() {
            for model in &report.degraded {
                *degraded.entry(*model).or_insert(0) += 1;
            }
        }

        if let Ok(mut sources) = self.total_sources.write() {
            for (aggregate, total) in [
                (ModelId::MotionTotal, report.totals.motor),
                (ModelId::CognitiveTotal, report.totals.cognitive),
                (ModelId::Total, report.totals.total),
            ] {
                let key = format!("{}:{}", aggregate, total.source.as_str());
                *sources.entry(key).or_insert(0) += 1;
            }
        }

        for (model, elapsed) in &report.model_times {
            self.record_model_time(*model, *elapsed);
        }
    }

    /// Record a request answered with an error
    pub fn record_failure(&self, kind: &str) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Record model inference time
    pub fn record_model_time(&self, model: ModelId, duration: Duration) {
        if let Ok(mut times) = self.model_times.write() {
            let model_times = times.entry(model).or_default();
            model_times.push(duration.as_micros() as u64);
            if model_times.len() > 1000 {
                model_times.drain(0..500);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Get model performance stats
    pub fn get_model_stats(&self) -> HashMap<ModelId, ModelStats> {
        let mut stats = HashMap::new();
        let Ok(times) = self.model_times.read() else {
            return stats;
        };

        for (model, model_times) in times.iter() {
            if model_times.is_empty() {
                continue;
            }

            let mut sorted = model_times.clone();
            sorted.sort_unstable();

            let sum: u64 = sorted.iter().sum();
            let count = sorted.len();

            stats.insert(
                *model,
                ModelStats {
                    calls: count as u64,
                    mean_us: sum / count as u64,
                    p50_us: sorted[count / 2],
                    p99_us: sorted[(count as f64 * 0.99) as usize],
                },
            );
        }

        stats
    }

    /// Get degraded prediction counts by model
    pub fn get_degraded_by_model(&self) -> HashMap<ModelId, u64> {
        self.degraded_by_model
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Get aggregate tier usage
    pub fn get_total_sources(&self) -> HashMap<String, u64> {
        self.total_sources
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let served = self.requests_served.load(Ordering::Relaxed);
        let failed = self.requests_failed.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            since = %self.started_at.to_rfc3339(),
            served = served,
            failed = failed,
            throughput = format!("{:.2} req/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Service metrics summary"
        );

        if let Ok(by_kind) = self.failures_by_kind.read() {
            for (kind, count) in by_kind.iter() {
                info!(kind = %kind, count = count, "Failures");
            }
        }

        let mut degraded: Vec<_> = self.get_degraded_by_model().into_iter().collect();
        degraded.sort();
        for (model, count) in degraded {
            let pct = if served > 0 {
                count as f64 / served as f64 * 100.0
            } else {
                0.0
            };
            info!(model = %model, count = count, pct = format!("{:.1}%", pct), "Degraded predictions");
        }

        let mut sources: Vec<_> = self.get_total_sources().into_iter().collect();
        sources.sort();
        for (source, count) in sources {
            info!(source = %source, count = count, "Aggregate tier usage");
        }

        let mut model_stats: Vec<_> = self.get_model_stats().into_iter().collect();
        model_stats.sort_by_key(|(model, _)| *model);
        for (model, stats) in model_stats {
            info!(
                model = %model,
                calls = stats.calls,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "Model inference time"
            );
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Model-specific statistics
#[derive(Debug)]
pub struct ModelStats {
    pub calls: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
}

/// Periodic metrics reporter
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
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
