//! Analysis metrics and statistics tracking.

use crate::models::InferenceMode;
use crate::types::{AnalysisResult, DefectClass, NUM_CLASSES};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for analysis calls
pub struct AnalysisMetrics {
    /// Successful analyses
    pub analyses_completed: AtomicU64,
    /// Analyses that returned an error
    pub analyses_failed: AtomicU64,
    /// Analyses answered by mock inference
    pub mock_analyses: AtomicU64,
    /// Views processed across all analyses
    pub views_processed: AtomicU64,
    /// Predictions per defect class
    class_counts: RwLock<[u64; NUM_CLASSES]>,
    /// Analysis latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Anomaly score distribution buckets (0-10, 10-20, ... 90-100)
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl AnalysisMetrics {
    pub fn new() -> Self {
        Self {
            analyses_completed: AtomicU64::new(0),
            analyses_failed: AtomicU64::new(0),
            mock_analyses: AtomicU64::new(0),
            views_processed: AtomicU64::new(0),
            class_counts: RwLock::new([0; NUM_CLASSES]),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successful analysis
    pub fn record_analysis(
        &self,
        latency: Duration,
        views: usize,
        mode: InferenceMode,
        result: &AnalysisResult,
    ) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
        self.views_processed.fetch_add(views as u64, Ordering::Relaxed);
        if mode == InferenceMode::Mock {
            self.mock_analyses.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only the most recent window
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut counts) = self.class_counts.write() {
            counts[result.predicted_class.index()] += 1;
        }

        let bucket = ((result.anomaly_score / 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_failure(&self) {
        self.analyses_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Latency statistics over the recent window
    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted: Vec<u64> = match self.latencies.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return LatencyStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Analyses per second since startup
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.analyses_completed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn class_distribution(&self) -> BTreeMap<&'static str, u64> {
        let counts = self.class_counts.read().map(|c| *c).unwrap_or([0; NUM_CLASSES]);
        DefectClass::ALL
            .iter()
            .map(|c| (c.label(), counts[c.index()]))
            .collect()
    }

    pub fn score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            analyses_completed: self.analyses_completed.load(Ordering::Relaxed),
            analyses_failed: self.analyses_failed.load(Ordering::Relaxed),
            mock_analyses: self.mock_analyses.load(Ordering::Relaxed),
            views_processed: self.views_processed.load(Ordering::Relaxed),
            throughput_per_sec: self.throughput(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            latency: self.latency_stats(),
            class_distribution: self.class_distribution(),
            score_distribution: self.score_distribution(),
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();

        info!(
            completed = snapshot.analyses_completed,
            failed = snapshot.analyses_failed,
            mock = snapshot.mock_analyses,
            views = snapshot.views_processed,
            throughput = format!("{:.2}/s", snapshot.throughput_per_sec),
            "Analysis metrics summary"
        );
        info!(
            mean_us = snapshot.latency.mean_us,
            p50_us = snapshot.latency.p50_us,
            p95_us = snapshot.latency.p95_us,
            p99_us = snapshot.latency.p99_us,
            "Analysis latency"
        );

        let total: u64 = snapshot.class_distribution.values().sum();
        for (label, count) in &snapshot.class_distribution {
            let pct = if total > 0 {
                (*count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            info!("  {:<16} {:>6} ({:>5.1}%)", label, count, pct);
        }
    }
}

impl Default for AnalysisMetrics {
    fn default() -> Self {
        Self::new()
    }
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

/// Point-in-time view of the metrics, served by the API
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub analyses_completed: u64,
    pub analyses_failed: u64,
    pub mock_analyses: u64,
    pub views_processed: u64,
    pub throughput_per_sec: f64,
    pub uptime_secs: u64,
    pub latency: LatencyStats,
    pub class_distribution: BTreeMap<&'static str, u64>,
    pub score_distribution: [u64; 10],
}

/// Logs a metrics summary at a fixed interval
pub struct MetricsReporter {
    metrics: Arc<AnalysisMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<AnalysisMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting loop
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassProbabilities;

    fn result(probs: [f64; NUM_CLASSES]) -> AnalysisResult {
        AnalysisResult::from_probabilities(ClassProbabilities::new(probs))
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = AnalysisMetrics::new();

        metrics.record_analysis(
            Duration::from_micros(100),
            2,
            InferenceMode::Mock,
            &result([0.55, 0.05, 0.1, 0.1, 0.1, 0.1]),
        );
        metrics.record_analysis(
            Duration::from_micros(300),
            3,
            InferenceMode::Model,
            &result([0.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
        );
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.analyses_completed, 2);
        assert_eq!(snapshot.analyses_failed, 1);
        assert_eq!(snapshot.mock_analyses, 1);
        assert_eq!(snapshot.views_processed, 5);
        assert_eq!(snapshot.class_distribution["crazing"], 1);
        assert_eq!(snapshot.class_distribution["scratches"], 1);
        assert_eq!(snapshot.score_distribution[5], 1);
        // A perfect score lands in the top bucket
        assert_eq!(snapshot.score_distribution[9], 1);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = AnalysisMetrics::new();
        assert_eq!(metrics.latency_stats().count, 0);

        let r = result([0.5, 0.1, 0.1, 0.1, 0.1, 0.1]);
        for us in 1..=100 {
            metrics.record_analysis(Duration::from_micros(us), 1, InferenceMode::Mock, &r);
        }

        let stats = metrics.latency_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.max_us, 100);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
    }
}
