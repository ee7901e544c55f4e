//! Latency collection and benchmark results.

use hdrhistogram::Histogram;
use partitioned_array::PoolStats;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Collects per-iteration latencies of a benchmark run.
pub struct MetricsCollector {
    histogram: Histogram<u64>,
    iterations_total: u64,
    iterations_failed: u64,
    peak_in_flight: usize,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            histogram: Histogram::new(3)?,
            iterations_total: 0,
            iterations_failed: 0,
            peak_in_flight: 0,
        })
    }

    /// Record a completed iteration.
    pub fn record_success(&mut self, latency: Duration) {
        self.iterations_total += 1;
        self.histogram.record(latency.as_micros() as u64).ok();
    }

    /// Record an iteration that ended in an error.
    pub fn record_failure(&mut self) {
        self.iterations_total += 1;
        self.iterations_failed += 1;
    }

    /// Record how many iterations were in flight when one was started.
    pub fn record_in_flight(&mut self, in_flight: usize) {
        self.peak_in_flight = self.peak_in_flight.max(in_flight);
    }

    pub fn iterations_total(&self) -> u64 {
        self.iterations_total
    }

    /// Summarise the run.
    pub fn results(&self, run: RunInfo, elapsed: Duration, pool: PoolStats) -> BenchResults {
        let duration_secs = elapsed.as_secs_f64();
        let succeeded = self.iterations_total - self.iterations_failed;
        let iterations_per_second = if duration_secs > 0.0 {
            succeeded as f64 / duration_secs
        } else {
            0.0
        };

        BenchResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            scenario_name: run.scenario_name,
            workload: run.workload,
            shape: run.shape,
            partition_shape: run.partition_shape,
            localities: run.localities,
            max_in_flight: run.max_in_flight,
            duration_secs,
            total_iterations: self.iterations_total,
            failed_iterations: self.iterations_failed,
            iterations_per_second,
            cells_per_second: iterations_per_second * (run.shape[0] * run.shape[1]) as f64,
            peak_in_flight: self.peak_in_flight,
            latency_p50: self.percentile(50.0),
            latency_p90: self.percentile(90.0),
            latency_p95: self.percentile(95.0),
            latency_p99: self.percentile(99.0),
            latency_min: self.histogram.min() as f64 / 1000.0,
            latency_max: self.histogram.max() as f64 / 1000.0,
            latency_avg: self.histogram.mean() / 1000.0,
            pool_hits: pool.hits,
            pool_misses: pool.misses,
            pool_hit_rate: pool.hit_rate() * 100.0,
        }
    }

    fn percentile(&self, quantile: f64) -> f64 {
        self.histogram.value_at_percentile(quantile) as f64 / 1000.0
    }
}

/// Scenario settings recorded alongside the measurements.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub scenario_name: String,
    pub workload: String,
    pub shape: [usize; 2],
    pub partition_shape: [usize; 2],
    pub localities: usize,
    pub max_in_flight: usize,
}

/// Final benchmark results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchResults {
    pub timestamp: String,
    pub scenario_name: String,
    pub workload: String,
    pub shape: [usize; 2],
    pub partition_shape: [usize; 2],
    pub localities: usize,
    pub max_in_flight: usize,
    pub duration_secs: f64,
    pub total_iterations: u64,
    pub failed_iterations: u64,
    pub iterations_per_second: f64,
    pub cells_per_second: f64,
    pub peak_in_flight: usize,

    // Latency percentiles (ms)
    pub latency_p50: f64,
    pub latency_p90: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,

    pub pool_hits: u64,
    pub pool_misses: u64,
    pub pool_hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_info() -> RunInfo {
        RunInfo {
            scenario_name: "test".to_string(),
            workload: "focal_mean".to_string(),
            shape: [10, 10],
            partition_shape: [5, 5],
            localities: 1,
            max_in_flight: 2,
        }
    }

    #[test]
    fn test_results_summarise_latencies() {
        let mut metrics = MetricsCollector::new().unwrap();
        for ms in [10, 20, 30, 40] {
            metrics.record_success(Duration::from_millis(ms));
        }
        metrics.record_failure();
        metrics.record_in_flight(2);
        metrics.record_in_flight(1);

        let results = metrics.results(run_info(), Duration::from_secs(2), PoolStats::default());
        assert_eq!(results.total_iterations, 5);
        assert_eq!(results.failed_iterations, 1);
        assert_eq!(results.iterations_per_second, 2.0);
        assert_eq!(results.cells_per_second, 200.0);
        assert_eq!(results.peak_in_flight, 2);
        assert!((results.latency_min - 10.0).abs() < 0.1);
        assert!((results.latency_max - 40.0).abs() < 0.1);
    }

    #[test]
    fn test_empty_run() {
        let metrics = MetricsCollector::new().unwrap();
        let results = metrics.results(run_info(), Duration::ZERO, PoolStats::default());
        assert_eq!(results.iterations_per_second, 0.0);
        assert_eq!(results.pool_hit_rate, 0.0);
    }
}
