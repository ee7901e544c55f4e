//! Results reporting and formatting.

use crate::metrics::BenchResults;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

/// Formats benchmark results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(results: &BenchResults) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Benchmark Results: {}", results.scenario_name)]);

        table.add_row(vec!["Workload:", &results.workload]);
        table.add_row(vec![
            "Array / partition:",
            &format!(
                "{}x{} / {}x{}",
                results.shape[0],
                results.shape[1],
                results.partition_shape[0],
                results.partition_shape[1]
            ),
        ]);
        table.add_row(vec![
            "Localities / in flight:",
            &format!("{} / {}", results.localities, results.max_in_flight),
        ]);
        table.add_row(vec![
            "Peak in flight:",
            &format!("{}", results.peak_in_flight),
        ]);
        table.add_row(vec!["Duration:", &format!("{:.2}s", results.duration_secs)]);
        table.add_row(vec![
            "Iterations:",
            &format!(
                "{} ({} failed)",
                results.total_iterations, results.failed_iterations
            ),
        ]);
        table.add_row(vec![
            "Iterations/sec:",
            &format!("{:.2}", results.iterations_per_second),
        ]);
        table.add_row(vec![
            "Cells/sec:",
            &format!("{:.2}M", results.cells_per_second / 1_000_000.0),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                results.latency_p50,
                results.latency_p90,
                results.latency_p95,
                results.latency_p99,
                results.latency_max
            ),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec![
            "Buffer Pool Hit Rate:",
            &format!("{:.1}%", results.pool_hit_rate),
        ]);

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(results: &BenchResults) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    /// Format results as CSV row.
    pub fn format_csv(results: &BenchResults) -> String {
        format!(
            "{},{},{},{}x{},{}x{},{},{:.2},{:.1},{:.1},{:.1},{:.1}",
            results.timestamp,
            results.scenario_name,
            results.workload,
            results.shape[0],
            results.shape[1],
            results.partition_shape[0],
            results.partition_shape[1],
            results.total_iterations,
            results.iterations_per_second,
            results.latency_p50,
            results.latency_p90,
            results.latency_p99,
            results.pool_hit_rate
        )
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,scenario,workload,shape,partition_shape,iterations,ips,p50,p90,p99,pool_hit_rate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricsCollector, RunInfo};
    use partitioned_array::PoolStats;
    use std::time::Duration;

    fn results() -> BenchResults {
        let mut metrics = MetricsCollector::new().unwrap();
        metrics.record_success(Duration::from_millis(5));
        let run = RunInfo {
            scenario_name: "small".to_string(),
            workload: "zonal_sum".to_string(),
            shape: [8, 8],
            partition_shape: [4, 4],
            localities: 2,
            max_in_flight: 2,
        };
        metrics.results(run, Duration::from_secs(1), PoolStats::default())
    }

    #[test]
    fn test_csv_matches_header() {
        let row = ResultsReport::format_csv(&results());
        assert_eq!(
            row.split(',').count(),
            ResultsReport::csv_header().split(',').count()
        );
        assert!(row.contains(",small,zonal_sum,8x8,4x4,1,"));
    }

    #[test]
    fn test_json_and_table() {
        let results = results();
        let json = ResultsReport::format_json(&results).unwrap();
        let parsed: BenchResults = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.workload, "zonal_sum");
        assert!(ResultsReport::format_table(&results).contains("Benchmark Results: small"));
    }
}
