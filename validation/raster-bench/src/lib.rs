//! Benchmark harness for the partitioned raster engine.
//!
//! Scenarios describe an array and partition shape, a workload and how
//! many iterations may be in flight at once. The harness generates inputs,
//! runs the workload repeatedly under backpressure and reports latency
//! percentiles as a table, JSON or CSV.

pub mod config;
pub mod generator;
pub mod metrics;
pub mod report;
pub mod runner;

pub use config::{ScenarioConfig, Workload};
pub use generator::{InputGenerator, WorkloadInputs};
pub use metrics::{BenchResults, MetricsCollector, RunInfo};
pub use report::ResultsReport;
pub use runner::BenchRunner;
