//! Benchmark orchestration.

use crate::config::{ScenarioConfig, Workload};
use crate::generator::{InputGenerator, WorkloadInputs};
use crate::metrics::{BenchResults, MetricsCollector, RunInfo};
use partitioned_array::{Backpressure, Context, PartitionedRaster, Result};
use raster_algorithms::focal::{self, focal_mean};
use raster_algorithms::routing::{accu_threshold, kinematic_wave};
use raster_algorithms::zonal::{statistics, zonal_sum};
use raster_algorithms::box_kernel;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs a scenario's workload repeatedly with a bounded number of
/// iterations in flight.
pub struct BenchRunner {
    config: ScenarioConfig,
}

impl BenchRunner {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    /// Run the benchmark.
    pub async fn run(&self) -> anyhow::Result<BenchResults> {
        self.config.validate()?;

        let ctx = Context::new(self.config.engine_config())?;
        let backpressure = Backpressure::new(self.config.max_in_flight)?;

        info!(
            scenario = %self.config.name,
            workload = self.config.workload.name(),
            rows = self.config.shape[0],
            cols = self.config.shape[1],
            localities = self.config.localities,
            "Generating inputs"
        );
        let mut inputs = InputGenerator::new(self.config.clone()).inputs(&ctx).await?;

        if self.config.warmup_iterations > 0 {
            info!(iterations = self.config.warmup_iterations, "Warming up");
            let mut warmup = MetricsCollector::new()?;
            self.iterate(&backpressure, &mut inputs, self.config.warmup_iterations, &mut warmup)
                .await?;
        }

        info!(iterations = self.config.iterations, "Starting benchmark");
        let mut metrics = MetricsCollector::new()?;
        let start = Instant::now();
        self.iterate(&backpressure, &mut inputs, self.config.iterations, &mut metrics)
            .await?;
        let elapsed = start.elapsed();

        let pool = ctx.pool().stats();
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            pool_hit_rate = pool.hit_rate(),
            "Benchmark finished"
        );

        Ok(metrics.results(self.run_info(), elapsed, pool))
    }

    async fn iterate(
        &self,
        backpressure: &Backpressure,
        inputs: &mut WorkloadInputs,
        iterations: usize,
        metrics: &mut MetricsCollector,
    ) -> anyhow::Result<()> {
        let mut pending = Vec::with_capacity(iterations);

        for iteration in 0..iterations {
            // The output's partition tasks start inside the slot
            let handle = backpressure
                .submit_with(|| {
                    let output = self.step(inputs)?;
                    metrics.record_in_flight(backpressure.in_flight());
                    let submitted = Instant::now();
                    Ok(async move { output.wait().await.map(|()| submitted.elapsed()) })
                })
                .await?;
            debug!(iteration, in_flight = backpressure.in_flight(), "Iteration submitted");
            pending.push(handle);
        }

        for handle in pending {
            match handle.join().await {
                Ok(latency) => metrics.record_success(latency),
                Err(err) => {
                    warn!(error = %err, "Iteration failed");
                    metrics.record_failure();
                }
            }
        }

        Ok(())
    }

    /// Build the next iteration's output. The kinematic wave feeds each
    /// result back in as the following step's current outflow.
    fn step(&self, inputs: &mut WorkloadInputs) -> Result<IterationOutput> {
        let output = match (&self.config.workload, inputs) {
            (Workload::FocalMean { radius }, WorkloadInputs::Focal { values }) => {
                IterationOutput::Single(focal_mean(
                    &focal::value_policies(),
                    values,
                    &box_kernel(*radius),
                )?)
            }
            (
                Workload::AccuThreshold { threshold },
                WorkloadInputs::Accumulation {
                    flow_direction,
                    inflow,
                },
            ) => {
                let (flux, state) = accu_threshold(
                    &raster_algorithms::routing::accu_threshold::value_policies(),
                    flow_direction,
                    inflow,
                    *threshold,
                )?;
                IterationOutput::Pair(flux, state)
            }
            (
                Workload::KinematicWave {
                    alpha,
                    beta,
                    time_step_duration,
                    channel_length,
                },
                WorkloadInputs::KinematicWave {
                    flow_direction,
                    current_outflow,
                    lateral_inflow,
                },
            ) => {
                let outflow = kinematic_wave(
                    &raster_algorithms::routing::kinematic_wave::value_policies(),
                    flow_direction,
                    current_outflow,
                    lateral_inflow,
                    *alpha,
                    *beta,
                    *time_step_duration,
                    *channel_length,
                )?;
                *current_outflow = outflow.clone();
                IterationOutput::Single(outflow)
            }
            (Workload::ZonalSum { .. }, WorkloadInputs::Zonal { values, zones }) => {
                IterationOutput::Single(zonal_sum(&statistics::value_policies(), values, zones)?)
            }
            _ => {
                return Err(partitioned_array::ArrayError::configuration(
                    "generated inputs do not match the workload",
                ))
            }
        };
        Ok(output)
    }

    fn run_info(&self) -> RunInfo {
        RunInfo {
            scenario_name: self.config.name.clone(),
            workload: self.config.workload.name().to_string(),
            shape: self.config.shape,
            partition_shape: self.config.partition_shape,
            localities: self.config.localities,
            max_in_flight: self.config.max_in_flight,
        }
    }
}

/// Arrays produced by one iteration.
enum IterationOutput {
    Single(PartitionedRaster<f64>),
    Pair(PartitionedRaster<f32>, PartitionedRaster<f32>),
}

impl IterationOutput {
    async fn wait(self) -> Result<()> {
        match self {
            Self::Single(array) => array.wait().await,
            Self::Pair(first, second) => {
                first.wait().await?;
                second.wait().await
            }
        }
    }
}
