//! Synthetic input generation.

use crate::config::{ScenarioConfig, Workload};
use partitioned_array::{Context, MemoryRaster, PartitionedRaster};
use rand::prelude::*;
use std::sync::Arc;
use raster_algorithms::flow_direction::{d8, d8_flow_direction};

/// Inputs of one workload, created once and reused by every iteration.
#[derive(Debug, Clone)]
pub enum WorkloadInputs {
    Focal {
        values: PartitionedRaster<f64>,
    },
    Accumulation {
        flow_direction: PartitionedRaster<u8>,
        inflow: PartitionedRaster<f32>,
    },
    KinematicWave {
        flow_direction: PartitionedRaster<u8>,
        current_outflow: PartitionedRaster<f64>,
        lateral_inflow: PartitionedRaster<f64>,
    },
    Zonal {
        values: PartitionedRaster<f64>,
        zones: PartitionedRaster<i32>,
    },
}

/// Generates reproducible rasters for a scenario.
pub struct InputGenerator {
    config: ScenarioConfig,
    rng: StdRng,
}

impl InputGenerator {
    pub fn new(config: ScenarioConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    fn nr_cells(&self) -> usize {
        self.config.shape[0] * self.config.shape[1]
    }

    /// Terrain sloping towards the south-east corner with random relief.
    pub fn elevation(&mut self) -> Vec<f64> {
        let [rows, cols] = self.config.shape;
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let slope = ((rows - row) + (cols - col)) as f64;
                data.push(slope + self.rng.gen_range(0.0..2.0));
            }
        }
        data
    }

    /// One value per cell drawn uniformly from `range`.
    pub fn uniform<T>(&mut self, range: std::ops::Range<T>) -> Vec<T>
    where
        T: rand::distributions::uniform::SampleUniform + PartialOrd + Copy,
    {
        (0..self.nr_cells())
            .map(|_| self.rng.gen_range(range.clone()))
            .collect()
    }

    /// Square blocks of `size` cells numbered row by row from 1.
    pub fn zones(&self, size: usize) -> Vec<i32> {
        let [rows, cols] = self.config.shape;
        let blocks_per_row = cols.div_ceil(size);
        (0..rows * cols)
            .map(|i| ((i / cols / size) * blocks_per_row + (i % cols) / size) as i32 + 1)
            .collect()
    }

    /// Load `data` through the region reader like any external dataset.
    fn raster<T: partitioned_array::Element>(
        &self,
        ctx: &Context,
        data: Vec<T>,
    ) -> anyhow::Result<PartitionedRaster<T>> {
        let source = MemoryRaster::from_vec(self.config.shape, data)?;
        Ok(PartitionedRaster::read_from(
            ctx,
            Arc::new(source),
            self.config.partition_shape,
        )?)
    }

    /// Create the workload's inputs in `ctx` and wait until they exist.
    pub async fn inputs(&mut self, ctx: &Context) -> anyhow::Result<WorkloadInputs> {
        let inputs = match self.config.workload.clone() {
            Workload::FocalMean { .. } => {
                let values = self.elevation();
                WorkloadInputs::Focal {
                    values: self.raster(ctx, values)?,
                }
            }
            Workload::AccuThreshold { .. } => {
                let flow_direction = self.flow_direction(ctx).await?;
                let inflow = self.uniform(0.0_f32..1.0);
                WorkloadInputs::Accumulation {
                    flow_direction,
                    inflow: self.raster(ctx, inflow)?,
                }
            }
            Workload::KinematicWave { .. } => {
                let flow_direction = self.flow_direction(ctx).await?;
                let current_outflow = self.uniform(0.0..50.0);
                let lateral_inflow = self.uniform(0.0..0.01);
                WorkloadInputs::KinematicWave {
                    flow_direction,
                    current_outflow: self.raster(ctx, current_outflow)?,
                    lateral_inflow: self.raster(ctx, lateral_inflow)?,
                }
            }
            Workload::ZonalSum { zone_size } => {
                let values = self.uniform(0.0..100.0);
                WorkloadInputs::Zonal {
                    values: self.raster(ctx, values)?,
                    zones: self.raster(ctx, self.zones(zone_size))?,
                }
            }
        };

        inputs.wait().await?;
        Ok(inputs)
    }

    async fn flow_direction(&mut self, ctx: &Context) -> anyhow::Result<PartitionedRaster<u8>> {
        let data = self.elevation();
        let elevation = self.raster(ctx, data)?;
        Ok(d8_flow_direction(&d8::value_policies(), &elevation)?)
    }
}

impl WorkloadInputs {
    async fn wait(&self) -> partitioned_array::Result<()> {
        match self {
            Self::Focal { values } => values.wait().await,
            Self::Accumulation {
                flow_direction,
                inflow,
            } => {
                flow_direction.wait().await?;
                inflow.wait().await
            }
            Self::KinematicWave {
                flow_direction,
                current_outflow,
                lateral_inflow,
            } => {
                flow_direction.wait().await?;
                current_outflow.wait().await?;
                lateral_inflow.wait().await
            }
            Self::Zonal { values, zones } => {
                values.wait().await?;
                zones.wait().await
            }
        }
    }
}
