//! Scenario loading and validation.

use partitioned_array::{EngineConfig, Shape};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Benchmark scenario loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub shape: Shape<2>,
    pub partition_shape: Shape<2>,
    #[serde(default = "default_localities")]
    pub localities: usize,
    pub iterations: usize,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default)]
    pub warmup_iterations: usize,
    #[serde(default)]
    pub seed: Option<u64>, // Optional RNG seed for reproducible inputs
    pub workload: Workload,
}

fn default_localities() -> usize {
    1
}

fn default_max_in_flight() -> usize {
    2
}

/// Computation repeated in every iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Workload {
    FocalMean {
        #[serde(default = "default_radius")]
        radius: usize,
    },
    AccuThreshold {
        #[serde(default = "default_threshold")]
        threshold: f32,
    },
    KinematicWave {
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_beta")]
        beta: f64,
        #[serde(default = "default_time_step")]
        time_step_duration: f64,
        #[serde(default = "default_channel_length")]
        channel_length: f64,
    },
    ZonalSum {
        #[serde(default = "default_zone_size")]
        zone_size: usize,
    },
}

fn default_radius() -> usize {
    1
}

fn default_threshold() -> f32 {
    1.5
}

fn default_alpha() -> f64 {
    1.5
}

fn default_beta() -> f64 {
    0.6
}

fn default_time_step() -> f64 {
    15.0
}

fn default_channel_length() -> f64 {
    10.0
}

fn default_zone_size() -> usize {
    16
}

impl Workload {
    /// Parse a workload name with default parameters.
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        Ok(match name {
            "focal_mean" => Self::FocalMean {
                radius: default_radius(),
            },
            "accu_threshold" => Self::AccuThreshold {
                threshold: default_threshold(),
            },
            "kinematic_wave" => Self::KinematicWave {
                alpha: default_alpha(),
                beta: default_beta(),
                time_step_duration: default_time_step(),
                channel_length: default_channel_length(),
            },
            "zonal_sum" => Self::ZonalSum {
                zone_size: default_zone_size(),
            },
            other => anyhow::bail!(
                "unknown workload '{}', expected focal_mean, accu_threshold, kinematic_wave or zonal_sum",
                other
            ),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FocalMean { .. } => "focal_mean",
            Self::AccuThreshold { .. } => "accu_threshold",
            Self::KinematicWave { .. } => "kinematic_wave",
            Self::ZonalSum { .. } => "zonal_sum",
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScenarioConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the scenario.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.iterations == 0 {
            anyhow::bail!("iterations must be > 0");
        }
        if self.max_in_flight == 0 {
            anyhow::bail!("max_in_flight must be > 0");
        }
        for (extent, partition) in self.shape.iter().zip(&self.partition_shape) {
            if *partition == 0 || extent % partition != 0 {
                anyhow::bail!(
                    "partition shape {:?} does not tile array shape {:?}",
                    self.partition_shape,
                    self.shape
                );
            }
        }
        if let Workload::ZonalSum { zone_size: 0 } = self.workload {
            anyhow::bail!("zone_size must be > 0");
        }
        self.engine_config()
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
    }

    /// Engine configuration for this scenario.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            nr_localities: self.localities,
            max_in_flight_iterations: self.max_in_flight,
            ..EngineConfig::from_env()
        }
    }
}
