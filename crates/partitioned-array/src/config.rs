//! Configuration for the partitioned array engine.

use serde::{Deserialize, Serialize};

/// Configuration for the engine context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of localities partitions are distributed over.
    pub nr_localities: usize,

    /// Number of iterations a [`Backpressure`](crate::Backpressure) built
    /// from this configuration allows in flight.
    pub max_in_flight_iterations: usize,

    /// Buffer recycling limits.
    #[serde(default)]
    pub buffer_pool: BufferPoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nr_localities: 1,
            max_in_flight_iterations: 2,
            buffer_pool: BufferPoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_NR_LOCALITIES") {
            if let Ok(n) = val.parse() {
                config.nr_localities = n;
            }
        }

        if let Ok(val) = std::env::var("RASTER_MAX_IN_FLIGHT") {
            if let Ok(n) = val.parse() {
                config.max_in_flight_iterations = n;
            }
        }

        config.buffer_pool = BufferPoolConfig::from_env();

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.nr_localities == 0 {
            return Err("nr_localities must be > 0".to_string());
        }

        if self.max_in_flight_iterations == 0 {
            return Err("max_in_flight_iterations must be > 0".to_string());
        }

        self.buffer_pool.validate()
    }
}

/// Limits of the buffer recycling pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferPoolConfig {
    /// Whether released buffers are kept for reuse at all.
    pub enabled: bool,

    /// Maximum number of idle buffers per element type and capacity tier.
    pub max_buffers_per_tier: usize,

    /// Memory budget for idle buffers in megabytes.
    pub max_pooled_mb: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_buffers_per_tier: 16,
            max_pooled_mb: 256,
        }
    }
}

impl BufferPoolConfig {
    /// Load pool configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_BUFFER_POOL_ENABLED") {
            config.enabled = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("RASTER_BUFFER_POOL_MAX_BUFFERS") {
            if let Ok(n) = val.parse() {
                config.max_buffers_per_tier = n;
            }
        }

        if let Ok(val) = std::env::var("RASTER_BUFFER_POOL_MAX_MB") {
            if let Ok(n) = val.parse() {
                config.max_pooled_mb = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.max_buffers_per_tier == 0 {
            return Err("max_buffers_per_tier must be > 0 when the pool is enabled".to_string());
        }

        Ok(())
    }

    /// Get the pool budget in bytes.
    pub fn max_pooled_bytes(&self) -> usize {
        self.max_pooled_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_pool.max_pooled_bytes(), 256 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = EngineConfig::default();
        config.nr_localities = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.max_in_flight_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.buffer_pool.max_buffers_per_tier = 0;
        assert!(config.validate().is_err());
        config.buffer_pool.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json() {
        let json = r#"{"nr_localities": 4, "max_in_flight_iterations": 3}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.nr_localities, 4);
        assert_eq!(config.buffer_pool, BufferPoolConfig::default());
    }
}
