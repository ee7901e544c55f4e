//! Engine context shared by arrays created together.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::dataflow::Backpressure;
use crate::error::{ArrayError, Result};
use crate::locality::Cluster;
use crate::pool::BufferPool;

struct ContextInner {
    config: EngineConfig,
    cluster: Cluster,
    pool: BufferPool,
}

/// Cheaply clonable handle to the configuration, localities and buffer
/// pool used when creating partitions.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a context from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().map_err(ArrayError::Configuration)?;

        let cluster = Cluster::new(config.nr_localities);
        let pool = BufferPool::new(config.buffer_pool.clone());

        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                cluster,
                pool,
            }),
        })
    }

    /// Create a context configured from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(EngineConfig::from_env())
    }

    /// Context with `nr_localities` localities and default settings otherwise.
    pub fn with_localities(nr_localities: usize) -> Result<Self> {
        Self::new(EngineConfig {
            nr_localities,
            ..EngineConfig::default()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn cluster(&self) -> &Cluster {
        &self.inner.cluster
    }

    pub fn pool(&self) -> &BufferPool {
        &self.inner.pool
    }

    /// Iteration limiter sized by `max_in_flight_iterations`.
    pub fn backpressure(&self) -> Backpressure {
        Backpressure::with_limit(self.inner.config.max_in_flight_iterations)
    }
}

impl Default for Context {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            inner: Arc::new(ContextInner {
                cluster: Cluster::new(config.nr_localities),
                pool: BufferPool::new(config.buffer_pool.clone()),
                config,
            }),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.inner.config)
            .field("cluster", &self.inner.cluster)
            .finish()
    }
}
