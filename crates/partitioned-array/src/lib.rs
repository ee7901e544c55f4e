//! Partitioned N-Dimensional Arrays
//!
//! This crate provides the data model of the raster engine: very large
//! regular arrays split into partitions that are owned by independent
//! actors and computed asynchronously.
//!
//! - **Ownership**: every partition lives in one actor task pinned to a
//!   locality; clients only hold lightweight handles
//! - **Value semantics**: operations create new arrays instead of touching
//!   existing partitions, so pipelines can run ahead of their inputs
//! - **Backpressure**: iteration limiters bound how much work is in flight
//!
//! # Architecture
//!
//! ```text
//! PartitionedArray::from_tasks(ctx, shape, partition_shape, make_task)
//!      │
//!      ├─► Validate exact tiling (ConfigurationError otherwise)
//!      │
//!      ├─► For each partition: place on a locality, spawn its actor
//!      │         │
//!      │         └─► Actor awaits its task, then serves requests:
//!      │             offset / shape / data / slice / fill / set_data
//!      │
//!      └─► Return handle grid immediately
//! ```
//!
//! # Example
//!
//! ```ignore
//! use partitioned_array::{Context, PartitionedArray};
//!
//! let ctx = Context::with_localities(2)?;
//! let array = PartitionedArray::from_vec(&ctx, [4, 4], [2, 2], (0..16).collect())?;
//! assert_eq!(array.to_vec().await?, (0..16).collect::<Vec<i32>>());
//! ```

pub mod array;
pub mod config;
pub mod context;
pub mod dataflow;
pub mod element;
pub mod error;
pub mod io;
pub mod locality;
pub mod partition;
pub mod pool;
pub mod shape;

// Re-export commonly used types at crate root
pub use array::{partition_region, PartitionedArray, PartitionedRaster};
pub use config::{BufferPoolConfig, EngineConfig};
pub use context::Context;
pub use dataflow::{spawn_compute, spawn_task, when_all, Backpressure, Iteration};
pub use element::{Element, FloatElement, ZoneElement};
pub use error::{ArrayError, Result};
pub use io::{MemoryRaster, RegionSink, RegionSource};
pub use locality::{Cluster, Locality, LocalityId};
pub use partition::{ArrayPartition, Buffer, CopyMode};
pub use pool::{optimal_capacity, BufferPool, PoolStats};
pub use shape::{copy_region, index_from_linear, linear_index, nr_elements, Offset, Region, Shape};
