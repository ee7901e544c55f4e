//! Raster Algorithms over Partitioned Arrays
//!
//! Every algorithm takes a [`Policies`](policy::Policies) value as its
//! first argument and returns new partitioned arrays immediately; their
//! partitions resolve as the per-partition tasks complete.
//!
//! - **Focal**: kernel-based neighbourhood aggregation using halos
//! - **Flow direction**: D8 directions and direct-neighbour operations
//! - **Routing**: flux accumulation and the kinematic wave, solved in
//!   upstream-before-downstream order across partitions
//! - **Zonal**: aggregation per zone and distributed ordering
//!
//! # Architecture
//!
//! ```text
//! algorithm(policies, inputs...)
//!      │
//!      ├─► Check alignment of the inputs (ConfigurationError otherwise)
//!      │
//!      ├─► For each output partition: build a task
//!      │         │
//!      │         ├─► focal: fetch halo, reduce rows on the blocking pool
//!      │         ├─► routing: solve ready cells, message downstream owners
//!      │         └─► zonal: await merged per-zone aggregates, scatter
//!      │
//!      └─► Return the output array handle
//! ```
//!
//! # Example
//!
//! ```ignore
//! use raster_algorithms::routing::{accu_threshold, accu_threshold::value_policies};
//!
//! let (flux, state) = accu_threshold(&value_policies(), &flow_direction, &inflow, 1.5)?;
//! let flux = flux.to_vec().await?;
//! ```

pub mod argument;
pub mod flow_direction;
pub mod focal;
mod halo;
pub mod kernel;
pub mod policy;
pub mod routing;
pub mod zonal;

// Re-export commonly used types at crate root
pub use argument::Argument;
pub use kernel::{box_kernel, circle_kernel, Kernel, KernelWeight};
pub use policy::{
    AllValuesWithinDomain, DomainPolicy, HaloFillPolicy, InputNoDataPolicy, InputPolicies,
    OutputNoDataPolicy, OutputPolicies, Policies,
};
pub use zonal::SerialRoute;
