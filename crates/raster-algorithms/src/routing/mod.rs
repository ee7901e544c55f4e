//! Flow routing: accumulation of material and the kinematic wave.
//!
//! All operations share one engine that solves cells in
//! upstream-before-downstream order and forwards flux across partition
//! boundaries as messages. The flow direction graph must be acyclic.

pub mod accu;
pub mod accu_capacity;
pub mod accu_fraction;
mod accu_rule;
pub mod accu_threshold;
pub mod accu_trigger;
mod engine;
pub mod kinematic_wave;

pub use accu::{accu, AccuPolicies};
pub use accu_capacity::accu_capacity;
pub use accu_fraction::accu_fraction;
pub use accu_rule::AccuRulePolicies;
pub use accu_threshold::accu_threshold;
pub use accu_trigger::accu_trigger;
pub use kinematic_wave::{
    kinematic_wave, kinematic_wave_cell, ChannelParameters, KinematicWavePolicies,
};
