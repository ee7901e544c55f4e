//! Accumulation limited by the transport capacity of each cell.

use partitioned_array::{FloatElement, PartitionedRaster, Result, ZoneElement};

use super::accu_rule::{
    accumulate_with_rule, non_negative_value_policies, rule_default_policies, AccuRulePolicies,
};
use crate::argument::Argument;
use crate::policy::{DomainPolicy, NonNegativeFlux};

pub fn default_policies<FD: ZoneElement, F: FloatElement>() -> AccuRulePolicies<FD, F> {
    rule_default_policies()
}

pub fn value_policies<FD: ZoneElement, F: FloatElement>(
) -> AccuRulePolicies<FD, F, NonNegativeFlux> {
    non_negative_value_policies()
}

/// Accumulate `inflow`, passing at most `capacity` downstream.
///
/// Whatever exceeds the capacity is stored in the cell. Returns
/// (flux, state).
pub fn accu_capacity<FD, F, D>(
    policies: &AccuRulePolicies<FD, F, D>,
    flow_direction: &PartitionedRaster<FD>,
    inflow: &PartitionedRaster<F>,
    capacity: impl Into<Argument<F>>,
) -> Result<(PartitionedRaster<F>, PartitionedRaster<F>)>
where
    FD: ZoneElement,
    F: FloatElement,
    D: DomainPolicy<(F, F)>,
{
    accumulate_with_rule(
        "accu_capacity",
        policies,
        flow_direction,
        inflow,
        capacity.into(),
        |total, capacity| {
            let flux = total.min(capacity);
            (flux, total - flux)
        },
    )
}
