//! Accumulation with a threshold that must be exceeded before flux leaves
//! a cell.

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

/// Accumulate `inflow`, keeping up to `threshold` in each cell.
///
/// When the total arriving in a cell exceeds the threshold, the state
/// holds the threshold and the excess flows downstream. Otherwise
/// everything is stored. Returns (flux, state).
pub fn accu_threshold<FD, F, D>(
    policies: &AccuRulePolicies<FD, F, D>,
    flow_direction: &PartitionedRaster<FD>,
    inflow: &PartitionedRaster<F>,
    threshold: impl Into<Argument<F>>,
) -> Result<(PartitionedRaster<F>, PartitionedRaster<F>)>
where
    FD: ZoneElement,
    F: FloatElement,
    D: DomainPolicy<(F, F)>,
{
    accumulate_with_rule(
        "accu_threshold",
        policies,
        flow_direction,
        inflow,
        threshold.into(),
        |total, threshold| {
            if total > threshold {
                (total - threshold, threshold)
            } else {
                (F::zero(), total)
            }
        },
    )
}
