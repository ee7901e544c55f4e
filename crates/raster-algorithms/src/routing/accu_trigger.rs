//! Accumulation that releases everything once a trigger level is
//! exceeded.

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

/// Accumulate `inflow`, storing everything until the total exceeds
/// `trigger`, then passing everything downstream. Returns (flux, state).
pub fn accu_trigger<FD, F, D>(
    policies: &AccuRulePolicies<FD, F, D>,
    flow_direction: &PartitionedRaster<FD>,
    inflow: &PartitionedRaster<F>,
    trigger: impl Into<Argument<F>>,
) -> Result<(PartitionedRaster<F>, PartitionedRaster<F>)>
where
    FD: ZoneElement,
    F: FloatElement,
    D: DomainPolicy<(F, F)>,
{
    accumulate_with_rule(
        "accu_trigger",
        policies,
        flow_direction,
        inflow,
        trigger.into(),
        |total, trigger| {
            if total > trigger {
                (total, F::zero())
            } else {
                (F::zero(), total)
            }
        },
    )
}
