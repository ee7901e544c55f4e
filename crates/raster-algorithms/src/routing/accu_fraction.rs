//! Accumulation passing a fixed fraction of each cell's total downstream.

use partitioned_array::{FloatElement, PartitionedRaster, Result, ZoneElement};

use super::accu_rule::{
    accumulate_with_rule, rule_default_policies, rule_value_policies, AccuRulePolicies,
};
use crate::argument::Argument;
use crate::policy::{DomainPolicy, FractionDomain};

pub fn default_policies<FD: ZoneElement, F: FloatElement>() -> AccuRulePolicies<FD, F> {
    rule_default_policies()
}

/// Value policies; fractions outside [0, 1] yield no-data.
pub fn value_policies<FD: ZoneElement, F: FloatElement>(
) -> AccuRulePolicies<FD, F, FractionDomain> {
    rule_value_policies(FractionDomain)
}

/// Accumulate `inflow`, passing `fraction` of each cell's total
/// downstream and storing the rest. Returns (flux, state).
pub fn accu_fraction<FD, F, D>(
    policies: &AccuRulePolicies<FD, F, D>,
    flow_direction: &PartitionedRaster<FD>,
    inflow: &PartitionedRaster<F>,
    fraction: impl Into<Argument<F>>,
) -> Result<(PartitionedRaster<F>, PartitionedRaster<F>)>
where
    FD: ZoneElement,
    F: FloatElement,
    D: DomainPolicy<(F, F)>,
{
    accumulate_with_rule(
        "accu_fraction",
        policies,
        flow_direction,
        inflow,
        fraction.into(),
        |total, fraction| {
            let flux = fraction * total;
            (flux, total - flux)
        },
    )
}
