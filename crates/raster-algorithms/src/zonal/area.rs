//! Number of cells per zone.

use std::marker::PhantomData;

use partitioned_array::{Element, PartitionedArray, Result, ZoneElement};

use super::{zonal_operation, ZonalAggregate, ZonalInputs};
use crate::policy::{AllValuesWithinDomain, InputPolicies, OutputPolicies, Policies};

/// Policies of [`zonal_area`]: zones `Z` in, counts `U` out.
pub type ZonalAreaPolicies<Z, U> =
    Policies<AllValuesWithinDomain, (OutputPolicies<U>,), (InputPolicies<Z>,)>;

pub fn default_policies<Z: ZoneElement, U: Element>() -> ZonalAreaPolicies<Z, U> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(),),
        (InputPolicies::default_policy(),),
    )
}

pub fn value_policies<Z: ZoneElement, U: Element>() -> ZonalAreaPolicies<Z, U> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::value_policy(),),
        (InputPolicies::value_policy(),),
    )
}

#[derive(Debug, Clone, Copy)]
struct Count<Z, U>(PhantomData<(Z, U)>);

impl<Z: ZoneElement, U: Element> ZonalAggregate<Z> for Count<Z, U> {
    type Partial = usize;
    type Output = U;

    fn add(&self, count: &mut usize, _: Z) {
        *count += 1;
    }

    fn merge(&self, count: &mut usize, other: usize) {
        *count += other;
    }

    fn finish(&self, &count: &usize) -> Option<U> {
        U::try_from_f64(count as f64)
    }
}

/// Number of cells in each cell's zone.
pub fn zonal_area<Z, U, const R: usize>(
    policies: &ZonalAreaPolicies<Z, U>,
    zones: &PartitionedArray<Z, R>,
) -> Result<PartitionedArray<U, R>>
where
    Z: ZoneElement,
    U: Element,
{
    let (zone_policies,) = policies.input_policies;
    let (output,) = policies.output_policies;
    let inputs = ZonalInputs {
        values: zone_policies,
        zones: zone_policies,
        output,
    };
    zonal_operation("zonal_area", inputs, zones, zones, Count(PhantomData))
}
