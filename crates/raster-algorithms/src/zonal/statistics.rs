//! Per-zone statistics of a value array.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use partitioned_array::{Element, FloatElement, PartitionedArray, Result, ZoneElement};

use super::{zonal_operation, ZonalAggregate, ZonalInputs};
use crate::policy::{AllValuesWithinDomain, InputPolicies, OutputPolicies, Policies};

/// Policies of the zonal statistics: values `T` and zones `Z` in, `U` out.
pub type ZonalPolicies<T, Z, U = T> =
    Policies<AllValuesWithinDomain, (OutputPolicies<U>,), (InputPolicies<T>, InputPolicies<Z>)>;

pub fn default_policies<T: Element, Z: ZoneElement, U: Element>() -> ZonalPolicies<T, Z, U> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(),),
        (InputPolicies::default_policy(), InputPolicies::default_policy()),
    )
}

pub fn value_policies<T: Element, Z: ZoneElement, U: Element>() -> ZonalPolicies<T, Z, U> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::value_policy(),),
        (InputPolicies::value_policy(), InputPolicies::value_policy()),
    )
}

fn inputs<T, Z, U>(policies: &ZonalPolicies<T, Z, U>) -> ZonalInputs<T, Z, U>
where
    T: Element,
    Z: ZoneElement,
    U: Element,
{
    let (values, zones) = policies.input_policies;
    let (output,) = policies.output_policies;
    ZonalInputs {
        values,
        zones,
        output,
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Sum<T>(PhantomData<T>);

/// Running sum of one zone, accumulated in the element type.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum Total<T> {
    #[default]
    Empty,
    Sum(T),
    Overflow,
}

impl<T: Element> Total<T> {
    fn plus(self, value: T) -> Self {
        match self {
            Total::Empty => Total::Sum(value),
            Total::Sum(sum) => sum.checked_sum(value).map_or(Total::Overflow, Total::Sum),
            Total::Overflow => Total::Overflow,
        }
    }
}

impl<T: Element> ZonalAggregate<T> for Sum<T> {
    type Partial = Total<T>;
    type Output = T;

    fn add(&self, total: &mut Total<T>, value: T) {
        *total = total.plus(value);
    }

    fn merge(&self, total: &mut Total<T>, other: Total<T>) {
        *total = match other {
            Total::Empty => *total,
            Total::Sum(value) => total.plus(value),
            Total::Overflow => Total::Overflow,
        };
    }

    // An overflowing zone becomes no-data
    fn finish(&self, total: &Total<T>) -> Option<T> {
        match *total {
            Total::Sum(sum) => Some(sum),
            Total::Empty | Total::Overflow => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Extreme<T> {
    maximum: bool,
    _value: PhantomData<T>,
}

impl<T> Extreme<T> {
    fn new(maximum: bool) -> Self {
        Self {
            maximum,
            _value: PhantomData,
        }
    }
}

impl<T: Element> ZonalAggregate<T> for Extreme<T> {
    type Partial = Option<T>;
    type Output = T;

    fn add(&self, partial: &mut Option<T>, value: T) {
        if value.is_unordered() {
            return;
        }
        *partial = match *partial {
            Some(current) if self.maximum && current >= value => Some(current),
            Some(current) if !self.maximum && current <= value => Some(current),
            _ => Some(value),
        };
    }

    fn merge(&self, partial: &mut Option<T>, other: Option<T>) {
        if let Some(other) = other {
            self.add(partial, other);
        }
    }

    fn finish(&self, partial: &Option<T>) -> Option<T> {
        *partial
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Mean<T>(PhantomData<T>);

impl<T: FloatElement> ZonalAggregate<T> for Mean<T> {
    type Partial = (f64, usize);
    type Output = T;

    fn add(&self, (sum, count): &mut (f64, usize), value: T) {
        *sum += value.as_f64();
        *count += 1;
    }

    fn merge(&self, (sum, count): &mut (f64, usize), (other_sum, other_count): (f64, usize)) {
        *sum += other_sum;
        *count += other_count;
    }

    fn finish(&self, &(sum, count): &(f64, usize)) -> Option<T> {
        (count > 0)
            .then(|| sum / count as f64)
            .and_then(T::try_from_f64)
    }
}

/// Occurrences per class, ordered so ties resolve to the smallest class.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Majority<T>(PhantomData<T>);

impl<T: ZoneElement> ZonalAggregate<T> for Majority<T> {
    type Partial = BTreeMap<T, usize>;
    type Output = T;

    fn add(&self, partial: &mut BTreeMap<T, usize>, value: T) {
        *partial.entry(value).or_default() += 1;
    }

    fn merge(&self, partial: &mut BTreeMap<T, usize>, other: BTreeMap<T, usize>) {
        for (value, count) in other {
            *partial.entry(value).or_default() += count;
        }
    }

    fn finish(&self, partial: &BTreeMap<T, usize>) -> Option<T> {
        let mut best: Option<(T, usize)> = None;
        for (&value, &count) in partial {
            if best.map_or(true, |(_, most)| count > most) {
                best = Some((value, count));
            }
        }
        best.map(|(value, _)| value)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Diversity<T, U>(PhantomData<(T, U)>);

impl<T: ZoneElement, U: Element> ZonalAggregate<T> for Diversity<T, U> {
    type Partial = BTreeSet<T>;
    type Output = U;

    fn add(&self, partial: &mut BTreeSet<T>, value: T) {
        partial.insert(value);
    }

    fn merge(&self, partial: &mut BTreeSet<T>, other: BTreeSet<T>) {
        partial.extend(other);
    }

    fn finish(&self, partial: &BTreeSet<T>) -> Option<U> {
        U::try_from_f64(partial.len() as f64)
    }
}

/// Sum of the values of each cell's zone.
pub fn zonal_sum<T, Z, const R: usize>(
    policies: &ZonalPolicies<T, Z>,
    values: &PartitionedArray<T, R>,
    zones: &PartitionedArray<Z, R>,
) -> Result<PartitionedArray<T, R>>
where
    T: Element,
    Z: ZoneElement,
{
    zonal_operation("zonal_sum", inputs(policies), values, zones, Sum(PhantomData))
}

/// Smallest value of each cell's zone.
pub fn zonal_minimum<T, Z, const R: usize>(
    policies: &ZonalPolicies<T, Z>,
    values: &PartitionedArray<T, R>,
    zones: &PartitionedArray<Z, R>,
) -> Result<PartitionedArray<T, R>>
where
    T: Element,
    Z: ZoneElement,
{
    zonal_operation("zonal_minimum", inputs(policies), values, zones, Extreme::new(false))
}

/// Largest value of each cell's zone.
pub fn zonal_maximum<T, Z, const R: usize>(
    policies: &ZonalPolicies<T, Z>,
    values: &PartitionedArray<T, R>,
    zones: &PartitionedArray<Z, R>,
) -> Result<PartitionedArray<T, R>>
where
    T: Element,
    Z: ZoneElement,
{
    zonal_operation("zonal_maximum", inputs(policies), values, zones, Extreme::new(true))
}

/// Mean value of each cell's zone.
pub fn zonal_mean<T, Z, const R: usize>(
    policies: &ZonalPolicies<T, Z>,
    values: &PartitionedArray<T, R>,
    zones: &PartitionedArray<Z, R>,
) -> Result<PartitionedArray<T, R>>
where
    T: FloatElement,
    Z: ZoneElement,
{
    zonal_operation("zonal_mean", inputs(policies), values, zones, Mean(PhantomData))
}

/// Most frequent class of each cell's zone; ties go to the smallest class.
pub fn zonal_majority<T, Z, const R: usize>(
    policies: &ZonalPolicies<T, Z>,
    values: &PartitionedArray<T, R>,
    zones: &PartitionedArray<Z, R>,
) -> Result<PartitionedArray<T, R>>
where
    T: ZoneElement,
    Z: ZoneElement,
{
    zonal_operation("zonal_majority", inputs(policies), values, zones, Majority(PhantomData))
}

/// Number of distinct classes in each cell's zone.
pub fn zonal_diversity<T, Z, U, const R: usize>(
    policies: &ZonalPolicies<T, Z, U>,
    values: &PartitionedArray<T, R>,
    zones: &PartitionedArray<Z, R>,
) -> Result<PartitionedArray<U, R>>
where
    T: ZoneElement,
    Z: ZoneElement,
    U: Element,
{
    zonal_operation("zonal_diversity", inputs(policies), values, zones, Diversity(PhantomData))
}
