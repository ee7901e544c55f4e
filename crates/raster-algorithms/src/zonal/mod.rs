//! Zonal operations: aggregation by zone and distributed ordering.
//!
//! Aggregation runs in three steps. Every partition reduces its cells to
//! one partial aggregate per zone, the partials are merged pairwise into
//! one aggregate per zone, and each output partition looks up the
//! aggregate of its cells' zones. Output partitions are created
//! immediately and resolve once the merge completes.

pub mod area;
pub mod decreasing_order;
pub mod route;
pub mod statistics;

pub use area::zonal_area;
pub use decreasing_order::{
    decreasing_order, decreasing_order_zonal, first_n, highest_n, highest_n_zonal,
};
pub use route::{FragmentLocation, RouteFragment, RoutePartition, SerialRoute};
pub use statistics::{
    zonal_diversity, zonal_majority, zonal_maximum, zonal_mean, zonal_minimum, zonal_sum,
};

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{try_join, BoxFuture};
use futures::FutureExt;
use partitioned_array::{
    spawn_compute, ArrayError, Element, PartitionedArray, Result, ZoneElement,
};
use tracing::debug;

use crate::policy::{InputPolicies, OutputPolicies};

/// Reduction of the values of one zone.
///
/// Partials are built per partition with [`add`](Self::add) and combined
/// with [`merge`](Self::merge), in no particular order.
pub(crate) trait ZonalAggregate<T>: Copy + Send + Sync + 'static {
    type Partial: Default + Send + 'static;
    type Output: Element;

    fn add(&self, partial: &mut Self::Partial, value: T);

    fn merge(&self, partial: &mut Self::Partial, other: Self::Partial);

    /// Aggregate of a zone, `None` for no-data.
    fn finish(&self, partial: &Self::Partial) -> Option<Self::Output>;
}

type Partials<Z, P> = HashMap<Z, P>;

/// Input and output policies of one zonal aggregation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ZonalInputs<T, Z, U> {
    pub values: InputPolicies<T>,
    pub zones: InputPolicies<Z>,
    pub output: OutputPolicies<U>,
}

/// Aggregate `values` per zone and assign each cell its zone's aggregate.
///
/// No-data values are skipped. Cells with a no-data zone, and cells of a
/// zone without an aggregate, are marked no-data.
pub(crate) fn zonal_operation<T, Z, A, const R: usize>(
    operation: &'static str,
    policies: ZonalInputs<T, Z, A::Output>,
    values: &PartitionedArray<T, R>,
    zones: &PartitionedArray<Z, R>,
    aggregate: A,
) -> Result<PartitionedArray<A::Output, R>>
where
    T: Element,
    Z: ZoneElement,
    A: ZonalAggregate<T>,
{
    zones.check_aligned(values, "zonal values")?;

    let partials: Vec<_> = (0..zones.nr_partitions())
        .map(|p| {
            let values = values.partition_data_task(p);
            let zones = zones.partition_data_task(p);
            let handle = tokio::spawn(async move {
                let (values, zones) = try_join(values, zones).await?;
                spawn_compute(move || {
                    let mut partials: Partials<Z, A::Partial> = HashMap::new();
                    for (value, zone) in values.iter().zip(zones.iter()) {
                        if policies.zones.is_no_data(zone) || policies.values.is_no_data(value) {
                            continue;
                        }
                        aggregate.add(partials.entry(*zone).or_default(), *value);
                    }
                    Ok(partials)
                })
                .await
            });
            async move { handle.await? }.boxed()
        })
        .collect();

    let per_zone = merge_tree::<T, Z, A>(aggregate, partials)
        .map(move |merged| {
            let merged = merged?;
            debug!(operation, zones = merged.len(), "Zonal aggregates merged");
            let per_zone: HashMap<Z, A::Output> = merged
                .iter()
                .filter_map(|(zone, partial)| aggregate.finish(partial).map(|value| (*zone, value)))
                .collect();
            Ok::<_, ArrayError>(Arc::new(per_zone))
        })
        .boxed()
        .shared();

    let zone_source = zones.clone();
    zones.from_tasks_like(move |p, _| {
        let zones = zone_source.partition_data_task(p);
        let per_zone = per_zone.clone();

        async move {
            let (per_zone, zones) = try_join(per_zone, zones).await?;
            spawn_compute(move || {
                let mut out = vec![A::Output::default(); zones.len()];
                for (slot, zone) in out.iter_mut().zip(zones.iter()) {
                    let value = if policies.zones.is_no_data(zone) {
                        None
                    } else {
                        per_zone.get(zone)
                    };
                    match value {
                        Some(value) => *slot = *value,
                        None => policies.output.mark_no_data(slot),
                    }
                }
                Ok(out)
            })
            .await
        }
        .boxed()
    })
}

/// Merge partials pairwise until one remains.
fn merge_tree<T, Z, A>(
    aggregate: A,
    mut level: Vec<BoxFuture<'static, Result<Partials<Z, A::Partial>>>>,
) -> BoxFuture<'static, Result<Partials<Z, A::Partial>>>
where
    Z: ZoneElement,
    A: ZonalAggregate<T>,
{
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut remaining = level.into_iter();
        while let Some(left) = remaining.next() {
            match remaining.next() {
                Some(right) => next.push(
                    async move {
                        let (mut left, right) = try_join(left, right).await?;
                        spawn_compute(move || {
                            for (zone, partial) in right {
                                match left.entry(zone) {
                                    Entry::Occupied(mut entry) => {
                                        aggregate.merge(entry.get_mut(), partial)
                                    }
                                    Entry::Vacant(entry) => {
                                        entry.insert(partial);
                                    }
                                }
                            }
                            Ok(left)
                        })
                        .await
                    }
                    .boxed(),
                ),
                None => next.push(left),
            }
        }
        level = next;
    }

    level
        .pop()
        .unwrap_or_else(|| async { Ok(HashMap::new()) }.boxed())
}
