//! Distributed ordering of cells by decreasing value.
//!
//! Each partition sorts its own cells per zone. The sorted runs are then
//! merged per zone, zones in parallel, and every merged sequence is
//! recorded as a [`SerialRoute`] whose fragments live with the partition
//! owning their cells.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use partitioned_array::{
    spawn_compute, Buffer, Element, PartitionedArray, Result, ZoneElement,
};
use rayon::prelude::*;
use tracing::debug;

use super::route::{RouteBuilder, RoutePartition, SerialRoute};
use crate::policy::{AllValuesWithinDomain, InputPolicies, Policies};

/// Id of the single route created by [`decreasing_order`].
pub const GLOBAL_ROUTE_ID: u32 = 0;

/// Policies of [`decreasing_order`]: values in, no array out.
pub type DecreasingOrderPolicies<T> = Policies<AllValuesWithinDomain, (), (InputPolicies<T>,)>;

/// Policies of [`decreasing_order_zonal`]: zones and values in.
pub type ZonalDecreasingOrderPolicies<Z, T> =
    Policies<AllValuesWithinDomain, (), (InputPolicies<Z>, InputPolicies<T>)>;

pub fn default_policies<T: Element>() -> DecreasingOrderPolicies<T> {
    Policies::new(AllValuesWithinDomain, (), (InputPolicies::default_policy(),))
}

pub fn value_policies<T: Element>() -> DecreasingOrderPolicies<T> {
    Policies::new(AllValuesWithinDomain, (), (InputPolicies::value_policy(),))
}

pub fn zonal_default_policies<Z: ZoneElement, T: Element>() -> ZonalDecreasingOrderPolicies<Z, T> {
    Policies::new(
        AllValuesWithinDomain,
        (),
        (InputPolicies::default_policy(), InputPolicies::default_policy()),
    )
}

pub fn zonal_value_policies<Z: ZoneElement, T: Element>() -> ZonalDecreasingOrderPolicies<Z, T> {
    Policies::new(
        AllValuesWithinDomain,
        (),
        (InputPolicies::value_policy(), InputPolicies::value_policy()),
    )
}

/// Route over all cells from the highest to the lowest value, holding at
/// most `max_length` cells. No-data and NaN values are left out.
pub async fn decreasing_order<T, const R: usize>(
    policies: &DecreasingOrderPolicies<T>,
    values: &PartitionedArray<T, R>,
    max_length: Option<usize>,
) -> Result<SerialRoute<u32, R>>
where
    T: Element,
{
    let (value_policies,) = policies.input_policies;
    order(
        "decreasing_order",
        InputPolicies::default_policy(),
        value_policies,
        None,
        values,
        max_length,
    )
    .await
}

/// One route per zone over the zone's cells, from the highest to the
/// lowest value, each holding at most `max_length` cells.
pub async fn decreasing_order_zonal<Z, T, const R: usize>(
    policies: &ZonalDecreasingOrderPolicies<Z, T>,
    zones: &PartitionedArray<Z, R>,
    values: &PartitionedArray<T, R>,
    max_length: Option<usize>,
) -> Result<SerialRoute<Z, R>>
where
    Z: ZoneElement,
    T: Element,
{
    zones.check_aligned(values, "values")?;
    let (zone_policies, value_policies) = policies.input_policies;
    order(
        "decreasing_order_zonal",
        zone_policies,
        value_policies,
        Some(zones),
        values,
        max_length,
    )
    .await
}

/// Mark the first `n` cells of every route with 1, all other cells with 0.
pub fn first_n<Id, const R: usize>(
    route: &SerialRoute<Id, R>,
    n: usize,
) -> Result<PartitionedArray<u8, R>>
where
    Id: ZoneElement,
{
    let mut marked: Vec<Vec<usize>> = vec![Vec::new(); route.partitions().len()];
    for id in route.route_ids() {
        let mut remaining = n;
        for (partition, fragment) in route.walk(id) {
            if remaining == 0 {
                break;
            }
            let cells = &fragment.cells()[..fragment.nr_cells().min(remaining)];
            marked[partition].extend_from_slice(cells);
            remaining -= cells.len();
        }
    }

    PartitionedArray::from_tasks(
        route.context(),
        route.shape(),
        route.partition_shape(),
        move |p, region| {
            let cells = std::mem::take(&mut marked[p]);
            async move {
                let mut out = vec![0_u8; region.nr_elements()];
                for cell in cells {
                    out[cell] = 1;
                }
                Ok(out)
            }
            .boxed()
        },
    )
}

/// Mark the `n` cells with the highest values.
pub async fn highest_n<T, const R: usize>(
    policies: &DecreasingOrderPolicies<T>,
    values: &PartitionedArray<T, R>,
    n: usize,
) -> Result<PartitionedArray<u8, R>>
where
    T: Element,
{
    let route = decreasing_order(policies, values, Some(n)).await?;
    first_n(&route, n)
}

/// Mark the `n` cells with the highest values in every zone.
pub async fn highest_n_zonal<Z, T, const R: usize>(
    policies: &ZonalDecreasingOrderPolicies<Z, T>,
    zones: &PartitionedArray<Z, R>,
    values: &PartitionedArray<T, R>,
    n: usize,
) -> Result<PartitionedArray<u8, R>>
where
    Z: ZoneElement,
    T: Element,
{
    let route = decreasing_order_zonal(policies, zones, values, Some(n)).await?;
    first_n(&route, n)
}

/// Cells of one zone within one partition, sorted by decreasing value.
type SortedCells<T> = Vec<(T, usize)>;

async fn order<Z, T, const R: usize>(
    operation: &'static str,
    zone_policies: InputPolicies<Z>,
    value_policies: InputPolicies<T>,
    zones: Option<&PartitionedArray<Z, R>>,
    values: &PartitionedArray<T, R>,
    max_length: Option<usize>,
) -> Result<SerialRoute<Z, R>>
where
    Z: ZoneElement,
    T: Element,
{
    let nr_partitions = values.nr_partitions();
    let sorting = (0..nr_partitions).map(|p| {
        let value_data = values.partition_data_task(p);
        let zone_data: BoxFuture<'static, Result<Option<Buffer<Z>>>> = match zones {
            Some(zones) => zones.partition_data_task(p).map(|r| r.map(Some)).boxed(),
            None => async { Ok(None) }.boxed(),
        };
        let handle = tokio::spawn(async move {
            let (values, zones) = futures::try_join!(value_data, zone_data)?;
            spawn_compute(move || Ok(sort_partition(&zone_policies, &value_policies, &values, zones.as_deref())))
                .await
        });
        async move { handle.await? }
    });
    let sorted = try_join_all(sorting).await?;

    let routes = spawn_compute(move || {
        let mut ids: Vec<Z> = sorted.iter().flat_map(|cells| cells.keys().copied()).collect();
        ids.sort_unstable();
        ids.dedup();

        let routes: Vec<RouteBuilder<Z>> = ids
            .into_par_iter()
            .map(|id| merge_zone(id, &sorted, max_length))
            .collect();
        Ok(routes)
    })
    .await?;

    let mut starts = BTreeMap::new();
    let mut fragments: Vec<HashMap<Z, _>> = vec![HashMap::new(); nr_partitions];
    for route in routes {
        let id = route.id();
        if let Some(start) = route.start() {
            starts.insert(id, start);
        }
        for (partition, route_fragments) in route.into_fragments() {
            fragments[partition].insert(id, route_fragments);
        }
    }

    debug!(
        operation,
        routes = starts.len(),
        partitions = nr_partitions,
        "Recorded serial routes"
    );

    let partitions = fragments
        .into_iter()
        .enumerate()
        .map(|(p, fragments)| RoutePartition::new(p, values.partition_region(p), fragments))
        .collect();

    Ok(SerialRoute::new(
        values.context().clone(),
        values.shape(),
        values.partition_shape(),
        partitions,
        starts,
    ))
}

fn sort_partition<Z, T>(
    zone_policies: &InputPolicies<Z>,
    value_policies: &InputPolicies<T>,
    values: &[T],
    zones: Option<&[Z]>,
) -> HashMap<Z, SortedCells<T>>
where
    Z: ZoneElement,
    T: Element,
{
    let mut cells: HashMap<Z, SortedCells<T>> = HashMap::new();
    for (idx, value) in values.iter().enumerate() {
        if value_policies.is_no_data(value) || value.is_unordered() {
            continue;
        }
        let zone = match zones {
            Some(zones) if zone_policies.is_no_data(&zones[idx]) => continue,
            Some(zones) => zones[idx],
            None => Z::default(),
        };
        cells.entry(zone).or_default().push((*value, idx));
    }

    for sorted in cells.values_mut() {
        sorted.sort_unstable_by(|a, b| descending(&a.0, &b.0).then(a.1.cmp(&b.1)));
    }
    cells
}

fn descending<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    b.partial_cmp(a).unwrap_or(Ordering::Equal)
}

/// Head of one partition's sorted run during the merge.
struct Head<T> {
    value: T,
    partition: usize,
    position: usize,
}

impl<T: PartialOrd> Ord for Head<T> {
    /// Highest value first; equal values in partition order.
    fn cmp(&self, other: &Self) -> Ordering {
        descending(&other.value, &self.value).then(other.partition.cmp(&self.partition))
    }
}

impl<T: PartialOrd> PartialOrd for Head<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: PartialOrd> PartialEq for Head<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: PartialOrd> Eq for Head<T> {}

fn merge_zone<Z, T>(
    id: Z,
    sorted: &[HashMap<Z, SortedCells<T>>],
    max_length: Option<usize>,
) -> RouteBuilder<Z>
where
    Z: ZoneElement,
    T: Element,
{
    let runs: Vec<&[(T, usize)]> = sorted
        .iter()
        .map(|cells| cells.get(&id).map(Vec::as_slice).unwrap_or(&[]))
        .collect();

    let mut heap: BinaryHeap<Head<T>> = runs
        .iter()
        .enumerate()
        .filter_map(|(partition, run)| {
            run.first().map(|&(value, _)| Head {
                value,
                partition,
                position: 0,
            })
        })
        .collect();

    let max_length = max_length.unwrap_or(usize::MAX);
    let mut route = RouteBuilder::new(id);
    let mut length = 0;

    while let Some(head) = heap.pop() {
        if length == max_length {
            break;
        }
        let run = runs[head.partition];
        route.push(head.partition, run[head.position].1);
        length += 1;

        let position = head.position + 1;
        if let Some(&(value, _)) = run.get(position) {
            heap.push(Head {
                value,
                partition: head.partition,
                position,
            });
        }
    }

    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use partitioned_array::Context;
    use test_utils::create_block_zones;

    async fn values(ctx: &Context) -> PartitionedArray<f32, 2> {
        // Distinct values spread so that consecutive ranks alternate
        // between partitions
        let data: Vec<f32> = (0..16).map(|i| ((i * 7) % 16) as f32).collect();
        PartitionedArray::from_vec(ctx, [4, 4], [2, 2], data).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_global_order_is_strictly_decreasing() {
        let ctx = Context::with_localities(2).unwrap();
        let values = values(&ctx).await;
        let data = values.to_vec().await.unwrap();

        let route = decreasing_order(&value_policies(), &values, None).await.unwrap();
        assert_eq!(route.nr_routes(), 1);

        let cells = route.cells(GLOBAL_ROUTE_ID);
        assert_eq!(cells.len(), 16);
        let ordered: Vec<f32> = cells.iter().map(|[r, c]| data[r * 4 + c]).collect();
        assert!(ordered.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(ordered[0], 15.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_max_length_and_no_data() {
        let ctx = Context::default();
        let values = PartitionedArray::from_vec(
            &ctx,
            [1, 4],
            [1, 2],
            vec![1.0, f64::NAN, 3.0, 2.0],
        )
        .unwrap();

        let route = decreasing_order(&value_policies(), &values, None).await.unwrap();
        assert_eq!(route.cells(GLOBAL_ROUTE_ID), vec![[0, 2], [0, 3], [0, 0]]);

        let route = decreasing_order(&default_policies(), &values, Some(2)).await.unwrap();
        assert_eq!(route.len(GLOBAL_ROUTE_ID), 2);
        assert_eq!(route.partitions()[1].nr_route_fragments(), 1);
        assert_eq!(route.partitions()[0].nr_route_fragments(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_zonal_routes() {
        let ctx = Context::default();
        let values = values(&ctx).await;
        let data = values.to_vec().await.unwrap();
        let zones =
            PartitionedArray::from_vec(&ctx, [4, 4], [1, 4], create_block_zones(4, 4, 2)).unwrap();
        let zone_data = zones.to_vec().await.unwrap();

        let route = decreasing_order_zonal(&zonal_value_policies(), &zones, &values, None)
            .await
            .unwrap();
        assert_eq!(route.nr_routes(), 4);

        for zone in route.route_ids().collect::<Vec<_>>() {
            let cells = route.cells(zone);
            assert_eq!(cells.len(), 4);
            assert!(cells.iter().all(|[r, c]| zone_data[r * 4 + c] == zone));
            let ordered: Vec<f32> = cells.iter().map(|[r, c]| data[r * 4 + c]).collect();
            assert!(ordered.windows(2).all(|w| w[0] > w[1]));
        }

        // Each zone spans two partitions of one row each
        let first = &route.partitions()[0];
        assert_eq!(first.route_ids().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_highest_n() {
        let ctx = Context::default();
        let values = values(&ctx).await;
        let data = values.to_vec().await.unwrap();

        let marked = highest_n(&value_policies(), &values, 3)
            .await
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(marked.iter().filter(|&&m| m == 1).count(), 3);
        for (mark, value) in marked.iter().zip(&data) {
            assert_eq!(*mark == 1, *value >= 13.0);
        }

        let zones =
            PartitionedArray::from_vec(&ctx, [4, 4], [2, 2], create_block_zones(4, 4, 2)).unwrap();
        let marked = highest_n_zonal(&zonal_value_policies(), &zones, &values, 1)
            .await
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(marked.iter().filter(|&&m| m == 1).count(), 4);
    }
}
