//! Number of neighbours draining into each cell.

use futures::FutureExt;
use partitioned_array::{spawn_compute, Element, PartitionedRaster, Result, ZoneElement};

use super::{direction_code, drains_into, NEIGHBOURS};
use crate::halo::{fetch_halo, Halo};
use crate::policy::{AllValuesWithinDomain, InputPolicies, OutputPolicies, Policies};

/// Policies of [`inflow_count`]: direction `FD` in, count `C` out.
pub type InflowCountPolicies<FD, C> =
    Policies<AllValuesWithinDomain, (OutputPolicies<C>,), (InputPolicies<FD>,)>;

pub fn default_policies<FD: Element, C: Element>() -> InflowCountPolicies<FD, C> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(),),
        (InputPolicies::flow_direction_default(),),
    )
}

pub fn value_policies<FD: Element, C: Element>() -> InflowCountPolicies<FD, C> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::value_policy(),),
        (InputPolicies::flow_direction_value(),),
    )
}

/// Count the neighbours whose flow direction points at each cell.
///
/// Cells with a no-data direction get a no-data count.
pub fn inflow_count<FD, C>(
    policies: &InflowCountPolicies<FD, C>,
    flow_direction: &PartitionedRaster<FD>,
) -> Result<PartitionedRaster<C>>
where
    FD: ZoneElement,
    C: Element,
{
    let source = flow_direction.clone();
    let policies = *policies;

    flow_direction.from_tasks_like(move |p, region| {
        let source = source.clone();

        async move {
            let (input,) = policies.input_policies;
            let (output,) = policies.output_policies;
            let halo = fetch_halo(&source, p, 1, input.halo_fill_value()).await?;

            spawn_compute(move || {
                let [rows, cols] = region.shape;
                let mut out = vec![C::default(); region.nr_elements()];

                for row in 0..rows {
                    for col in 0..cols {
                        let cell = &mut out[row * cols + col];
                        match count_inflow(&halo, &input, row, col) {
                            Some(count) => {
                                *cell = C::try_from_f64(count as f64).unwrap_or_default()
                            }
                            None => output.mark_no_data(cell),
                        }
                    }
                }

                Ok(out)
            })
            .await
        }
        .boxed()
    })
}

/// Inflow count of cell (`row`, `col`) of the partition, `None` when its
/// own direction is no-data.
pub(crate) fn count_inflow<FD: Element>(
    halo: &Halo<FD, 2>,
    input: &InputPolicies<FD>,
    row: usize,
    col: usize,
) -> Option<usize> {
    let centre = halo.neighbour(row, col, 0, 0);
    if input.is_no_data(&centre) || direction_code(centre).is_none() {
        return None;
    }

    let count = NEIGHBOURS
        .iter()
        .filter(|(_, dr, dc)| {
            let neighbour = halo.neighbour(row, col, *dr, *dc);
            !input.is_no_data(&neighbour)
                && direction_code(neighbour).is_some_and(|code| drains_into(code, *dr, *dc))
        })
        .count();

    Some(count)
}
