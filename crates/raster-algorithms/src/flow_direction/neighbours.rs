//! Values of the direct upstream and downstream neighbours.

use futures::future::try_join;
use futures::FutureExt;
use partitioned_array::{spawn_compute, Element, PartitionedRaster, Result, ZoneElement};

use super::{direction_code, downstream_offset, drains_into, NEIGHBOURS};
use crate::halo::{fetch_halo, Halo};
use crate::policy::{AllValuesWithinDomain, InputPolicies, OutputPolicies, Policies};

/// Policies of [`upstream`] and [`downstream`]: directions `FD` and
/// material `M` in, material out.
pub type NeighbourPolicies<FD, M> =
    Policies<AllValuesWithinDomain, (OutputPolicies<M>,), (InputPolicies<FD>, InputPolicies<M>)>;

pub fn default_policies<FD: Element, M: Element>() -> NeighbourPolicies<FD, M> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(),),
        (
            InputPolicies::flow_direction_default(),
            InputPolicies::default_policy(),
        ),
    )
}

pub fn value_policies<FD: Element, M: Element>() -> NeighbourPolicies<FD, M> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::value_policy(),),
        (
            InputPolicies::flow_direction_value(),
            InputPolicies::value_policy(),
        ),
    )
}

/// Sum of the material of the cells draining directly into each cell.
///
/// A no-data direction, or no-data material in any upstream cell, yields
/// no-data.
pub fn upstream<FD, M>(
    policies: &NeighbourPolicies<FD, M>,
    flow_direction: &PartitionedRaster<FD>,
    material: &PartitionedRaster<M>,
) -> Result<PartitionedRaster<M>>
where
    FD: ZoneElement,
    M: Element,
{
    neighbour_operation(policies, flow_direction, material, |fd, m, fd_in, m_in, row, col| {
        let mut sum = 0.0;
        for (_, dr, dc) in NEIGHBOURS {
            let code = fd.neighbour(row, col, dr, dc);
            if fd_in.is_no_data(&code)
                || !direction_code(code).is_some_and(|code| drains_into(code, dr, dc))
            {
                continue;
            }
            let value = m.neighbour(row, col, dr, dc);
            if m_in.is_no_data(&value) {
                return None;
            }
            sum += value.as_f64();
        }
        M::try_from_f64(sum)
    })
}

/// Material of the cell receiving each cell's outflow. Sinks, and cells
/// draining out of the array, yield their own material.
pub fn downstream<FD, M>(
    policies: &NeighbourPolicies<FD, M>,
    flow_direction: &PartitionedRaster<FD>,
    material: &PartitionedRaster<M>,
) -> Result<PartitionedRaster<M>>
where
    FD: ZoneElement,
    M: Element,
{
    let shape = flow_direction.shape();

    neighbour_operation_at(
        policies,
        flow_direction,
        material,
        move |fd, m, _, m_in, offset, row, col| {
            let code = direction_code(fd.neighbour(row, col, 0, 0))?;
            let (dr, dc) = match downstream_offset(code) {
                Some((dr, dc)) => {
                    let global_row = (offset[0] + row).checked_add_signed(dr);
                    let global_col = (offset[1] + col).checked_add_signed(dc);
                    let inside = global_row.is_some_and(|r| r < shape[0])
                        && global_col.is_some_and(|c| c < shape[1]);
                    if inside {
                        (dr, dc)
                    } else {
                        (0, 0)
                    }
                }
                None => (0, 0),
            };
            let value = m.neighbour(row, col, dr, dc);
            (!m_in.is_no_data(&value)).then_some(value)
        },
    )
}

fn neighbour_operation<FD, M, F>(
    policies: &NeighbourPolicies<FD, M>,
    flow_direction: &PartitionedRaster<FD>,
    material: &PartitionedRaster<M>,
    cell: F,
) -> Result<PartitionedRaster<M>>
where
    FD: ZoneElement,
    M: Element,
    F: Fn(&Halo<FD, 2>, &Halo<M, 2>, &InputPolicies<FD>, &InputPolicies<M>, usize, usize) -> Option<M>
        + Send
        + Sync
        + Copy
        + 'static,
{
    neighbour_operation_at(
        policies,
        flow_direction,
        material,
        move |fd, m, fd_in, m_in, _, row, col| cell(fd, m, fd_in, m_in, row, col),
    )
}

/// Evaluate `cell` for every cell of each partition, given halos of width
/// one around the direction and material partitions and the partition
/// offset.
fn neighbour_operation_at<FD, M, F>(
    policies: &NeighbourPolicies<FD, M>,
    flow_direction: &PartitionedRaster<FD>,
    material: &PartitionedRaster<M>,
    cell: F,
) -> Result<PartitionedRaster<M>>
where
    FD: ZoneElement,
    M: Element,
    F: Fn(
            &Halo<FD, 2>,
            &Halo<M, 2>,
            &InputPolicies<FD>,
            &InputPolicies<M>,
            [usize; 2],
            usize,
            usize,
        ) -> Option<M>
        + Send
        + Sync
        + Copy
        + 'static,
{
    flow_direction.check_aligned(material, "material")?;
    let policies = *policies;
    let fd_source = flow_direction.clone();
    let m_source = material.clone();

    flow_direction.from_tasks_like(move |p, region| {
        let fd_source = fd_source.clone();
        let m_source = m_source.clone();

        async move {
            let (fd_in, m_in) = policies.input_policies;
            let (output,) = policies.output_policies;
            let (fd, m) = try_join(
                fetch_halo(&fd_source, p, 1, fd_in.halo_fill_value()),
                fetch_halo(&m_source, p, 1, m_in.halo_fill_value()),
            )
            .await?;

            spawn_compute(move || {
                let [rows, cols] = region.shape;
                let mut out = vec![M::default(); region.nr_elements()];

                for row in 0..rows {
                    for col in 0..cols {
                        let slot = &mut out[row * cols + col];
                        let code = fd.neighbour(row, col, 0, 0);
                        let value = if fd_in.is_no_data(&code) || direction_code(code).is_none() {
                            None
                        } else {
                            cell(&fd, &m, &fd_in, &m_in, region.offset, row, col)
                        };
                        match value {
                            Some(value) => *slot = value,
                            None => output.mark_no_data(slot),
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
