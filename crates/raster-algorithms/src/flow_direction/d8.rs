//! Steepest-descent (D8) flow directions derived from elevation.

use futures::FutureExt;
use partitioned_array::{spawn_compute, Element, PartitionedRaster, Result, ZoneElement};
use std::f64::consts::SQRT_2;
use tracing::debug;

use super::{NEIGHBOURS, SINK};
use crate::halo::fetch_halo;
use crate::policy::{
    check_domain, AllValuesWithinDomain, DomainPolicy, InputPolicies, OutputPolicies, Policies,
};

/// Policies of [`d8_flow_direction`]: elevation `E` in, direction `FD` out.
pub type D8Policies<E, FD, D = AllValuesWithinDomain> =
    Policies<D, (OutputPolicies<FD>,), (InputPolicies<E>,)>;

pub fn default_policies<E: Element, FD: Element>() -> D8Policies<E, FD> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(),),
        (InputPolicies::default_policy(),),
    )
}

pub fn value_policies<E: Element, FD: Element>() -> D8Policies<E, FD> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::value_policy(),),
        (InputPolicies::value_policy(),),
    )
}

/// Direction towards the neighbour with the steepest strictly downward
/// slope, measured per unit of distance.
///
/// Ties go to the first neighbour in code order. Cells without a lower
/// neighbour become sinks. Neighbours outside the array and no-data
/// neighbours are ignored.
pub fn d8_flow_direction<E, FD, D>(
    policies: &D8Policies<E, FD, D>,
    elevation: &PartitionedRaster<E>,
) -> Result<PartitionedRaster<FD>>
where
    E: Element,
    FD: ZoneElement,
    D: DomainPolicy<(E,)>,
{
    let source = elevation.clone();
    let policies = policies.clone();
    let shape = elevation.shape();

    debug!(array = %elevation.id(), "Scheduling d8 flow direction");

    elevation.from_tasks_like(move |p, region| {
        let source = source.clone();
        let policies = policies.clone();

        async move {
            let (input,) = policies.input_policies;
            let (output,) = policies.output_policies;
            let halo = fetch_halo(&source, p, 1, input.halo_fill_value()).await?;
            let sink = FD::try_from_f64(f64::from(SINK)).unwrap_or_default();

            spawn_compute(move || {
                let mut out = vec![FD::default(); region.nr_elements()];
                let [rows, cols] = region.shape;

                for row in 0..rows {
                    for col in 0..cols {
                        let cell = &mut out[row * cols + col];
                        let centre = halo.neighbour(row, col, 0, 0);
                        if input.is_no_data(&centre)
                            || !check_domain(&policies.domain_policy, (centre,), "d8_flow_direction")?
                        {
                            output.mark_no_data(cell);
                            continue;
                        }

                        let global = [region.offset[0] + row, region.offset[1] + col];
                        let mut steepest = 0.0;
                        let mut direction = SINK;

                        for (code, dr, dc) in NEIGHBOURS {
                            let inside = global[0].checked_add_signed(dr).is_some_and(|r| r < shape[0])
                                && global[1].checked_add_signed(dc).is_some_and(|c| c < shape[1]);
                            if !inside {
                                continue;
                            }
                            let neighbour = halo.neighbour(row, col, dr, dc);
                            if input.is_no_data(&neighbour) {
                                continue;
                            }
                            let distance = if dr != 0 && dc != 0 { SQRT_2 } else { 1.0 };
                            let slope = (centre.as_f64() - neighbour.as_f64()) / distance;
                            if slope > steepest {
                                steepest = slope;
                                direction = code;
                            }
                        }

                        *cell = FD::try_from_f64(f64::from(direction)).unwrap_or(sink);
                    }
                }

                Ok(out)
            })
            .await
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_direction::{EAST, SOUTH, SOUTH_EAST};
    use partitioned_array::Context;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_d8_on_tilted_plane() {
        let ctx = Context::default();
        #[rustfmt::skip]
        let elevation = vec![
            9.0, 8.0, 7.0,
            8.0, 7.0, 6.0,
            7.0, 6.0, 1.0_f64,
        ];
        let array = PartitionedRaster::from_vec(&ctx, [3, 3], [3, 1], elevation).unwrap();
        let result: Vec<u8> = d8_flow_direction(&value_policies(), &array)
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        assert_eq!(result[0], SOUTH_EAST);
        assert_eq!(result[4], SOUTH_EAST);
        assert_eq!(result[2], SOUTH);
        assert_eq!(result[6], EAST);
        assert_eq!(result[8], SINK);
    }

    #[tokio::test]
    async fn test_no_data_elevation() {
        let ctx = Context::default();
        let array =
            PartitionedRaster::from_vec(&ctx, [1, 3], [1, 3], vec![f32::NAN, 2.0, 1.0]).unwrap();
        let result: Vec<u8> = d8_flow_direction(&value_policies(), &array)
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(result, vec![u8::MAX, EAST, SINK]);
    }
}
