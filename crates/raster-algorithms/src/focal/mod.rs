//! Focal operations: kernel-based neighbourhood aggregation.
//!
//! Each output partition is computed from a halo of the input partition
//! with a border as wide as the kernel radius. Inside a partition, rows
//! are processed in parallel on the blocking pool.

mod classes;
mod statistics;

pub use classes::{focal_diversity, focal_majority};
pub use statistics::{convolve, focal_maximum, focal_mean, focal_minimum, focal_sum};

use std::sync::Arc;

use futures::FutureExt;
use partitioned_array::{spawn_compute, ArrayError, Element, PartitionedRaster, Result, Shape};
use rayon::prelude::*;
use tracing::debug;

use crate::halo::{fetch_halo, Halo};
use crate::kernel::{Kernel, KernelWeight};
use crate::policy::{
    check_domain, AllValuesWithinDomain, DomainPolicy, InputPolicies, OutputPolicies, Policies,
};

/// Policies of a focal operation reading `T` and writing `U`.
///
/// The domain policy is checked against each focal cell's own value.
pub type FocalPolicies<T, U = T, D = AllValuesWithinDomain> =
    Policies<D, (OutputPolicies<U>,), (InputPolicies<T>,)>;

pub fn default_policies<T: Element, U: Element>() -> FocalPolicies<T, U> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::default_policy(),),
        (InputPolicies::default_policy(),),
    )
}

pub fn value_policies<T: Element, U: Element>() -> FocalPolicies<T, U> {
    Policies::new(
        AllValuesWithinDomain,
        (OutputPolicies::value_policy(),),
        (InputPolicies::value_policy(),),
    )
}

/// Cells of one neighbourhood: values with a non-zero weight that are not
/// no-data, together with their weight.
pub(crate) type Window<T> = Vec<(T, f64)>;

/// Run a focal operation, reducing each neighbourhood with `reduce`.
///
/// `reduce` returns `None` when the output cell must be no-data.
pub(crate) fn focal_operation<T, U, W, D, F>(
    operation: &'static str,
    policies: &FocalPolicies<T, U, D>,
    array: &PartitionedRaster<T>,
    kernel: &Kernel<W>,
    reduce: F,
) -> Result<PartitionedRaster<U>>
where
    T: Element,
    U: Element,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
    F: Fn(&mut Window<T>) -> Option<U> + Send + Sync + 'static,
{
    let kernel = Arc::new(kernel.clone());
    let reduce = Arc::new(reduce);
    let source = array.clone();
    let policies = policies.clone();

    debug!(
        operation,
        array = %array.id(),
        radius = kernel.radius(),
        partitions = array.nr_partitions(),
        "Scheduling focal operation"
    );

    array.from_tasks_like(move |p, region| {
        let source = source.clone();
        let kernel = Arc::clone(&kernel);
        let reduce = Arc::clone(&reduce);
        let policies = policies.clone();

        async move {
            let fill = policies.input_policies.0.halo_fill_value();
            let halo = fetch_halo(&source, p, kernel.radius(), fill).await?;
            let pool = source.context().pool().clone();

            spawn_compute(move || {
                let out = pool.acquire_filled(region.nr_elements(), U::default());
                let result = focal_partition(
                    operation,
                    &policies,
                    &halo,
                    region.shape,
                    &kernel,
                    reduce.as_ref(),
                    out,
                );
                pool.release(halo.data);
                result
            })
            .await
        }
        .boxed()
    })
}

fn focal_partition<T, U, W, D, F>(
    operation: &'static str,
    policies: &FocalPolicies<T, U, D>,
    halo: &Halo<T, 2>,
    shape: Shape<2>,
    kernel: &Kernel<W>,
    reduce: &F,
    mut out: Vec<U>,
) -> Result<Vec<U>>
where
    T: Element,
    U: Element,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
    F: Fn(&mut Window<T>) -> Option<U> + Send + Sync,
{
    let (input,) = &policies.input_policies;
    let (output,) = &policies.output_policies;
    let size = kernel.size();
    let cols = shape[1];
    if cols == 0 {
        return Ok(out);
    }

    out.par_chunks_mut(cols)
        .enumerate()
        .try_for_each(|(row, out_row)| {
            let mut window: Window<T> = Vec::with_capacity(size * size);

            for (col, cell) in out_row.iter_mut().enumerate() {
                let centre = halo.neighbour(row, col, 0, 0);
                if !input.is_no_data(&centre)
                    && !check_domain(&policies.domain_policy, (centre,), operation)?
                {
                    output.mark_no_data(cell);
                    continue;
                }

                window.clear();
                for kr in 0..size {
                    for kc in 0..size {
                        let weight = kernel.weight(kr, kc).weight();
                        if weight == 0.0 {
                            continue;
                        }
                        let value = halo.get(row + kr, col + kc);
                        if !input.is_no_data(&value) {
                            window.push((value, weight));
                        }
                    }
                }

                match reduce(&mut window) {
                    Some(value) => *cell = value,
                    None => output.mark_no_data(cell),
                }
            }

            Ok::<(), ArrayError>(())
        })?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::box_kernel;
    use crate::policy::{DomainFn, Rejecting};
    use partitioned_array::{ArrayError, Context};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_domain_violation_handling() {
        let ctx = Context::default();
        let array =
            PartitionedRaster::from_vec(&ctx, [2, 2], [1, 2], vec![1.0_f32, -1.0, 2.0, 3.0])
                .unwrap();
        let value = value_policies::<f32, f32>();

        let marking = Policies::new(
            positive_domain(),
            value.output_policies,
            value.input_policies,
        );
        let result = focal_sum(&marking, &array, &box_kernel(0))
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(result[0], 1.0);
        assert!(result[1].is_nan());
        assert_eq!(result[3], 3.0);

        let rejecting = Policies::new(
            Rejecting(positive_domain()),
            value.output_policies,
            value.input_policies,
        );
        let result = focal_sum(&rejecting, &array, &box_kernel(0))
            .unwrap()
            .to_vec()
            .await;
        assert!(matches!(result, Err(ArrayError::Domain(_))));
    }

    fn positive_domain() -> DomainFn<fn((f32,)) -> bool> {
        DomainFn::new(|(v,)| v >= 0.0)
    }
}
