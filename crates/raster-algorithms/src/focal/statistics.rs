//! Focal statistics over numeric values.

use partitioned_array::{Element, FloatElement, PartitionedRaster, Result};

use super::{focal_operation, FocalPolicies, Window};
use crate::kernel::{Kernel, KernelWeight};
use crate::policy::DomainPolicy;

/// Sum of the values within the kernel. Kernel weights act as a mask.
pub fn focal_sum<T, W, D>(
    policies: &FocalPolicies<T, T, D>,
    array: &PartitionedRaster<T>,
    kernel: &Kernel<W>,
) -> Result<PartitionedRaster<T>>
where
    T: Element,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
{
    focal_operation("focal_sum", policies, array, kernel, |window: &mut Window<T>| {
        if window.is_empty() {
            return None;
        }
        // An integer overflow turns the cell into no-data
        window
            .iter()
            .try_fold(T::default(), |sum, &(value, _)| sum.checked_sum(value))
    })
}

/// Weighted mean of the values within the kernel.
pub fn focal_mean<T, W, D>(
    policies: &FocalPolicies<T, T, D>,
    array: &PartitionedRaster<T>,
    kernel: &Kernel<W>,
) -> Result<PartitionedRaster<T>>
where
    T: Element,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
{
    focal_operation("focal_mean", policies, array, kernel, |window: &mut Window<T>| {
        let (sum, weights) = window
            .iter()
            .fold((0.0, 0.0), |(sum, weights), (v, w)| (sum + w * v.as_f64(), weights + w));
        if weights == 0.0 {
            return None;
        }
        T::try_from_f64(sum / weights)
    })
}

/// Smallest value within the kernel.
pub fn focal_minimum<T, W, D>(
    policies: &FocalPolicies<T, T, D>,
    array: &PartitionedRaster<T>,
    kernel: &Kernel<W>,
) -> Result<PartitionedRaster<T>>
where
    T: Element,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
{
    focal_operation("focal_minimum", policies, array, kernel, |window: &mut Window<T>| {
        window
            .iter()
            .map(|(v, _)| *v)
            .reduce(|min, v| if v < min { v } else { min })
    })
}

/// Largest value within the kernel.
pub fn focal_maximum<T, W, D>(
    policies: &FocalPolicies<T, T, D>,
    array: &PartitionedRaster<T>,
    kernel: &Kernel<W>,
) -> Result<PartitionedRaster<T>>
where
    T: Element,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
{
    focal_operation("focal_maximum", policies, array, kernel, |window: &mut Window<T>| {
        window
            .iter()
            .map(|(v, _)| *v)
            .reduce(|max, v| if v > max { v } else { max })
    })
}

/// Sum of the values within the kernel, each multiplied by its weight.
pub fn convolve<T, W, D>(
    policies: &FocalPolicies<T, T, D>,
    array: &PartitionedRaster<T>,
    kernel: &Kernel<W>,
) -> Result<PartitionedRaster<T>>
where
    T: FloatElement,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
{
    focal_operation("convolve", policies, array, kernel, |window: &mut Window<T>| {
        if window.is_empty() {
            return None;
        }
        T::try_from_f64(window.iter().map(|(v, w)| w * v.as_f64()).sum())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focal::{default_policies, value_policies};
    use crate::kernel::box_kernel;
    use partitioned_array::Context;
    use test_utils::{assert_slice_approx_eq, create_sequence_grid};

    fn sequence(ctx: &Context) -> PartitionedRaster<i32> {
        PartitionedRaster::from_vec(ctx, [4, 4], [2, 2], create_sequence_grid(4, 4)).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_focal_sum_across_partitions() {
        let ctx = Context::default();
        let result = focal_sum(&default_policies(), &sequence(&ctx), &box_kernel(1))
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        // Halo cells hold zero under the default policies
        assert_eq!(result[0], 10);
        assert_eq!(result[5], 45);
        assert_eq!(result[10], 90);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_focal_sum_of_large_integers() {
        let ctx = Context::default();
        let big = 1_i64 << 60;
        // Sums beyond 2^53 stay exact, sums beyond i64::MAX become no-data
        let data = vec![big, 3, 0, 0, 0, 0, 0, 0, 0, 0, i64::MAX / 2 + 1, i64::MAX / 2 + 1];
        let array = PartitionedRaster::from_vec(&ctx, [2, 6], [1, 3], data).unwrap();
        let kernel = Kernel::new(1, vec![0, 0, 0, 1, 1, 1, 0, 0, 0]).unwrap();

        let result = focal_sum(&value_policies(), &array, &kernel)
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(result[0], big + 3);
        assert_eq!(result[1], big + 3);
        assert_eq!(result[10], i64::MIN);
        assert_eq!(result[11], i64::MIN);
        assert_eq!(result[9], i64::MAX / 2 + 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_focal_mean_skips_no_data_halo() {
        let ctx = Context::default();
        let data: Vec<f64> = (0..16).map(f64::from).collect();
        let array = PartitionedRaster::from_vec(&ctx, [4, 4], [2, 2], data).unwrap();
        let result = focal_mean(&value_policies(), &array, &box_kernel(1))
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        assert_eq!(result[0], 2.5);
        assert_eq!(result[5], 5.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_focal_extremes() {
        let ctx = Context::default();
        let array = sequence(&ctx);

        let minimum = focal_minimum(&value_policies(), &array, &box_kernel(1))
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        let maximum = focal_maximum(&value_policies(), &array, &box_kernel(1))
            .unwrap()
            .to_vec()
            .await
            .unwrap();

        assert_eq!(minimum[15], 10);
        assert_eq!(maximum[0], 5);
        assert_eq!(maximum[6], 11);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_convolve_with_weights() {
        let ctx = Context::default();
        let array = PartitionedRaster::filled(&ctx, [3, 3], [3, 3], 2.0_f32).unwrap();
        let kernel = Kernel::from_rows(vec![
            vec![0.0, 0.5, 0.0],
            vec![0.5, 1.0, 0.5],
            vec![0.0, 0.5, 0.0],
        ])
        .unwrap();

        let result = convolve(&value_policies(), &array, &kernel)
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_slice_approx_eq!(&result[4..5], &[6.0_f32], 1e-6);
        assert_slice_approx_eq!(&result[0..1], &[4.0_f32], 1e-6);
    }
}
