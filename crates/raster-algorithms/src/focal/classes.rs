//! Focal operations over class values.

use partitioned_array::{Element, PartitionedRaster, Result, ZoneElement};

use super::{focal_operation, FocalPolicies, Window};
use crate::kernel::{Kernel, KernelWeight};
use crate::policy::DomainPolicy;

/// Most frequent value within the kernel. Ties go to the smallest value.
pub fn focal_majority<T, W, D>(
    policies: &FocalPolicies<T, T, D>,
    array: &PartitionedRaster<T>,
    kernel: &Kernel<W>,
) -> Result<PartitionedRaster<T>>
where
    T: ZoneElement,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
{
    focal_operation("focal_majority", policies, array, kernel, |window: &mut Window<T>| {
        window.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        majority_of_sorted(window.iter().map(|(v, _)| *v))
    })
}

/// Number of distinct values within the kernel.
pub fn focal_diversity<T, U, W, D>(
    policies: &FocalPolicies<T, U, D>,
    array: &PartitionedRaster<T>,
    kernel: &Kernel<W>,
) -> Result<PartitionedRaster<U>>
where
    T: ZoneElement,
    U: Element,
    W: KernelWeight,
    D: DomainPolicy<(T,)>,
{
    focal_operation("focal_diversity", policies, array, kernel, |window: &mut Window<T>| {
        if window.is_empty() {
            return None;
        }
        window.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        window.dedup_by(|a, b| a.0 == b.0);
        U::try_from_f64(window.len() as f64)
    })
}

/// Value with the longest run in a sorted sequence; the first run wins
/// ties.
pub(crate) fn majority_of_sorted<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    let mut current: Option<(T, usize)> = None;

    for value in values {
        current = match current {
            Some((v, n)) if v == value => Some((v, n + 1)),
            _ => Some((value, 1)),
        };
        if let Some((v, n)) = current {
            if best.map_or(true, |(_, m)| n > m) {
                best = Some((v, n));
            }
        }
    }

    best.map(|(v, _)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focal::{default_policies, value_policies};
    use crate::kernel::box_kernel;
    use partitioned_array::Context;

    #[test]
    fn test_majority_ties_go_to_smallest() {
        assert_eq!(majority_of_sorted([1, 1, 2, 2, 3].into_iter()), Some(1));
        assert_eq!(majority_of_sorted([1, 2, 2, 3].into_iter()), Some(2));
        assert_eq!(majority_of_sorted(std::iter::empty::<i32>()), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_focal_majority_and_diversity() {
        let ctx = Context::default();
        #[rustfmt::skip]
        let classes = vec![
            1, 1, 2,
            3, 2, 2,
            3, 3, i32::MIN,
        ];
        let array = PartitionedRaster::from_vec(&ctx, [3, 3], [1, 3], classes).unwrap();

        let majority = focal_majority(&value_policies(), &array, &box_kernel(1))
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(majority[4], 2);
        assert_eq!(majority[0], 1);
        // The no-data corner is skipped
        assert_eq!(majority[8], 2);

        let diversity: Vec<u8> = focal_diversity(&value_policies(), &array, &box_kernel(1))
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(diversity[4], 3);
        assert_eq!(diversity[2], 1 + 1);
    }

    #[tokio::test]
    async fn test_zero_kernel_gives_default_without_marking() {
        let ctx = Context::default();
        let array = PartitionedRaster::filled(&ctx, [2, 2], [2, 2], 4_u16).unwrap();
        let result = focal_majority(&default_policies(), &array, &Kernel::filled(1, false))
            .unwrap()
            .to_vec()
            .await
            .unwrap();
        assert_eq!(result, vec![0; 4]);
    }
}
