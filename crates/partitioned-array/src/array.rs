//! Partitioned arrays: a global shape plus a grid of partition handles.

use std::future::Future;
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tracing::debug;
use uuid::Uuid;

use crate::context::Context;
use crate::element::Element;
use crate::error::{ArrayError, Result};
use crate::partition::{ArrayPartition, CopyMode};
use crate::shape::{
    copy_region, index_from_linear, linear_index, nr_elements, partition_grid_shape, Offset,
    Region, Shape,
};

struct ArrayInner<T, const R: usize> {
    id: Uuid,
    ctx: Context,
    shape: Shape<R>,
    partition_shape: Shape<R>,
    grid_shape: Shape<R>,
    partitions: Vec<ArrayPartition<T, R>>,
}

/// An n-dimensional array split into equally shaped partitions.
///
/// Cloning is cheap and yields another reference to the same partitions.
/// Algorithms never modify partitions of their inputs; every operation
/// produces a new array, so arrays behave as values even while the
/// computations producing them are still running.
pub struct PartitionedArray<T, const R: usize> {
    inner: Arc<ArrayInner<T, R>>,
}

/// A two-dimensional partitioned array.
pub type PartitionedRaster<T> = PartitionedArray<T, 2>;

impl<T, const R: usize> Clone for PartitionedArray<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element, const R: usize> PartitionedArray<T, R> {
    /// Create an array whose elements are all `T::default()`.
    pub fn new(ctx: &Context, shape: Shape<R>, partition_shape: Shape<R>) -> Result<Self> {
        Self::filled(ctx, shape, partition_shape, T::default())
    }

    /// Create an array with every element set to `value`.
    pub fn filled(
        ctx: &Context,
        shape: Shape<R>,
        partition_shape: Shape<R>,
        value: T,
    ) -> Result<Self> {
        let pool = ctx.pool().clone();
        Self::from_tasks(ctx, shape, partition_shape, move |_, region| {
            let data = pool.acquire_filled(region.nr_elements(), value);
            async move { Ok(data) }.boxed()
        })
    }

    /// Create an array from row-major `data` covering the whole shape.
    pub fn from_vec(
        ctx: &Context,
        shape: Shape<R>,
        partition_shape: Shape<R>,
        data: Vec<T>,
    ) -> Result<Self> {
        if data.len() != nr_elements(&shape) {
            return Err(ArrayError::configuration(format!(
                "{} values do not fill an array of shape {:?}",
                data.len(),
                shape
            )));
        }

        let whole = Region::whole(shape);
        let pool = ctx.pool().clone();
        Self::from_tasks(ctx, shape, partition_shape, move |_, region| {
            let mut part = pool.acquire_filled(region.nr_elements(), T::default());
            copy_region(&data, &whole, &mut part, &region, &region);
            async move { Ok(part) }.boxed()
        })
    }

    /// Create an array whose partitions are produced by asynchronous tasks.
    ///
    /// `make_task` is called once per partition with its linear index in
    /// the partition grid and its region. The partitions exist immediately;
    /// requests to them are answered once their task completes. Must be
    /// called from within a Tokio runtime.
    pub fn from_tasks<F>(
        ctx: &Context,
        shape: Shape<R>,
        partition_shape: Shape<R>,
        mut make_task: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, Region<R>) -> BoxFuture<'static, Result<Vec<T>>>,
    {
        let grid_shape = partition_grid_shape(&shape, &partition_shape)?;
        let nr_partitions = nr_elements(&grid_shape);
        let cluster = ctx.cluster();

        let partitions = (0..nr_partitions)
            .map(|p| {
                let region = partition_region(&grid_shape, &partition_shape, p);
                let locality = cluster.placement(p, nr_partitions);
                ArrayPartition::spawn(region, locality, ctx.pool().clone(), make_task(p, region))
            })
            .collect();

        let id = Uuid::new_v4();
        debug!(
            array = %id,
            element = T::TYPE_NAME,
            shape = ?shape,
            partition_shape = ?partition_shape,
            partitions = nr_partitions,
            "Created partitioned array"
        );

        Ok(Self {
            inner: Arc::new(ArrayInner {
                id,
                ctx: ctx.clone(),
                shape,
                partition_shape,
                grid_shape,
                partitions,
            }),
        })
    }

    /// Create an array with the same shape and partitioning as `self`.
    pub fn from_tasks_like<U: Element, F>(&self, make_task: F) -> Result<PartitionedArray<U, R>>
    where
        F: FnMut(usize, Region<R>) -> BoxFuture<'static, Result<Vec<U>>>,
    {
        PartitionedArray::from_tasks(
            &self.inner.ctx,
            self.inner.shape,
            self.inner.partition_shape,
            make_task,
        )
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn context(&self) -> &Context {
        &self.inner.ctx
    }

    pub fn shape(&self) -> Shape<R> {
        self.inner.shape
    }

    pub fn partition_shape(&self) -> Shape<R> {
        self.inner.partition_shape
    }

    /// Number of partitions along each dimension.
    pub fn partition_grid_shape(&self) -> Shape<R> {
        self.inner.grid_shape
    }

    pub fn nr_elements(&self) -> usize {
        nr_elements(&self.inner.shape)
    }

    pub fn nr_partitions(&self) -> usize {
        self.inner.partitions.len()
    }

    pub fn partitions(&self) -> &[ArrayPartition<T, R>] {
        &self.inner.partitions
    }

    /// Partition by linear index in the partition grid.
    pub fn partition(&self, idx: usize) -> Option<&ArrayPartition<T, R>> {
        self.inner.partitions.get(idx)
    }

    /// Partition by position in the partition grid.
    pub fn partition_at(&self, grid_idx: &Offset<R>) -> Option<&ArrayPartition<T, R>> {
        if (0..R).any(|d| grid_idx[d] >= self.inner.grid_shape[d]) {
            return None;
        }
        self.partition(linear_index(&self.inner.grid_shape, grid_idx))
    }

    /// Region of partition `idx`, computed locally.
    pub fn partition_region(&self, idx: usize) -> Region<R> {
        partition_region(&self.inner.grid_shape, &self.inner.partition_shape, idx)
    }

    /// Linear index of the partition containing the global cell `idx`.
    pub fn partition_containing(&self, idx: &Offset<R>) -> usize {
        let mut grid_idx = [0; R];
        for d in 0..R {
            grid_idx[d] = idx[d] / self.inner.partition_shape[d];
        }
        linear_index(&self.inner.grid_shape, &grid_idx)
    }

    /// Linear indices of the partitions overlapping `region`.
    ///
    /// The region is clipped to the array first; partitions are returned in
    /// row-major grid order.
    pub fn partitions_overlapping(&self, region: &Region<R>) -> Vec<usize> {
        let Some(region) = Region::whole(self.inner.shape).intersection(region) else {
            return Vec::new();
        };

        let mut first = [0; R];
        let mut count = [0; R];
        for d in 0..R {
            let size = self.inner.partition_shape[d];
            first[d] = region.offset[d] / size;
            count[d] = (region.offset[d] + region.shape[d] - 1) / size - first[d] + 1;
        }

        (0..nr_elements(&count))
            .map(|i| {
                let rel = index_from_linear(&count, i);
                let mut grid_idx = [0; R];
                for d in 0..R {
                    grid_idx[d] = first[d] + rel[d];
                }
                linear_index(&self.inner.grid_shape, &grid_idx)
            })
            .collect()
    }

    /// Whether `other` has the same shape and partitioning.
    pub fn is_aligned_with<U: Element>(&self, other: &PartitionedArray<U, R>) -> bool {
        self.inner.shape == other.shape() && self.inner.partition_shape == other.partition_shape()
    }

    /// Fail with a configuration error unless `other` is aligned with `self`.
    pub fn check_aligned<U: Element>(&self, other: &PartitionedArray<U, R>, what: &str) -> Result<()> {
        if self.is_aligned_with(other) {
            Ok(())
        } else {
            Err(ArrayError::configuration(format!(
                "{} has shape {:?} partitioned as {:?}, expected {:?} partitioned as {:?}",
                what,
                other.shape(),
                other.partition_shape(),
                self.inner.shape,
                self.inner.partition_shape
            )))
        }
    }

    /// Wait until every partition holds its data.
    pub async fn wait(&self) -> Result<()> {
        try_join_all(self.inner.partitions.iter().map(|p| p.ready())).await?;
        Ok(())
    }

    /// Read the cells of `region` into a row-major buffer.
    pub async fn read_region(&self, region: Region<R>) -> Result<Vec<T>> {
        if !Region::whole(self.inner.shape).contains_region(&region) {
            return Err(ArrayError::configuration(format!(
                "region {} lies outside array of shape {:?}",
                region, self.inner.shape
            )));
        }

        let pieces = try_join_all(self.partitions_overlapping(&region).into_iter().map(|p| {
            let partition = &self.inner.partitions[p];
            let overlap = partition.region().intersection(&region);
            async move {
                match overlap {
                    Some(overlap) => Ok(Some((overlap, partition.slice(overlap).await?))),
                    None => Ok::<_, ArrayError>(None),
                }
            }
        }))
        .await?;

        let mut data = self
            .inner
            .ctx
            .pool()
            .acquire_filled(region.nr_elements(), T::default());
        for (overlap, piece) in pieces.into_iter().flatten() {
            copy_region(&piece, &overlap, &mut data, &region, &overlap);
        }

        Ok(data)
    }

    /// Read the whole array in row-major order.
    pub async fn to_vec(&self) -> Result<Vec<T>> {
        self.read_region(Region::whole(self.inner.shape)).await
    }

    /// Shared views of all partition buffers, in partition order.
    pub async fn partition_data(&self) -> Result<Vec<crate::partition::Buffer<T>>> {
        try_join_all(self.inner.partitions.iter().map(|p| p.data(CopyMode::Share))).await
    }

    /// Future resolving to the shared data of partition `idx`, independent
    /// of the lifetime of `self`.
    pub fn partition_data_task(
        &self,
        idx: usize,
    ) -> impl Future<Output = Result<crate::partition::Buffer<T>>> + Send + 'static {
        let partition = self.inner.partitions.get(idx).cloned();
        async move {
            match partition {
                Some(partition) => partition.data(CopyMode::Share).await,
                None => Err(ArrayError::configuration(format!(
                    "partition index {} out of range",
                    idx
                ))),
            }
        }
    }
}

/// Region of partition `idx` in a grid of equally shaped partitions.
pub fn partition_region<const R: usize>(
    grid_shape: &Shape<R>,
    partition_shape: &Shape<R>,
    idx: usize,
) -> Region<R> {
    let grid_idx = index_from_linear(grid_shape, idx);
    let mut offset = [0; R];
    for d in 0..R {
        offset[d] = grid_idx[d] * partition_shape[d];
    }
    Region::new(offset, *partition_shape)
}

impl<T, const R: usize> std::fmt::Debug for PartitionedArray<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedArray")
            .field("id", &self.inner.id)
            .field("shape", &self.inner.shape)
            .field("partition_shape", &self.inner.partition_shape)
            .field("partitions", &self.inner.partitions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_4x4_roundtrip_over_four_partitions() {
        let ctx = Context::with_localities(2).unwrap();
        let data: Vec<i32> = (0..16).collect();
        let array = PartitionedArray::from_vec(&ctx, [4, 4], [2, 2], data.clone()).unwrap();

        assert_eq!(array.nr_partitions(), 4);
        assert_eq!(array.partition_grid_shape(), [2, 2]);
        assert_eq!(array.to_vec().await.unwrap(), data);

        let first = array.partition(0).unwrap().data(CopyMode::Copy).await.unwrap();
        assert_eq!(&*first, &[0, 1, 4, 5]);
    }

    #[tokio::test]
    async fn test_non_tiling_partition_shape_is_rejected() {
        let ctx = Context::default();
        let err = PartitionedArray::<f32, 2>::new(&ctx, [5, 4], [2, 2]).unwrap_err();
        assert!(matches!(err, ArrayError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_from_vec_length_mismatch() {
        let ctx = Context::default();
        let err = PartitionedArray::from_vec(&ctx, [2, 2], [1, 1], vec![1u8; 3]).unwrap_err();
        assert!(matches!(err, ArrayError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_partitions_overlapping() {
        let ctx = Context::default();
        let array = PartitionedArray::<u8, 2>::new(&ctx, [6, 6], [2, 3]).unwrap();

        assert_eq!(array.partitions_overlapping(&Region::new([1, 2], [2, 2])), vec![0, 1, 2, 3]);
        assert_eq!(array.partitions_overlapping(&Region::new([4, 0], [2, 3])), vec![4]);
        assert!(array.partitions_overlapping(&Region::new([6, 0], [1, 1])).is_empty());
        assert_eq!(array.partition_containing(&[5, 5]), 5);
    }

    #[tokio::test]
    async fn test_read_region_across_partitions() {
        let ctx = Context::default();
        let data: Vec<u16> = (0..36).collect();
        let array = PartitionedArray::from_vec(&ctx, [6, 6], [2, 2], data).unwrap();

        let region = array.read_region(Region::new([1, 1], [3, 2])).await.unwrap();
        assert_eq!(region, vec![7, 8, 13, 14, 19, 20]);

        assert!(array.read_region(Region::new([5, 5], [2, 1])).await.is_err());
    }

    #[tokio::test]
    async fn test_filled_and_wait() {
        let ctx = Context::default();
        let array = PartitionedArray::filled(&ctx, [3, 4], [3, 2], 2.5_f64).unwrap();
        array.wait().await.unwrap();
        assert_eq!(array.to_vec().await.unwrap(), vec![2.5; 12]);
    }

    #[tokio::test]
    async fn test_one_dimensional_array() {
        let ctx = Context::default();
        let array = PartitionedArray::from_vec(&ctx, [6], [2], vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(array.read_region(Region::new([1], [4])).await.unwrap(), vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_alignment_check() {
        let ctx = Context::default();
        let a = PartitionedArray::<u8, 2>::new(&ctx, [4, 4], [2, 2]).unwrap();
        let b = PartitionedArray::<f32, 2>::new(&ctx, [4, 4], [4, 4]).unwrap();
        assert!(a.check_aligned(&a, "a").is_ok());
        assert!(a.check_aligned(&b, "b").is_err());
    }
}
