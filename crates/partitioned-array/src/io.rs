//! Region based I/O contract with persistence layers and format adapters.
//!
//! Anything able to read a rectangular region into a buffer can feed a
//! partitioned array, and anything able to write a buffer into a region
//! can receive one. File formats and schemas live outside this crate.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::try_join_all;
use futures::FutureExt;
use tracing::debug;

use crate::array::PartitionedArray;
use crate::context::Context;
use crate::element::Element;
use crate::error::{ArrayError, Result};
use crate::partition::CopyMode;
use crate::shape::{copy_region, nr_elements, Region, Shape};

/// Source of array content, read one region at a time.
#[async_trait]
pub trait RegionSource<T: Element, const R: usize>: Send + Sync {
    /// Shape of the whole dataset.
    fn shape(&self) -> Shape<R>;

    /// Read the cells of `region` in row-major order.
    async fn read_region(&self, region: Region<R>) -> Result<Vec<T>>;
}

/// Destination for array content, written one region at a time.
#[async_trait]
pub trait RegionSink<T: Element, const R: usize>: Send + Sync {
    /// Write row-major `data` into `region`.
    async fn write_region(&self, region: Region<R>, data: &[T]) -> Result<()>;
}

impl<T: Element, const R: usize> PartitionedArray<T, R> {
    /// Create an array whose partitions are read from `source`.
    pub fn read_from<S>(ctx: &Context, source: Arc<S>, partition_shape: Shape<R>) -> Result<Self>
    where
        S: RegionSource<T, R> + 'static,
    {
        let shape = source.shape();
        Self::from_tasks(ctx, shape, partition_shape, move |_, region| {
            let source = Arc::clone(&source);
            async move { source.read_region(region).await }.boxed()
        })
    }

    /// Write every partition into `sink`.
    pub async fn write_to<S>(&self, sink: &S) -> Result<()>
    where
        S: RegionSink<T, R> + ?Sized,
    {
        try_join_all(self.partitions().iter().map(|partition| async move {
            let data = partition.data(CopyMode::Share).await?;
            sink.write_region(*partition.region(), &data).await
        }))
        .await?;

        debug!(array = %self.id(), partitions = self.nr_partitions(), "Wrote array to sink");
        Ok(())
    }
}

/// In-memory dataset implementing both sides of the contract.
pub struct MemoryRaster<T, const R: usize> {
    shape: Shape<R>,
    data: Mutex<Vec<T>>,
}

impl<T: Element, const R: usize> MemoryRaster<T, R> {
    /// Create a dataset of `shape` filled with `T::default()`.
    pub fn new(shape: Shape<R>) -> Self {
        Self {
            shape,
            data: Mutex::new(vec![T::default(); nr_elements(&shape)]),
        }
    }

    /// Create a dataset from row-major `data`.
    pub fn from_vec(shape: Shape<R>, data: Vec<T>) -> Result<Self> {
        if data.len() != nr_elements(&shape) {
            return Err(ArrayError::configuration(format!(
                "{} values do not fill a dataset of shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self {
            shape,
            data: Mutex::new(data),
        })
    }

    /// Copy of the full content.
    pub fn to_vec(&self) -> Vec<T> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_region(&self, region: &Region<R>) -> Result<()> {
        if Region::whole(self.shape).contains_region(region) {
            Ok(())
        } else {
            Err(ArrayError::configuration(format!(
                "region {} lies outside dataset of shape {:?}",
                region, self.shape
            )))
        }
    }
}

#[async_trait]
impl<T: Element, const R: usize> RegionSource<T, R> for MemoryRaster<T, R> {
    fn shape(&self) -> Shape<R> {
        self.shape
    }

    async fn read_region(&self, region: Region<R>) -> Result<Vec<T>> {
        self.check_region(&region)?;
        let mut buffer = vec![T::default(); region.nr_elements()];
        copy_region(&self.lock(), &Region::whole(self.shape), &mut buffer, &region, &region);
        Ok(buffer)
    }
}

#[async_trait]
impl<T: Element, const R: usize> RegionSink<T, R> for MemoryRaster<T, R> {
    async fn write_region(&self, region: Region<R>, data: &[T]) -> Result<()> {
        self.check_region(&region)?;
        if data.len() != region.nr_elements() {
            return Err(ArrayError::configuration(format!(
                "{} values do not fill region {}",
                data.len(),
                region
            )));
        }
        copy_region(data, &region, &mut self.lock(), &Region::whole(self.shape), &region);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_from_and_write_to() {
        let ctx = Context::default();
        let source = Arc::new(MemoryRaster::from_vec([4, 6], (0..24).collect::<Vec<u32>>()).unwrap());

        let array = PartitionedArray::read_from(&ctx, Arc::clone(&source), [2, 3]).unwrap();
        assert_eq!(array.to_vec().await.unwrap(), (0..24).collect::<Vec<u32>>());

        let sink = MemoryRaster::<u32, 2>::new([4, 6]);
        array.write_to(&sink).await.unwrap();
        assert_eq!(sink.to_vec(), source.to_vec());
    }

    #[tokio::test]
    async fn test_shape_mismatch_with_source() {
        let ctx = Context::default();
        let source = Arc::new(MemoryRaster::<f32, 2>::new([5, 5]));
        assert!(PartitionedArray::read_from(&ctx, source, [2, 2]).is_err());
    }

    #[tokio::test]
    async fn test_sink_rejects_bad_region() {
        let sink = MemoryRaster::<u8, 1>::new([4]);
        assert!(sink.write_region(Region::new([3], [2]), &[1, 2]).await.is_err());
        assert!(sink.write_region(Region::new([0], [2]), &[1]).await.is_err());
    }
}
