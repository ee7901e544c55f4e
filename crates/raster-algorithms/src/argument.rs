//! Algorithm parameters given either as a scalar or as a raster.

use partitioned_array::{Buffer, Element, PartitionedRaster, Result};

/// A parameter that is constant over the array or varies per cell.
#[derive(Debug, Clone)]
pub enum Argument<T> {
    Scalar(T),
    Array(PartitionedRaster<T>),
}

impl<T: Element> From<T> for Argument<T> {
    fn from(value: T) -> Self {
        Self::Scalar(value)
    }
}

impl<T> From<PartitionedRaster<T>> for Argument<T> {
    fn from(array: PartitionedRaster<T>) -> Self {
        Self::Array(array)
    }
}

impl<T: Element> From<&PartitionedRaster<T>> for Argument<T> {
    fn from(array: &PartitionedRaster<T>) -> Self {
        Self::Array(array.clone())
    }
}

impl<T: Element> Argument<T> {
    /// Fail unless an array argument is aligned with `reference`.
    pub(crate) fn check_aligned<U: Element>(
        &self,
        reference: &PartitionedRaster<U>,
        what: &str,
    ) -> Result<()> {
        match self {
            Self::Scalar(_) => Ok(()),
            Self::Array(array) => reference.check_aligned(array, what),
        }
    }

    /// Values of partition `p`, obtained without borrowing `self`.
    pub(crate) fn partition_values(
        &self,
        p: usize,
    ) -> impl std::future::Future<Output = Result<ArgumentValues<T>>> + Send + 'static {
        let argument = self.clone();
        async move {
            match argument {
                Self::Scalar(value) => Ok(ArgumentValues::Scalar(value)),
                Self::Array(array) => Ok(ArgumentValues::Cells(
                    array.partition_data_task(p).await?,
                )),
            }
        }
    }
}

/// Per-partition view of an [`Argument`].
#[derive(Debug)]
pub(crate) enum ArgumentValues<T> {
    Scalar(T),
    Cells(Buffer<T>),
}

impl<T: Element> ArgumentValues<T> {
    #[inline]
    pub fn get(&self, idx: usize) -> T {
        match self {
            Self::Scalar(value) => *value,
            Self::Cells(cells) => cells[idx],
        }
    }
}
