//! Halo assembly: a partition's data plus a border of neighbouring cells.

use futures::future::try_join_all;
use partitioned_array::{
    copy_region, nr_elements, ArrayError, Element, PartitionedArray, Region, Result, Shape,
};
use tracing::warn;

/// A partition's cells surrounded by a border of `radius` cells.
///
/// Cells outside the array, or owned by a partition that is no longer
/// available, hold the fill value.
#[derive(Debug)]
pub(crate) struct Halo<T, const R: usize> {
    pub shape: Shape<R>,
    pub radius: usize,
    pub data: Vec<T>,
}

impl<T: Element> Halo<T, 2> {
    /// Value at position (`row`, `col`) of the halo buffer.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.shape[1] + col]
    }

    /// Value of the partition cell (`row`, `col`), shifted by (`dr`, `dc`).
    #[inline]
    pub fn neighbour(&self, row: usize, col: usize, dr: isize, dc: isize) -> T {
        let r = (row + self.radius).wrapping_add_signed(dr);
        let c = (col + self.radius).wrapping_add_signed(dc);
        self.get(r, c)
    }
}

/// Gather the halo of partition `p` of `array`.
///
/// Neighbours are fetched concurrently from every partition overlapping
/// the border, so a radius larger than a partition spans several rings.
/// An unavailable neighbour is replaced by `fill`; failure of the
/// partition itself is an error.
pub(crate) async fn fetch_halo<T: Element, const R: usize>(
    array: &PartitionedArray<T, R>,
    p: usize,
    radius: usize,
    fill: T,
) -> Result<Halo<T, R>> {
    let own = array.partition_region(p);

    // Work in coordinates shifted by `radius` so the halo origin is never
    // negative.
    let mut halo_shape = own.shape;
    let mut wanted_offset = [0; R];
    let mut wanted_end = [0; R];
    for d in 0..R {
        halo_shape[d] += 2 * radius;
        wanted_offset[d] = own.offset[d].saturating_sub(radius);
        wanted_end[d] = (own.offset[d] + own.shape[d] + radius).min(array.shape()[d]);
    }
    let halo_region = Region::new(own.offset, halo_shape);
    let mut wanted_shape = [0; R];
    for d in 0..R {
        wanted_shape[d] = wanted_end[d] - wanted_offset[d];
    }
    let wanted = Region::new(wanted_offset, wanted_shape);

    let pieces = try_join_all(array.partitions_overlapping(&wanted).into_iter().map(|q| {
        let partition = &array.partitions()[q];
        let overlap = partition.region().intersection(&wanted);
        async move {
            let Some(overlap) = overlap else {
                return Ok(None);
            };
            match partition.slice(overlap).await {
                Ok(piece) => Ok(Some((overlap, piece))),
                Err(ArrayError::RemoteAccess(reason)) if q != p => {
                    warn!(
                        partition = p,
                        neighbour = q,
                        reason = %reason,
                        "Halo neighbour unavailable, using fill value"
                    );
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }
    }))
    .await?;

    let mut data = array
        .context()
        .pool()
        .acquire_filled(nr_elements(&halo_shape), fill);
    for (overlap, piece) in pieces.into_iter().flatten() {
        let shifted = shift(&overlap, radius);
        copy_region(&piece, &shifted, &mut data, &halo_region, &shifted);
    }

    Ok(Halo {
        shape: halo_shape,
        radius,
        data,
    })
}

fn shift<const R: usize>(region: &Region<R>, by: usize) -> Region<R> {
    let mut offset = region.offset;
    for o in offset.iter_mut() {
        *o += by;
    }
    Region::new(offset, region.shape)
}
