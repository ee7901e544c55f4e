//! Square kernels defining focal neighbourhoods.

use partitioned_array::{ArrayError, Result};

/// Weight stored in a kernel cell.
pub trait KernelWeight: Copy + std::fmt::Debug + Send + Sync + 'static {
    fn weight(&self) -> f64;
}

impl KernelWeight for bool {
    #[inline]
    fn weight(&self) -> f64 {
        if *self {
            1.0
        } else {
            0.0
        }
    }
}

macro_rules! impl_numeric_weight {
    ($($t:ty),*) => {
        $(
            impl KernelWeight for $t {
                #[inline]
                fn weight(&self) -> f64 {
                    *self as f64
                }
            }
        )*
    };
}

impl_numeric_weight!(f32, f64, u8, u16, u32, i8, i16, i32);

/// A square weight matrix with side `2 * radius + 1`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel<W> {
    radius: usize,
    weights: Vec<W>,
}

impl<W: KernelWeight> Kernel<W> {
    pub fn new(radius: usize, weights: Vec<W>) -> Result<Self> {
        let size = 2 * radius + 1;
        if weights.len() != size * size {
            return Err(ArrayError::configuration(format!(
                "kernel of radius {} needs {} weights, got {}",
                radius,
                size * size,
                weights.len()
            )));
        }
        Ok(Self { radius, weights })
    }

    /// Build a kernel from its rows, which must form an odd-sized square.
    pub fn from_rows(rows: Vec<Vec<W>>) -> Result<Self> {
        let size = rows.len();
        if size % 2 == 0 || rows.iter().any(|row| row.len() != size) {
            return Err(ArrayError::configuration(format!(
                "kernel rows must form an odd-sized square, got {} rows",
                size
            )));
        }
        Self::new(size / 2, rows.into_iter().flatten().collect())
    }

    /// Kernel with every weight set to `weight`.
    pub fn filled(radius: usize, weight: W) -> Self {
        let size = 2 * radius + 1;
        Self {
            radius,
            weights: vec![weight; size * size],
        }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Side length of the kernel.
    pub fn size(&self) -> usize {
        2 * self.radius + 1
    }

    pub fn weights(&self) -> &[W] {
        &self.weights
    }

    #[inline]
    pub fn weight(&self, row: usize, col: usize) -> W {
        self.weights[row * self.size() + col]
    }

    /// Whether every weight is zero, in which case focal results are
    /// no-data everywhere.
    pub fn is_empty(&self) -> bool {
        self.weights.iter().all(|w| w.weight() == 0.0)
    }
}

/// Kernel including every cell within the square of `radius`.
pub fn box_kernel(radius: usize) -> Kernel<bool> {
    Kernel::filled(radius, true)
}

/// Kernel including the cells whose centre lies within `radius` cells of
/// the kernel centre.
pub fn circle_kernel(radius: usize) -> Kernel<bool> {
    let size = 2 * radius + 1;
    let r = radius as i64;
    let weights = (0..size * size)
        .map(|i| {
            let dr = (i / size) as i64 - r;
            let dc = (i % size) as i64 - r;
            dr * dr + dc * dc <= r * r
        })
        .collect();
    Kernel { radius, weights }
}
