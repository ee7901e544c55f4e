//! Test data generators for creating synthetic raster data.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a grid holding its own row-major linear index.
pub fn create_sequence_grid(width: usize, height: usize) -> Vec<i32> {
    (0..(width * height) as i32).collect()
}

/// Creates an elevation surface sloping down towards the bottom-right
/// corner, with deterministic noise.
///
/// All values are distinct for grids of up to a million cells, which keeps
/// steepest-descent networks free of ties.
pub fn create_elevation_grid(width: usize, height: usize, seed: u32) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let slope = ((height - row) + (width - col)) as f64 * 10.0;
            let noise = (simple_hash(col as u32, row as u32, seed) % 1000) as f64 / 1000.0;
            let unique = (row * width + col) as f64 * 1e-7;
            data.push(slope + noise * 4.0 + unique);
        }
    }
    data
}

/// Creates a grid with random-ish but deterministic material amounts.
///
/// Uses a simple hash-based approach for reproducibility. Most cells get
/// nothing, some get up to 50 units.
pub fn create_material_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let hash = simple_hash(col as u32, row as u32, seed);
            let amount = if hash % 4 == 0 {
                (hash % 5000) as f32 / 100.0
            } else {
                0.0
            };
            data.push(amount);
        }
    }
    data
}

/// Creates a zone grid of square blocks, `block` cells wide, numbered
/// row-major starting at 1.
pub fn create_block_zones(width: usize, height: usize, block: usize) -> Vec<i32> {
    let blocks_per_row = width.div_ceil(block);
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(((row / block) * blocks_per_row + col / block) as i32 + 1);
        }
    }
    data
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at specified positions.
///
/// `nan_positions` holds (col, row) pairs; all other cells are zero.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![0.0f32; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}
