//! Test data generators for creating synthetic raster data.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite. All grids are row-major.

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

/// Creates a grid where every cell has the same value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a west-to-east ramp from `min` in the first column to `max` in
/// the last.
pub fn create_ramp_grid(width: usize, height: usize, min: f32, max: f32) -> Vec<f32> {
    let span = (width.max(2) - 1) as f32;
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            data.push(min + (max - min) * col as f32 / span);
        }
    }
    data
}

/// Creates a grid with `nodata` at the given (row, col) positions and
/// `value` elsewhere.
pub fn create_grid_with_nodata(
    width: usize,
    height: usize,
    value: f32,
    nodata: f32,
    holes: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = create_constant_grid(width, height, value);
    for &(row, col) in holes {
        if row < height && col < width {
            data[row * width + col] = nodata;
        }
    }
    data
}

/// Creates a stack of constant grids, one per timestep, in time-major
/// order. Timestep `t` holds `values[t]`.
pub fn create_time_stack(width: usize, height: usize, values: &[f32]) -> Vec<f32> {
    values
        .iter()
        .flat_map(|&v| create_constant_grid(width, height, v))
        .collect()
}

/// Interleaves per-band planes into chunky pixel order (RGBARGBA...).
pub fn interleave_bands(planes: &[Vec<f32>]) -> Vec<f32> {
    let pixels = planes.first().map_or(0, |p| p.len());
    let mut data = Vec::with_capacity(pixels * planes.len());
    for i in 0..pixels {
        for plane in planes {
            data.push(plane[i]);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(3, 2);
        assert_eq!(grid, vec![0.0, 1000.0, 2000.0, 1.0, 1001.0, 2001.0]);
    }

    #[test]
    fn test_create_ramp_grid() {
        let grid = create_ramp_grid(5, 2, 0.0, 100.0);
        assert_eq!(&grid[..5], &[0.0, 25.0, 50.0, 75.0, 100.0]);
        assert_eq!(&grid[5..], &grid[..5]);
    }

    #[test]
    fn test_create_grid_with_nodata() {
        let grid = create_grid_with_nodata(3, 3, 1.0, -9999.0, &[(0, 0), (2, 1), (9, 9)]);
        assert_eq!(grid[0], -9999.0);
        assert_eq!(grid[7], -9999.0);
        assert_eq!(grid.iter().filter(|v| **v == 1.0).count(), 7);
    }

    #[test]
    fn test_create_time_stack() {
        let stack = create_time_stack(2, 1, &[1.0, 2.0, 3.0]);
        assert_eq!(stack, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_interleave_bands() {
        let r = vec![1.0, 2.0];
        let g = vec![3.0, 4.0];
        assert_eq!(interleave_bands(&[r, g]), vec![1.0, 3.0, 2.0, 4.0]);
    }
}
