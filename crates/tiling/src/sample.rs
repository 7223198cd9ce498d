//! Mercator tile reads from raster arrays.
//!
//! This is the reader capability tile engines rely on: given a tile
//! coordinate and size, return a pixel block with a validity mask, or report
//! that the tile lies outside the data.

use renderer::TileBlock;
use tile_common::{mercator_to_lonlat, tile_bounds, tile_mercator_bounds, TileCoord};

use crate::error::ReadError;
use crate::raster::{Crs, RasterArray};

/// Sample one timestep of `array` onto a mercator tile.
///
/// Each output pixel takes the nearest source pixel under its centre.
/// Pixels off the source grid are masked invalid, as are pixels whose
/// bands are all nodata or NaN.
pub fn read_mercator_tile(
    array: &RasterArray,
    time: usize,
    coord: TileCoord,
    tile_size: usize,
) -> Result<TileBlock, ReadError> {
    if !coord.is_valid() {
        return Err(ReadError::InvalidRaster(format!("invalid tile coordinate {}", coord)));
    }
    if time >= array.time_len() {
        return Err(ReadError::InvalidRaster(format!(
            "timestep {} out of range for {} timesteps",
            time,
            array.time_len()
        )));
    }
    if !tile_intersects(array, &coord) {
        return Err(ReadError::OutOfBounds(coord));
    }

    let merc = tile_mercator_bounds(&coord);
    let res = merc.width() / tile_size as f64;
    let bands = array.band_count();
    let plane = tile_size * tile_size;
    let mut data = vec![f32::NAN; bands * plane];
    let mut mask = vec![false; plane];

    for j in 0..tile_size {
        let my = merc.max_y - (j as f64 + 0.5) * res;
        for i in 0..tile_size {
            let mx = merc.min_x + (i as f64 + 0.5) * res;
            let (x, y) = match array.crs {
                Crs::WebMercator => (mx, my),
                Crs::Geographic => mercator_to_lonlat(mx, my),
            };

            let (col, row) = array.transform.world_to_pixel(x, y);
            if col < 0.0 || row < 0.0 {
                continue;
            }
            let (col, row) = (col.floor() as usize, row.floor() as usize);
            if col >= array.width() || row >= array.height() {
                continue;
            }

            let idx = j * tile_size + i;
            let mut valid = false;
            for band in 0..bands {
                let value = array.value(time, band, row, col);
                data[band * plane + idx] = value;
                valid |= array.is_valid(value);
            }
            // Masked only when every band is nodata or NaN
            mask[idx] = valid;
        }
    }

    TileBlock::new(bands, tile_size, tile_size, data, mask)
        .map_err(|e| ReadError::InvalidRaster(e.to_string()))
}

/// Tile footprint overlaps the source extent, compared in the source CRS.
fn tile_intersects(array: &RasterArray, coord: &TileCoord) -> bool {
    let native = array.native_bounds();
    match array.crs {
        Crs::Geographic => tile_bounds(coord).intersects(&native),
        Crs::WebMercator => tile_mercator_bounds(coord).intersects(&native),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use tile_common::lonlat_to_mercator;

    fn world_array(value: f32) -> RasterArray {
        // 1 degree global grid
        RasterArray::new(
            (1, 1, 180, 360),
            vec![value; 180 * 360],
            GeoTransform::new(-180.0, 90.0, 1.0, 1.0),
            Crs::Geographic,
        )
        .unwrap()
    }

    #[test]
    fn test_world_tile_fully_valid() {
        let block = read_mercator_tile(&world_array(7.0), 0, TileCoord::new(0, 0, 0), 16).unwrap();
        assert_eq!(block.width, 16);
        assert_eq!(block.valid_count(), 256);
        assert!(block.data.iter().all(|v| *v == 7.0));
    }

    #[test]
    fn test_tile_outside_source_is_out_of_bounds() {
        let array = RasterArray::new(
            (1, 1, 10, 10),
            vec![1.0; 100],
            GeoTransform::new(5.0, 50.0, 1.0, 0.5),
            Crs::Geographic,
        )
        .unwrap();
        // z2 tile 0/0 covers the north-west quadrant of the Americas
        let err = read_mercator_tile(&array, 0, TileCoord::new(2, 0, 0), 8).unwrap_err();
        assert!(matches!(err, ReadError::OutOfBounds(_)));
    }

    #[test]
    fn test_partial_coverage_masks_outside_pixels() {
        // Eastern hemisphere only
        let array = RasterArray::new(
            (1, 1, 180, 180),
            vec![1.0; 180 * 180],
            GeoTransform::new(0.0, 90.0, 1.0, 1.0),
            Crs::Geographic,
        )
        .unwrap();
        let block = read_mercator_tile(&array, 0, TileCoord::new(0, 0, 0), 8).unwrap();
        for j in 0..8 {
            for i in 0..8 {
                assert_eq!(block.mask[j * 8 + i], i >= 4, "pixel ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_nodata_masked() {
        let array = world_array(-9999.0).with_nodata(Some(-9999.0));
        let block = read_mercator_tile(&array, 0, TileCoord::new(1, 1, 0), 4).unwrap();
        assert_eq!(block.valid_count(), 0);
    }

    #[test]
    fn test_multiband_nodata_needs_every_band() {
        // Pure red RGBA with nodata 0: zero channels are still data
        let plane = 180 * 360;
        let mut data = Vec::with_capacity(4 * plane);
        for value in [255.0, 0.0, 0.0, 255.0] {
            data.extend(std::iter::repeat(value).take(plane));
        }
        // Western hemisphere fully zero in every band
        for band in 0..4 {
            for row in 0..180 {
                for col in 0..180 {
                    data[band * plane + row * 360 + col] = 0.0;
                }
            }
        }
        let array = RasterArray::new(
            (1, 4, 180, 360),
            data,
            GeoTransform::new(-180.0, 90.0, 1.0, 1.0),
            Crs::Geographic,
        )
        .unwrap()
        .with_nodata(Some(0.0));

        let block = read_mercator_tile(&array, 0, TileCoord::new(0, 0, 0), 8).unwrap();
        let east = 3 * 8 + 6;
        assert!(block.mask[east]);
        let pixel: Vec<f32> = (0..4).map(|b| block.band(b)[east]).collect();
        assert_eq!(pixel, vec![255.0, 0.0, 0.0, 255.0]);
        assert!(!block.mask[3 * 8 + 1]);
    }

    #[test]
    fn test_web_mercator_source() {
        let (x0, y0) = lonlat_to_mercator(-180.0, 85.0511287798066);
        let array = RasterArray::new(
            (1, 1, 4, 4),
            (0..16).map(|v| v as f32).collect(),
            GeoTransform::new(x0, y0, -x0 / 2.0, y0 / 2.0),
            Crs::WebMercator,
        )
        .unwrap();
        // z1 tile (1, 1) is the south-east quadrant: source rows 2..4, cols 2..4
        let block = read_mercator_tile(&array, 0, TileCoord::new(1, 1, 1), 2).unwrap();
        assert_eq!(block.data, vec![10.0, 11.0, 14.0, 15.0]);
        assert_eq!(block.valid_count(), 4);
    }
}
