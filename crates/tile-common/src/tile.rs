//! Web mercator tile pyramid math.
//!
//! Tiles follow the XYZ convention: zoom `z` splits the mercator square into
//! `2^z` columns and rows, with row 0 at the north edge.

use crate::bbox::BoundingBox;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Highest zoom level the pyramid supports (`2^24` columns still fit in a `u32`).
pub const MAX_ZOOM: u32 = 24;

/// Half the circumference of the web mercator sphere, in meters.
pub const MERCATOR_EXTENT: f64 = 20037508.342789244;

const LL_EPSILON: f64 = 1e-11;
const TILE_EPSILON: f64 = 1e-14;

/// A tile coordinate (z/x/y).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Column and row are both inside `[0, 2^z)`.
    pub fn is_valid(&self) -> bool {
        if self.z > MAX_ZOOM {
            return false;
        }
        let n = 1u32 << self.z;
        self.x < n && self.y < n
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Inclusive range of zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: u32,
    pub max: u32,
}

impl ZoomRange {
    pub fn new(min: u32, max: u32) -> Result<Self, ZoomRangeError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// A range covering exactly one zoom level.
    pub fn single(zoom: u32) -> Result<Self, ZoomRangeError> {
        Self::new(zoom, zoom)
    }

    pub fn validate(&self) -> Result<(), ZoomRangeError> {
        if self.min > self.max {
            return Err(ZoomRangeError::Inverted {
                min: self.min,
                max: self.max,
            });
        }
        if self.max > MAX_ZOOM {
            return Err(ZoomRangeError::TooDeep(self.max));
        }
        Ok(())
    }

    pub fn contains(&self, zoom: u32) -> bool {
        zoom >= self.min && zoom <= self.max
    }

    pub fn levels(&self) -> impl Iterator<Item = u32> {
        self.min..=self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ZoomRangeError {
    #[error("Minimum zoom {min} is greater than maximum zoom {max}")]
    Inverted { min: u32, max: u32 },

    #[error("Zoom level {0} exceeds the maximum supported zoom of {MAX_ZOOM}")]
    TooDeep(u32),
}

/// Convert lat/lon to the web mercator tile containing it.
///
/// Points on or beyond the edges of the world are clamped to the outermost tile.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileCoord {
    let n = (1u64 << zoom) as f64;
    let max_index = (1u64 << zoom) - 1;

    let x = lon / 360.0 + 0.5;
    let sin_lat = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / PI;

    let to_index = |v: f64| -> u32 {
        if v.is_nan() || v <= 0.0 {
            0
        } else if v >= 1.0 {
            max_index as u32
        } else {
            (((v + TILE_EPSILON) * n).floor() as u64).min(max_index) as u32
        }
    };

    TileCoord {
        z: zoom,
        x: to_index(x),
        y: to_index(y),
    }
}

/// Geographic (lat/lon) bounds of a web mercator tile.
pub fn tile_bounds(coord: &TileCoord) -> BoundingBox {
    let n = (1u64 << coord.z) as f64;

    let lon_min = coord.x as f64 / n * 360.0 - 180.0;
    let lon_max = (coord.x as f64 + 1.0) / n * 360.0 - 180.0;

    let lat_max = tile_row_to_lat(coord.y as f64, n);
    let lat_min = tile_row_to_lat(coord.y as f64 + 1.0, n);

    BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
}

/// Bounds of a web mercator tile in EPSG:3857 meters.
pub fn tile_mercator_bounds(coord: &TileCoord) -> BoundingBox {
    let n = (1u64 << coord.z) as f64;
    let span = 2.0 * MERCATOR_EXTENT / n;

    let min_x = -MERCATOR_EXTENT + coord.x as f64 * span;
    let max_y = MERCATOR_EXTENT - coord.y as f64 * span;

    BoundingBox::new(min_x, max_y - span, min_x + span, max_y)
}

/// Latitude of a (fractional) tile row edge at a zoom with `n` rows.
pub fn tile_row_to_lat(row: f64, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * row / n)).sinh().atan().to_degrees()
}

/// Project lon/lat degrees to EPSG:3857 meters.
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon.to_radians() * 6378137.0;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * 6378137.0;
    (x, y)
}

/// Unproject EPSG:3857 meters to lon/lat degrees.
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / 6378137.0).to_degrees();
    let lat = (2.0 * (y / 6378137.0).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// All tiles intersecting a geographic bounding box, for every zoom in range.
///
/// Boxes crossing the antimeridian (west > east) are split in two. The box is
/// clamped to the mercator extent first. The result is sorted by (z, x, y)
/// and contains no duplicates.
pub fn tiles_in_bbox(bbox: &BoundingBox, zooms: ZoomRange) -> Vec<TileCoord> {
    let boxes = if bbox.crosses_antimeridian() {
        vec![
            BoundingBox::new(-180.0, bbox.min_y, bbox.max_x, bbox.max_y),
            BoundingBox::new(bbox.min_x, bbox.min_y, 180.0, bbox.max_y),
        ]
    } else {
        vec![*bbox]
    };

    let mut tiles = Vec::new();
    for b in boxes {
        let b = b.clamp_to_mercator();
        if b.min_x > b.max_x || b.min_y > b.max_y {
            continue;
        }
        for z in zooms.levels() {
            let ul = latlon_to_tile(b.max_y, b.min_x, z);
            let lr = latlon_to_tile(b.min_y + LL_EPSILON, b.max_x - LL_EPSILON, z);
            for x in ul.x..=lr.x {
                for y in ul.y..=lr.y {
                    tiles.push(TileCoord { z, x, y });
                }
            }
        }
    }

    tiles.sort_unstable();
    tiles.dedup();
    tiles
}
