//! Common types and utilities shared across the raster tiling crates.

pub mod bbox;
pub mod layout;
pub mod tile;

pub use bbox::{BboxParseError, BoundingBox, MERCATOR_MAX_LAT};
pub use layout::{FrameFileName, FrameNumbering, DEFAULT_FRAME_WIDTH, TILE_EXTENSION};
pub use tile::{
    latlon_to_tile, lonlat_to_mercator, mercator_to_lonlat, tile_bounds, tile_mercator_bounds,
    tiles_in_bbox, TileCoord, ZoomRange, ZoomRangeError, MAX_ZOOM, MERCATOR_EXTENT,
};
