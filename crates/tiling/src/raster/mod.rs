//! Raster sources: labeled arrays and GeoTIFF decoding.

pub mod array;
pub mod geotiff;

pub use array::{Crs, GeoTransform, RasterArray, TimeAxis};
pub use geotiff::{decode_geotiff, read_geotiff};
