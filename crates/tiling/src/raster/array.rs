//! Labeled in-memory raster arrays.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tile_common::{mercator_to_lonlat, BoundingBox, MERCATOR_MAX_LAT};

use crate::error::{Result, TilingError};

/// Coordinate reference system of a raster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crs {
    /// EPSG:4326, degrees.
    Geographic,
    /// EPSG:3857, meters.
    WebMercator,
}

impl Crs {
    pub fn epsg(&self) -> u16 {
        match self {
            Crs::Geographic => 4326,
            Crs::WebMercator => 3857,
        }
    }

    pub fn from_epsg(code: u16) -> Option<Self> {
        match code {
            4326 => Some(Crs::Geographic),
            3857 => Some(Crs::WebMercator),
            _ => None,
        }
    }
}

/// North-up affine transform: upper-left corner plus pixel size.
///
/// Rows go south, so world y decreases with row index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Fractional (col, row) of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (self.origin_y - y) / self.pixel_height,
        )
    }

    /// World coordinate of a pixel centre.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }
}

/// Named temporal axis with one label per timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub name: String,
    pub labels: Vec<NaiveDateTime>,
}

impl TimeAxis {
    pub fn new(name: impl Into<String>, labels: Vec<NaiveDateTime>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Raster values shaped `(time, band, row, col)` on a north-up grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterArray {
    times: usize,
    bands: usize,
    rows: usize,
    cols: usize,
    data: Vec<f32>,
    pub transform: GeoTransform,
    pub crs: Crs,
    pub nodata: Option<f32>,
    time: Option<TimeAxis>,
}

impl RasterArray {
    /// Build an array, checking that `data` matches the shape.
    pub fn new(
        shape: (usize, usize, usize, usize),
        data: Vec<f32>,
        transform: GeoTransform,
        crs: Crs,
    ) -> Result<Self> {
        let (times, bands, rows, cols) = shape;
        if times == 0 || bands == 0 || rows == 0 || cols == 0 {
            return Err(TilingError::invalid_raster(format!(
                "array shape {:?} has an empty dimension",
                shape
            )));
        }
        let expected = times * bands * rows * cols;
        if data.len() != expected {
            return Err(TilingError::invalid_raster(format!(
                "array shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        if !(transform.pixel_width > 0.0 && transform.pixel_height > 0.0) {
            return Err(TilingError::invalid_raster(
                "pixel size must be positive for a north-up grid",
            ));
        }
        Ok(Self {
            times,
            bands,
            rows,
            cols,
            data,
            transform,
            crs,
            nodata: None,
            time: None,
        })
    }

    pub fn with_nodata(mut self, nodata: Option<f32>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Attach a temporal axis. Its label count must equal the time length.
    pub fn with_time_axis(mut self, axis: TimeAxis) -> Result<Self> {
        if axis.len() != self.times {
            return Err(TilingError::invalid_raster(format!(
                "time axis '{}' has {} labels for {} timesteps",
                axis.name,
                axis.len(),
                self.times
            )));
        }
        self.time = Some(axis);
        Ok(self)
    }

    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.times, self.bands, self.rows, self.cols)
    }

    pub fn time_len(&self) -> usize {
        self.times
    }

    pub fn band_count(&self) -> usize {
        self.bands
    }

    pub fn width(&self) -> usize {
        self.cols
    }

    pub fn height(&self) -> usize {
        self.rows
    }

    pub fn time_axis(&self) -> Option<&TimeAxis> {
        self.time.as_ref()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn plane_len(&self) -> usize {
        self.rows * self.cols
    }

    fn offset(&self, time: usize, band: usize) -> usize {
        (time * self.bands + band) * self.plane_len()
    }

    /// Row-major values of one band at one timestep.
    pub fn plane(&self, time: usize, band: usize) -> &[f32] {
        let start = self.offset(time, band);
        &self.data[start..start + self.plane_len()]
    }

    pub fn value(&self, time: usize, band: usize, row: usize, col: usize) -> f32 {
        self.data[self.offset(time, band) + row * self.cols + col]
    }

    /// Finite and not equal to the nodata value.
    pub fn is_valid(&self, value: f32) -> bool {
        value.is_finite() && self.nodata.map_or(true, |nd| value != nd)
    }

    /// Single-timestep slice without a temporal axis.
    pub fn isel_time(&self, index: usize) -> Result<RasterArray> {
        if index >= self.times {
            return Err(TilingError::invalid_raster(format!(
                "timestep {} out of range for {} timesteps",
                index, self.times
            )));
        }
        let start = self.offset(index, 0);
        let len = self.bands * self.plane_len();
        Ok(RasterArray {
            times: 1,
            bands: self.bands,
            rows: self.rows,
            cols: self.cols,
            data: self.data[start..start + len].to_vec(),
            transform: self.transform,
            crs: self.crs,
            nodata: self.nodata,
            time: None,
        })
    }

    /// Rebuild with new timesteps, keeping grid and band layout.
    pub(crate) fn with_timesteps(&self, data: Vec<f32>, axis: Option<TimeAxis>) -> Result<RasterArray> {
        let plane = self.bands * self.plane_len();
        let times = data.len() / plane.max(1);
        let array = RasterArray::new(
            (times, self.bands, self.rows, self.cols),
            data,
            self.transform,
            self.crs,
        )?
        .with_nodata(self.nodata);
        match axis {
            Some(axis) => array.with_time_axis(axis),
            None => Ok(array),
        }
    }

    /// Extent in the array's own coordinates.
    pub fn native_bounds(&self) -> BoundingBox {
        let t = &self.transform;
        BoundingBox::new(
            t.origin_x,
            t.origin_y - self.rows as f64 * t.pixel_height,
            t.origin_x + self.cols as f64 * t.pixel_width,
            t.origin_y,
        )
    }

    /// Geographic extent, clamped to the mercator latitude limit.
    pub fn bounds(&self) -> BoundingBox {
        let native = self.native_bounds();
        let b = match self.crs {
            Crs::Geographic => native,
            Crs::WebMercator => {
                let (min_x, min_y) = mercator_to_lonlat(native.min_x, native.min_y);
                let (max_x, max_y) = mercator_to_lonlat(native.max_x, native.max_y);
                BoundingBox::new(min_x, min_y, max_x, max_y)
            }
        };
        BoundingBox::new(
            b.min_x.max(-180.0),
            b.min_y.max(-MERCATOR_MAX_LAT),
            b.max_x.min(180.0),
            b.max_y.min(MERCATOR_MAX_LAT),
        )
    }
}
