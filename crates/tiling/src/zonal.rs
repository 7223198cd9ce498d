//! Per-zone time series of raster means.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TilingError};
use crate::raster::RasterArray;

/// A zone outline in the array's own coordinates.
///
/// Every ring takes part in an even-odd test, so inner rings cut holes.
#[derive(Debug, Clone, PartialEq)]
pub struct ZonePolygon {
    pub zone: u32,
    pub rings: Vec<Vec<(f64, f64)>>,
}

impl ZonePolygon {
    pub fn new(zone: u32, exterior: Vec<(f64, f64)>) -> Self {
        Self {
            zone,
            rings: vec![exterior],
        }
    }

    pub fn with_hole(mut self, ring: Vec<(f64, f64)>) -> Self {
        self.rings.push(ring);
        self
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for ring in &self.rings {
            if ring.len() < 3 {
                continue;
            }
            let mut j = ring.len() - 1;
            for i in 0..ring.len() {
                let (xi, yi) = ring[i];
                let (xj, yj) = ring[j];
                if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                    inside = !inside;
                }
                j = i;
            }
        }
        inside
    }
}

/// Zone id per pixel, aligned with a raster grid. `None` is outside every zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneMask {
    rows: usize,
    cols: usize,
    zones: Vec<Option<u32>>,
}

impl ZoneMask {
    /// Wrap a row-major label grid.
    pub fn from_labels(rows: usize, cols: usize, zones: Vec<Option<u32>>) -> Result<Self> {
        if zones.len() != rows * cols {
            return Err(TilingError::invalid_raster(format!(
                "zone grid {}x{} needs {} labels, got {}",
                rows,
                cols,
                rows * cols,
                zones.len()
            )));
        }
        Ok(Self { rows, cols, zones })
    }

    /// Rasterize polygons onto the grid of `array`, testing pixel centres.
    /// Where polygons overlap, the later one wins.
    pub fn from_polygons(array: &RasterArray, polygons: &[ZonePolygon]) -> Self {
        let (rows, cols) = (array.height(), array.width());
        let mut zones = vec![None; rows * cols];
        for polygon in polygons {
            for row in 0..rows {
                for col in 0..cols {
                    let (x, y) = array.transform.pixel_center(col, row);
                    if polygon.contains(x, y) {
                        zones[row * cols + col] = Some(polygon.zone);
                    }
                }
            }
        }
        Self { rows, cols, zones }
    }

    pub fn zone_at(&self, row: usize, col: usize) -> Option<u32> {
        self.zones.get(row * self.cols + col).copied().flatten()
    }

    /// Distinct zone ids, ascending.
    pub fn zone_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.zones.iter().flatten().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Mean value of one zone at every timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSeries {
    pub zone: u32,
    /// `None` where the zone has no valid pixel.
    pub values: Vec<Option<f64>>,
    pub time_labels: Vec<NaiveDateTime>,
    pub x_axis_unit: String,
    pub y_axis_unit: String,
}

/// Per-zone means of `band` over every timestep of `array`.
///
/// Arrays without a temporal axis yield one value per zone and no labels.
pub fn zonal_means(
    array: &RasterArray,
    mask: &ZoneMask,
    band: usize,
    unit: &str,
) -> Result<Vec<ZoneSeries>> {
    if mask.rows != array.height() || mask.cols != array.width() {
        return Err(TilingError::invalid_raster(format!(
            "zone mask {}x{} does not match raster {}x{}",
            mask.rows,
            mask.cols,
            array.height(),
            array.width()
        )));
    }
    if band >= array.band_count() {
        return Err(TilingError::invalid_raster(format!(
            "band {} out of range for {} bands",
            band,
            array.band_count()
        )));
    }

    let (time_labels, x_axis_unit) = match array.time_axis() {
        Some(axis) => (axis.labels.clone(), axis.name.clone()),
        None => (Vec::new(), "time".to_string()),
    };

    let mut series: BTreeMap<u32, Vec<Option<f64>>> = mask
        .zone_ids()
        .into_iter()
        .map(|zone| (zone, Vec::with_capacity(array.time_len())))
        .collect();

    for t in 0..array.time_len() {
        let plane = array.plane(t, band);
        let mut totals: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for (cell, zone) in mask.zones.iter().enumerate() {
            let Some(zone) = zone else {
                continue;
            };
            let value = plane[cell];
            if array.is_valid(value) {
                let entry = totals.entry(*zone).or_insert((0.0, 0));
                entry.0 += value as f64;
                entry.1 += 1;
            }
        }
        for (zone, values) in series.iter_mut() {
            values.push(
                totals
                    .get(zone)
                    .map(|(sum, count)| sum / *count as f64),
            );
        }
    }

    debug!(zones = series.len(), timesteps = array.time_len(), "Computed zonal means");
    Ok(series
        .into_iter()
        .map(|(zone, values)| ZoneSeries {
            zone,
            values,
            time_labels: time_labels.clone(),
            x_axis_unit: x_axis_unit.clone(),
            y_axis_unit: unit.to_string(),
        })
        .collect())
}
