//! Temporal preprocessing applied before tiling.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TilingError};
use crate::raster::{RasterArray, TimeAxis};

/// How timesteps falling in the same month are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalAggregation {
    #[default]
    Mean,
    Sum,
}

impl RasterArray {
    fn require_time_axis(&self) -> Result<&TimeAxis> {
        self.time_axis()
            .ok_or_else(|| TilingError::invalid_raster("array has no temporal axis"))
    }

    /// Timesteps labelled within `[start, end]`, inclusive on both ends.
    pub fn select_time(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<RasterArray> {
        let axis = self.require_time_axis()?;
        if start > end {
            return Err(TilingError::configuration(format!(
                "time range start {} is after end {}",
                start, end
            )));
        }

        let keep: Vec<usize> = axis
            .labels
            .iter()
            .enumerate()
            .filter(|(_, t)| **t >= start && **t <= end)
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(TilingError::invalid_raster(format!(
                "no timesteps between {} and {}",
                start, end
            )));
        }

        let mut data = Vec::with_capacity(keep.len() * self.band_count() * self.width() * self.height());
        for &t in &keep {
            for band in 0..self.band_count() {
                data.extend_from_slice(self.plane(t, band));
            }
        }
        let labels = keep.iter().map(|&t| axis.labels[t]).collect();

        debug!(selected = keep.len(), of = axis.len(), "Selected time range");
        self.with_timesteps(data, Some(TimeAxis::new(axis.name.clone(), labels)))
    }

    /// Collapse timesteps sharing a calendar month into one.
    ///
    /// Months appear in the order they are first seen and are labelled with
    /// their first day at midnight. Invalid cells are left out of the
    /// aggregate; a cell with no valid value in a month becomes NaN.
    pub fn group_by_month(&self, aggregation: TemporalAggregation) -> Result<RasterArray> {
        let axis = self.require_time_axis()?;

        let mut months: Vec<(NaiveDateTime, Vec<usize>)> = Vec::new();
        for (t, label) in axis.labels.iter().enumerate() {
            let first_day = month_start(label)?;
            match months.iter_mut().find(|(m, _)| *m == first_day) {
                Some((_, members)) => members.push(t),
                None => months.push((first_day, vec![t])),
            }
        }

        let plane_len = self.width() * self.height();
        let mut data = Vec::with_capacity(months.len() * self.band_count() * plane_len);
        for (_, members) in &months {
            for band in 0..self.band_count() {
                for cell in 0..plane_len {
                    let mut sum = 0.0f64;
                    let mut count = 0usize;
                    for &t in members {
                        let v = self.plane(t, band)[cell];
                        if self.is_valid(v) {
                            sum += v as f64;
                            count += 1;
                        }
                    }
                    let value = match (count, aggregation) {
                        (0, _) => f32::NAN,
                        (_, TemporalAggregation::Sum) => sum as f32,
                        (n, TemporalAggregation::Mean) => (sum / n as f64) as f32,
                    };
                    data.push(value);
                }
            }
        }

        debug!(
            timesteps = axis.len(),
            months = months.len(),
            aggregation = ?aggregation,
            "Grouped by month"
        );
        let labels = months.into_iter().map(|(m, _)| m).collect();
        self.with_timesteps(data, Some(TimeAxis::new(axis.name.clone(), labels)))
    }
}

fn month_start(t: &NaiveDateTime) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(t.year(), t.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TilingError::invalid_raster(format!("cannot derive month of {}", t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Crs, GeoTransform};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// Four 1x2 timesteps: two in January, one in February, one in January again.
    fn series() -> RasterArray {
        let data = vec![
            1.0, -9999.0, // 2020-01-05
            3.0, -9999.0, // 2020-01-20
            10.0, 20.0, // 2020-02-01
            5.0, -9999.0, // 2020-01-31
        ];
        RasterArray::new((4, 1, 1, 2), data, GeoTransform::new(0.0, 1.0, 1.0, 1.0), Crs::Geographic)
            .unwrap()
            .with_nodata(Some(-9999.0))
            .with_time_axis(TimeAxis::new(
                "time",
                vec![at(2020, 1, 5), at(2020, 1, 20), at(2020, 2, 1), at(2020, 1, 31)],
            ))
            .unwrap()
    }

    #[test]
    fn test_select_time_inclusive() {
        let array = series();
        let sel = array.select_time(at(2020, 1, 20), at(2020, 2, 1)).unwrap();
        // Unsorted labels: 01-31 falls inside the window after 02-01
        assert_eq!(sel.time_len(), 3);
        assert_eq!(sel.value(0, 0, 0, 0), 3.0);
        assert_eq!(sel.value(1, 0, 0, 1), 20.0);
        assert_eq!(sel.value(2, 0, 0, 0), 5.0);
        assert_eq!(
            sel.time_axis().unwrap().labels,
            vec![at(2020, 1, 20), at(2020, 2, 1), at(2020, 1, 31)]
        );
    }

    #[test]
    fn test_select_time_errors() {
        let array = series();
        assert!(array.select_time(at(2021, 1, 1), at(2021, 2, 1)).is_err());
        assert!(array.select_time(at(2020, 2, 1), at(2020, 1, 1)).is_err());

        let no_axis = array.isel_time(0).unwrap();
        assert!(no_axis.select_time(at(2020, 1, 1), at(2020, 12, 31)).is_err());
    }

    #[test]
    fn test_group_by_month_mean() {
        let monthly = series().group_by_month(TemporalAggregation::Mean).unwrap();
        assert_eq!(monthly.time_len(), 2);
        assert_eq!(
            monthly.time_axis().unwrap().labels,
            vec![at(2020, 1, 1), at(2020, 2, 1)]
        );
        assert_eq!(monthly.value(0, 0, 0, 0), 3.0);
        assert!(monthly.value(0, 0, 0, 1).is_nan());
        assert_eq!(monthly.value(1, 0, 0, 1), 20.0);
    }

    #[test]
    fn test_group_by_month_sum() {
        let monthly = series().group_by_month(TemporalAggregation::Sum).unwrap();
        assert_eq!(monthly.value(0, 0, 0, 0), 9.0);
        assert_eq!(monthly.value(1, 0, 0, 0), 10.0);
        assert!(!monthly.is_valid(monthly.value(0, 0, 0, 1)));
    }
}
