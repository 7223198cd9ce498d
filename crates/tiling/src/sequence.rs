//! Per-timestep tiling of temporal sources.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use renderer::StyleDescriptor;
use tile_common::{BoundingBox, FrameNumbering, TileCoord};
use tracing::info;

use crate::cancel::CancellationToken;
use crate::dispatch::{DispatchSummary, TileDispatcher};
use crate::engine::{FrameSlot, TileEngine};
use crate::error::{Result, TilingError};
use crate::raster::{read_geotiff, RasterArray, TimeAxis};
use crate::source::{EngineKind, RasterSource};

/// A GeoTIFF whose file name ends in a four-digit year.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearlyFile {
    pub year: u32,
    pub path: PathBuf,
}

/// Year embedded as the last four characters before `.tif`.
fn year_from_file_name(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(".tif")?;
    let digits = stem.get(stem.len().checked_sub(4)?..)?;
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// Collect `*YYYY.tif` files in `dir`, sorted by year.
///
/// Other files are ignored. A directory without any such file is a
/// configuration error.
pub fn files_with_years(dir: impl AsRef<Path>) -> Result<Vec<YearlyFile>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(TilingError::configuration(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if let Some(year) = name.to_str().and_then(year_from_file_name) {
            files.push(YearlyFile {
                year,
                path: entry.path(),
            });
        }
    }

    if files.is_empty() {
        return Err(TilingError::configuration(format!(
            "no files named like *YYYY.tif in {}",
            dir.display()
        )));
    }
    files.sort();
    Ok(files)
}

/// Ordered frames of an animated source.
#[derive(Debug, Clone)]
pub enum FrameSource {
    /// Array with a temporal axis; frame `n` is timestep `n`.
    Array(Arc<RasterArray>),
    /// One file per year, in year order.
    YearlyFiles(Vec<YearlyFile>),
}

impl FrameSource {
    /// Scan a directory for yearly GeoTIFFs.
    pub fn yearly_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(FrameSource::YearlyFiles(files_with_years(dir)?))
    }

    pub fn len(&self) -> usize {
        match self {
            FrameSource::Array(array) => array.time_len(),
            FrameSource::YearlyFiles(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Engine variant used for each frame.
    pub fn engine_kind(&self) -> EngineKind {
        match self {
            FrameSource::Array(_) => EngineKind::ArrayBacked,
            FrameSource::YearlyFiles(_) => EngineKind::FileBacked,
        }
    }

    /// Source for frame `n`.
    pub fn frame(&self, n: usize) -> Result<RasterSource> {
        match self {
            FrameSource::Array(array) => Ok(RasterSource::from(array.isel_time(n)?)),
            FrameSource::YearlyFiles(files) => files
                .get(n)
                .map(|f| RasterSource::File(f.path.clone()))
                .ok_or_else(|| TilingError::configuration(format!("no frame {}", n))),
        }
    }

    /// Human-readable label of frame `n` for progress logs.
    pub fn label(&self, n: usize) -> String {
        match self {
            FrameSource::Array(array) => array
                .time_axis()
                .and_then(|axis| axis.labels.get(n))
                .map(|t| t.to_string())
                .unwrap_or_else(|| n.to_string()),
            FrameSource::YearlyFiles(files) => files
                .get(n)
                .map(|f| f.year.to_string())
                .unwrap_or_else(|| n.to_string()),
        }
    }

    /// Materialize every frame into one array with a temporal axis named
    /// `dimension`. Yearly files are labelled with January 1st of their year
    /// and must share grid, bands and CRS.
    pub fn load_array(&self, dimension: &str) -> Result<RasterArray> {
        let files = match self {
            FrameSource::Array(array) => return Ok(array.as_ref().clone()),
            FrameSource::YearlyFiles(files) => files,
        };

        let mut first: Option<RasterArray> = None;
        let mut data = Vec::new();
        let mut labels = Vec::with_capacity(files.len());
        for file in files {
            let array = read_geotiff(&file.path)?;
            if let Some(reference) = &first {
                if array.shape() != reference.shape()
                    || array.transform != reference.transform
                    || array.crs != reference.crs
                {
                    return Err(TilingError::invalid_raster(format!(
                        "{} does not share the grid of {}",
                        file.path.display(),
                        files[0].path.display()
                    )));
                }
            }
            let label = chrono::NaiveDate::from_ymd_opt(file.year as i32, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(|| TilingError::invalid_raster(format!("invalid year {}", file.year)))?;
            labels.push(label);
            data.extend_from_slice(array.data());
            if first.is_none() {
                first = Some(array);
            }
        }

        let first = first.ok_or_else(|| TilingError::configuration("yearly file series is empty"))?;
        let (_, bands, rows, cols) = first.shape();
        RasterArray::new((files.len(), bands, rows, cols), data, first.transform, first.crs)?
            .with_nodata(first.nodata)
            .with_time_axis(TimeAxis::new(dimension, labels))
    }

    /// Extent used to index tiles: the array extent, or the first file's.
    pub fn bounds(&self) -> Result<BoundingBox> {
        match self {
            FrameSource::Array(array) => Ok(array.bounds()),
            FrameSource::YearlyFiles(files) => {
                let first = files
                    .first()
                    .ok_or_else(|| TilingError::configuration("yearly file series is empty"))?;
                Ok(read_geotiff(&first.path)?.bounds())
            }
        }
    }
}

/// Drives one tile engine per timestep, in index order.
///
/// All tiles of timestep `n` are written before timestep `n + 1` starts.
pub struct TimeSeriesSequencer<'a> {
    dispatcher: &'a TileDispatcher,
    style: StyleDescriptor,
    output_root: PathBuf,
    tile_size: usize,
    min_frame_width: usize,
    cancel: CancellationToken,
}

impl<'a> TimeSeriesSequencer<'a> {
    pub fn new(
        dispatcher: &'a TileDispatcher,
        style: StyleDescriptor,
        output_root: impl Into<PathBuf>,
        tile_size: usize,
    ) -> Self {
        Self {
            dispatcher,
            style,
            output_root: output_root.into(),
            tile_size,
            min_frame_width: tile_common::DEFAULT_FRAME_WIDTH,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_min_frame_width(mut self, width: usize) -> Self {
        self.min_frame_width = width;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Numbering shared by every frame of `source`.
    pub fn numbering(&self, source: &FrameSource) -> FrameNumbering {
        FrameNumbering::for_count(source.len(), self.min_frame_width)
    }

    /// Tile every frame of `source` over `tiles`.
    ///
    /// Returns one summary per frame. Cancellation is checked before each
    /// timestep and, inside the dispatcher, before each tile.
    pub fn run(&self, source: &FrameSource, tiles: &[TileCoord]) -> Result<Vec<DispatchSummary>> {
        let numbering = self.numbering(source);
        let kind = source.engine_kind();
        let mut summaries = Vec::with_capacity(source.len());

        for n in 0..source.len() {
            if self.cancel.is_cancelled() {
                info!(frame = n, "Cancelled before timestep");
                return Err(TilingError::Cancelled);
            }

            let engine = TileEngine::new(
                kind,
                source.frame(n)?,
                self.style.clone(),
                &self.output_root,
                self.tile_size,
            )?;
            let summary = self.dispatcher.dispatch(
                &engine,
                tiles,
                Some(FrameSlot::new(numbering, n)),
                &self.cancel,
            );

            info!(
                frame = %numbering.label(n),
                timestep = %source.label(n),
                written = summary.written.len(),
                out_of_bounds = summary.out_of_bounds,
                failed = summary.failures.len(),
                "Timestep tiled"
            );

            if summary.cancelled > 0 {
                return Err(TilingError::Cancelled);
            }
            summaries.push(summary);
        }

        Ok(summaries)
    }
}
