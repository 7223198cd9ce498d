//! Error types for tile pyramid generation.
//!
//! Errors come in three layers:
//! - [`ReadError`]: what the reader capability returns for one tile.
//! - [`TileError`]: why one tile failed. Carried in a per-tile outcome and
//!   never propagated past the tile task.
//! - [`TilingError`]: fatal for a pipeline stage of one dataset.

use std::path::PathBuf;

use renderer::RenderError;
use thiserror::Error;
use tile_common::TileCoord;

/// Result of a tile read that did not produce a block.
#[derive(Error, Debug)]
pub enum ReadError {
    /// The tile footprint has no data in the source. Expected, not a failure.
    #[error("tile {0} is outside the source bounds")]
    OutOfBounds(TileCoord),

    #[error("I/O error reading raster: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid raster: {0}")]
    InvalidRaster(String),
}

/// Failure of one tile task.
#[derive(Error, Debug)]
pub enum TileError {
    #[error("read failed: {0}")]
    Read(#[source] ReadError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tile task panicked: {0}")]
    Panicked(String),
}

/// Errors that abort a pipeline stage.
#[derive(Error, Debug)]
pub enum TilingError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unsupported engine '{0}' (expected one of: file, rasterio, array, xarray)")]
    UnsupportedEngine(String),

    #[error("assembly inconsistency in {path}: {reason}")]
    AssemblyInconsistency { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    #[error("tiling cancelled")]
    Cancelled,

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("style error: {0}")]
    Style(#[from] RenderError),
}

impl TilingError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an InvalidRaster error.
    pub fn invalid_raster(msg: impl Into<String>) -> Self {
        Self::InvalidRaster(msg.into())
    }

    /// Create an AssemblyInconsistency error.
    pub fn assembly(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::AssemblyInconsistency {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<ReadError> for TilingError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Io(e) => TilingError::Io(e),
            other => TilingError::InvalidRaster(other.to_string()),
        }
    }
}

/// Result type for stage-level operations.
pub type Result<T> = std::result::Result<T, TilingError>;
