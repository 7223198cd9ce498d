//! Raster sources and the engine variants that read them.
//!
//! A [`TileSource`] is the reader capability a tile engine uses. Two
//! variants exist, picked by [`EngineKind`]:
//! - file-backed: a single GeoTIFF path, decoded once when opened
//! - array-backed: an in-memory array already reduced to one timestep

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use renderer::TileBlock;
use serde::{Deserialize, Serialize};
use tile_common::{BoundingBox, TileCoord};
use tracing::debug;

use crate::error::{ReadError, Result, TilingError};
use crate::raster::{read_geotiff, RasterArray};
use crate::sample::read_mercator_tile;

/// Reader capability: a pixel block for a tile, or `OutOfBounds`.
pub trait TileSource: Send + Sync {
    /// Engine variant this source belongs to.
    fn kind(&self) -> EngineKind;

    /// Geographic extent of the data.
    fn bounds(&self) -> BoundingBox;

    fn band_count(&self) -> usize;

    /// Read one tile at `tile_size` x `tile_size` pixels.
    fn read_tile(&self, coord: TileCoord, tile_size: usize) -> std::result::Result<TileBlock, ReadError>;
}

/// Data handed to an engine: a file path or a materialized array.
#[derive(Debug, Clone)]
pub enum RasterSource {
    File(PathBuf),
    Array(Arc<RasterArray>),
}

impl RasterSource {
    pub fn describe(&self) -> String {
        match self {
            RasterSource::File(path) => format!("file {}", path.display()),
            RasterSource::Array(array) => {
                let (t, b, r, c) = array.shape();
                format!("array {}x{}x{}x{}", t, b, r, c)
            }
        }
    }
}

impl From<RasterArray> for RasterSource {
    fn from(array: RasterArray) -> Self {
        RasterSource::Array(Arc::new(array))
    }
}

impl From<PathBuf> for RasterSource {
    fn from(path: PathBuf) -> Self {
        RasterSource::File(path)
    }
}

/// Engine variant, selected by name in layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EngineKind {
    /// Reads a single raster file.
    FileBacked,
    /// Reads a single-timestep in-memory array.
    ArrayBacked,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::FileBacked => "file",
            EngineKind::ArrayBacked => "array",
        }
    }

    /// Validate that `source` matches this variant and open it.
    pub fn open(&self, source: RasterSource) -> Result<Box<dyn TileSource>> {
        match self {
            EngineKind::FileBacked => Ok(Box::new(FileTileSource::open(source)?)),
            EngineKind::ArrayBacked => Ok(Box::new(ArrayTileSource::open(source)?)),
        }
    }
}

impl FromStr for EngineKind {
    type Err = TilingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" | "rasterio" => Ok(EngineKind::FileBacked),
            "array" | "xarray" => Ok(EngineKind::ArrayBacked),
            _ => Err(TilingError::UnsupportedEngine(s.to_string())),
        }
    }
}

impl TryFrom<String> for EngineKind {
    type Error = TilingError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<EngineKind> for String {
    fn from(kind: EngineKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File-backed source: one GeoTIFF decoded for the source's lifetime.
#[derive(Debug)]
pub struct FileTileSource {
    path: PathBuf,
    array: RasterArray,
}

impl FileTileSource {
    pub fn open(source: RasterSource) -> Result<Self> {
        let path = match source {
            RasterSource::File(path) => path,
            other => {
                return Err(TilingError::configuration(format!(
                    "file-backed engine needs a file path, got {}",
                    other.describe()
                )))
            }
        };
        if !path.is_file() {
            return Err(TilingError::configuration(format!(
                "raster file {} does not exist or is not a file",
                path.display()
            )));
        }

        let array = read_geotiff(&path)?;
        debug!(path = %path.display(), "Opened file-backed source");
        Ok(Self { path, array })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TileSource for FileTileSource {
    fn kind(&self) -> EngineKind {
        EngineKind::FileBacked
    }

    fn bounds(&self) -> BoundingBox {
        self.array.bounds()
    }

    fn band_count(&self) -> usize {
        self.array.band_count()
    }

    fn read_tile(&self, coord: TileCoord, tile_size: usize) -> std::result::Result<TileBlock, ReadError> {
        read_mercator_tile(&self.array, 0, coord, tile_size)
    }
}

/// Array-backed source: one timestep of a labeled array.
#[derive(Debug, Clone)]
pub struct ArrayTileSource {
    array: Arc<RasterArray>,
}

impl ArrayTileSource {
    pub fn open(source: RasterSource) -> Result<Self> {
        let array = match source {
            RasterSource::Array(array) => array,
            other => {
                return Err(TilingError::configuration(format!(
                    "array-backed engine needs an in-memory array, got {}",
                    other.describe()
                )))
            }
        };
        if array.time_len() != 1 {
            return Err(TilingError::configuration(format!(
                "array-backed engine needs a single timestep, got {}; select one timestep first",
                array.time_len()
            )));
        }
        Ok(Self { array })
    }
}

impl TileSource for ArrayTileSource {
    fn kind(&self) -> EngineKind {
        EngineKind::ArrayBacked
    }

    fn bounds(&self) -> BoundingBox {
        self.array.bounds()
    }

    fn band_count(&self) -> usize {
        self.array.band_count()
    }

    fn read_tile(&self, coord: TileCoord, tile_size: usize) -> std::result::Result<TileBlock, ReadError> {
        read_mercator_tile(&self.array, 0, coord, tile_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Crs, GeoTransform};

    fn array(times: usize) -> RasterArray {
        RasterArray::new(
            (times, 1, 2, 2),
            vec![1.0; times * 4],
            GeoTransform::new(0.0, 2.0, 1.0, 1.0),
            Crs::Geographic,
        )
        .unwrap()
    }

    #[test]
    fn test_engine_names() {
        assert_eq!("rasterio".parse::<EngineKind>().unwrap(), EngineKind::FileBacked);
        assert_eq!("File".parse::<EngineKind>().unwrap(), EngineKind::FileBacked);
        assert_eq!("xarray".parse::<EngineKind>().unwrap(), EngineKind::ArrayBacked);
        assert!(matches!(
            "gdal".parse::<EngineKind>(),
            Err(TilingError::UnsupportedEngine(name)) if name == "gdal"
        ));
        assert_eq!(EngineKind::ArrayBacked.to_string(), "array");
    }

    #[test]
    fn test_array_engine_rejects_file_path() {
        let err = EngineKind::ArrayBacked
            .open(RasterSource::File(PathBuf::from("/tmp/layer.tif")))
            .err()
            .unwrap();
        assert!(matches!(err, TilingError::Configuration(_)));
    }

    #[test]
    fn test_array_engine_rejects_multiple_timesteps() {
        let err = EngineKind::ArrayBacked.open(array(3).into()).err().unwrap();
        assert!(matches!(err, TilingError::Configuration(_)));
        assert!(EngineKind::ArrayBacked.open(array(1).into()).is_ok());
    }

    #[test]
    fn test_file_engine_rejects_array_and_missing_file() {
        let err = EngineKind::FileBacked.open(array(1).into()).err().unwrap();
        assert!(matches!(err, TilingError::Configuration(_)));

        let err = EngineKind::FileBacked
            .open(RasterSource::File(PathBuf::from("/definitely/not/here.tif")))
            .err()
            .unwrap();
        assert!(matches!(err, TilingError::Configuration(_)));
    }
}
