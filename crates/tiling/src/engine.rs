//! Per-tile PNG production.

use std::fs;
use std::path::{Path, PathBuf};

use renderer::{png, PixelRenderer, StyleDescriptor};
use tile_common::{tiles_in_bbox, FrameNumbering, TileCoord, ZoomRange};
use tracing::{debug, warn};

use crate::error::{ReadError, Result, TileError, TilingError};
use crate::source::{EngineKind, RasterSource, TileSource};

/// Frame slot for sequence mode: which frame, and how to number it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    pub numbering: FrameNumbering,
    pub index: usize,
}

impl FrameSlot {
    pub fn new(numbering: FrameNumbering, index: usize) -> Self {
        Self { numbering, index }
    }
}

/// What happened to one tile.
#[derive(Debug)]
pub enum TileOutcome {
    /// PNG written at `path`.
    Written { coord: TileCoord, path: PathBuf },
    /// No data under this tile; nothing written.
    OutOfBounds(TileCoord),
    /// Skipped because the run was cancelled.
    Cancelled(TileCoord),
    Failed { coord: TileCoord, error: TileError },
}

/// Produces one PNG per tile coordinate for one source and style.
pub struct TileEngine {
    source: Box<dyn TileSource>,
    renderer: PixelRenderer,
    output_root: PathBuf,
    tile_size: usize,
}

impl TileEngine {
    /// Open `source` with the given engine variant.
    ///
    /// Fails with a configuration error when the source kind does not match
    /// the variant, before any tile is produced.
    pub fn new(
        kind: EngineKind,
        source: RasterSource,
        style: StyleDescriptor,
        output_root: impl Into<PathBuf>,
        tile_size: usize,
    ) -> Result<Self> {
        let source = kind.open(source)?;
        Self::with_source(source, style, output_root, tile_size)
    }

    /// Build around an already opened reader.
    pub fn with_source(
        source: Box<dyn TileSource>,
        style: StyleDescriptor,
        output_root: impl Into<PathBuf>,
        tile_size: usize,
    ) -> Result<Self> {
        if tile_size == 0 {
            return Err(TilingError::configuration("tile size must be > 0"));
        }
        Ok(Self {
            source,
            renderer: PixelRenderer::new(style),
            output_root: output_root.into(),
            tile_size,
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.source.kind()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Tiles covering the source extent over a zoom range.
    pub fn tiles(&self, zooms: ZoomRange) -> Vec<TileCoord> {
        tiles_in_bbox(&self.source.bounds(), zooms)
    }

    /// Output path for a tile, with a frame suffix in sequence mode.
    pub fn output_path(&self, coord: &TileCoord, frame: Option<FrameSlot>) -> PathBuf {
        match frame {
            Some(slot) => coord.frame_path(&self.output_root, &slot.numbering, slot.index),
            None => coord.tile_path(&self.output_root),
        }
    }

    /// Read, render and write one tile.
    ///
    /// Never returns an error: out-of-bounds tiles are skipped silently and
    /// every other failure is logged and returned as [`TileOutcome::Failed`].
    pub fn render_tile(&self, coord: TileCoord, frame: Option<FrameSlot>) -> TileOutcome {
        match self.try_render_tile(coord, frame) {
            Ok(Some(path)) => TileOutcome::Written { coord, path },
            Ok(None) => TileOutcome::OutOfBounds(coord),
            Err(error) => {
                warn!(
                    tile = %coord,
                    frame = frame.map(|f| f.index),
                    error = %error,
                    "Tile generation failed"
                );
                TileOutcome::Failed { coord, error }
            }
        }
    }

    fn try_render_tile(
        &self,
        coord: TileCoord,
        frame: Option<FrameSlot>,
    ) -> std::result::Result<Option<PathBuf>, TileError> {
        let block = match self.source.read_tile(coord, self.tile_size) {
            Ok(block) => block,
            Err(ReadError::OutOfBounds(_)) => {
                debug!(tile = %coord, "Tile outside source bounds, skipping");
                return Ok(None);
            }
            Err(e) => return Err(TileError::Read(e)),
        };

        let image = self.renderer.render(&block)?;
        let bytes = png::encode_tile(&image)?;

        let path = self.output_path(&coord, frame);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TileError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, &bytes).map_err(|source| TileError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(Some(path))
    }
}

impl std::fmt::Debug for TileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileEngine")
            .field("kind", &self.source.kind())
            .field("output_root", &self.output_root)
            .field("tile_size", &self.tile_size)
            .finish()
    }
}
