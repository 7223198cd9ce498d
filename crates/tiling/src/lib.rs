//! Mercator tile pyramids from rasters and raster time series.
//!
//! A run indexes the tiles covering a source, renders one PNG per tile on a
//! worker pool and, for temporal sources, writes one numbered frame per
//! timestep before merging each tile's frames into an animated PNG.
//!
//! ```text
//! <output_root>/<z>/<x>/<y>.png          static or assembled tile
//! <output_root>/<z>/<x>/<y>_<frame>.png  frame awaiting assembly
//! ```

pub mod assemble;
pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod raster;
pub mod sample;
pub mod sequence;
pub mod source;
pub mod zonal;

pub use assemble::{AnimationAssembler, AssembledTile};
pub use cancel::CancellationToken;
pub use config::{Catalog, DatasetConfig, LayerConfig, TilingConfig, DEFAULT_TILE_SIZE};
pub use dispatch::{DispatchSummary, TileDispatcher, TileFailure, WrittenTile};
pub use engine::{FrameSlot, TileEngine, TileOutcome};
pub use error::{ReadError, Result, TileError, TilingError};
pub use pipeline::{PipelineInput, PipelineReport, PipelineStage, TilingPipeline};
pub use preprocess::TemporalAggregation;
pub use raster::{decode_geotiff, read_geotiff, Crs, GeoTransform, RasterArray, TimeAxis};
pub use sample::read_mercator_tile;
pub use sequence::{files_with_years, FrameSource, TimeSeriesSequencer, YearlyFile};
pub use source::{ArrayTileSource, EngineKind, FileTileSource, RasterSource, TileSource};
pub use zonal::{zonal_means, ZoneMask, ZonePolygon, ZoneSeries};
