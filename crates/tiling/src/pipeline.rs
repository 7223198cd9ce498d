//! End-to-end tiling of one layer: index, tile, assemble.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use renderer::StyleDescriptor;
use tile_common::{tiles_in_bbox, BoundingBox, TileCoord, ZoomRange};
use tracing::{info, warn};

use crate::assemble::{AnimationAssembler, AssembledTile};
use crate::cancel::CancellationToken;
use crate::config::TilingConfig;
use crate::dispatch::{DispatchSummary, TileDispatcher};
use crate::engine::TileEngine;
use crate::error::{Result, TilingError};
use crate::sequence::{FrameSource, TimeSeriesSequencer};
use crate::source::{EngineKind, RasterSource};

/// Stages of a run. A run only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStage {
    Indexing,
    PerTimestepTiling,
    Assembling,
    Done,
}

impl PipelineStage {
    /// Whether `next` directly follows `self`. Static runs go straight
    /// from tiling to done.
    pub fn can_advance_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Indexing, PerTimestepTiling)
                | (PerTimestepTiling, Assembling)
                | (PerTimestepTiling, Done)
                | (Assembling, Done)
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Indexing => "indexing",
            PipelineStage::PerTimestepTiling => "per_timestep_tiling",
            PipelineStage::Assembling => "assembling",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What to tile.
#[derive(Debug, Clone)]
pub enum PipelineInput {
    /// One raster, one PNG per tile.
    Static { kind: EngineKind, source: RasterSource },
    /// One frame per timestep, assembled into animated tiles.
    Animated(FrameSource),
}

/// Result of a completed run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Tile set produced by indexing.
    pub tiles: Vec<TileCoord>,
    /// One summary per frame; a single entry for static runs.
    pub frames: Vec<DispatchSummary>,
    /// Animated tiles; empty for static runs.
    pub artifacts: Vec<AssembledTile>,
}

impl PipelineReport {
    pub fn failed_tiles(&self) -> usize {
        self.frames.iter().map(|f| f.failures.len()).sum()
    }
}

pub struct TilingPipeline {
    config: TilingConfig,
    style: StyleDescriptor,
    zooms: ZoomRange,
    output_root: PathBuf,
    dispatcher: TileDispatcher,
    cancel: CancellationToken,
    stage: PipelineStage,
}

impl TilingPipeline {
    pub fn new(
        config: TilingConfig,
        style: StyleDescriptor,
        zooms: ZoomRange,
        output_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        config.validate().map_err(TilingError::Configuration)?;
        zooms
            .validate()
            .map_err(|e| TilingError::configuration(e.to_string()))?;
        let dispatcher = TileDispatcher::new(config.workers)?;
        Ok(Self {
            config,
            style,
            zooms,
            output_root: output_root.into(),
            dispatcher,
            cancel: CancellationToken::new(),
            stage: PipelineStage::Indexing,
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this pipeline.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    fn advance(&mut self, next: PipelineStage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(TilingError::configuration(format!(
                "cannot move from {} to {}",
                self.stage, next
            )));
        }
        info!(from = %self.stage, to = %next, "Pipeline stage");
        self.stage = next;
        Ok(())
    }

    /// Run every stage for `input`.
    ///
    /// Tiles are indexed from `bbox` when given, otherwise from the source
    /// extent. Each run starts again from indexing.
    pub fn run(&mut self, input: PipelineInput, bbox: Option<BoundingBox>) -> Result<PipelineReport> {
        self.stage = PipelineStage::Indexing;
        match input {
            PipelineInput::Static { kind, source } => self.run_static(kind, source, bbox),
            PipelineInput::Animated(frames) => self.run_animated(&frames, bbox),
        }
    }

    fn run_static(
        &mut self,
        kind: EngineKind,
        source: RasterSource,
        bbox: Option<BoundingBox>,
    ) -> Result<PipelineReport> {
        let engine = TileEngine::new(
            kind,
            source,
            self.style.clone(),
            &self.output_root,
            self.config.tile_size,
        )?;
        let tiles = match bbox {
            Some(bbox) => tiles_in_bbox(&bbox, self.zooms),
            None => engine.tiles(self.zooms),
        };
        info!(engine = %kind, tiles = tiles.len(), "Indexed static source");

        self.advance(PipelineStage::PerTimestepTiling)?;
        let summary = self.dispatcher.dispatch(&engine, &tiles, None, &self.cancel);
        if summary.cancelled > 0 {
            warn!(cancelled = summary.cancelled, "Static tiling cancelled");
            return Err(TilingError::Cancelled);
        }

        self.advance(PipelineStage::Done)?;
        Ok(PipelineReport {
            tiles,
            frames: vec![summary],
            artifacts: Vec::new(),
        })
    }

    fn run_animated(&mut self, frames: &FrameSource, bbox: Option<BoundingBox>) -> Result<PipelineReport> {
        if frames.is_empty() {
            return Err(TilingError::configuration("animated source has no frames"));
        }
        let extent = match bbox {
            Some(bbox) => bbox,
            None => frames.bounds()?,
        };
        let tiles = tiles_in_bbox(&extent, self.zooms);
        info!(frames = frames.len(), tiles = tiles.len(), "Indexed animated source");

        self.advance(PipelineStage::PerTimestepTiling)?;
        let sequencer = TimeSeriesSequencer::new(
            &self.dispatcher,
            self.style.clone(),
            &self.output_root,
            self.config.tile_size,
        )
        .with_min_frame_width(self.config.min_frame_width)
        .with_cancellation(self.cancel.clone());
        let summaries = sequencer.run(frames, &tiles)?;

        if self.cancel.is_cancelled() {
            return Err(TilingError::Cancelled);
        }

        self.advance(PipelineStage::Assembling)?;
        let expected: Vec<TileCoord> = summaries
            .iter()
            .flat_map(|s| s.written.iter().map(|w| w.coord))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let artifacts =
            AnimationAssembler::new(self.config.frame_delay).assemble(&self.output_root, &expected)?;

        self.advance(PipelineStage::Done)?;
        Ok(PipelineReport {
            tiles,
            frames: summaries,
            artifacts,
        })
    }
}

impl fmt::Debug for TilingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TilingPipeline")
            .field("stage", &self.stage)
            .field("zooms", &self.zooms)
            .field("output_root", &self.output_root)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions() {
        use PipelineStage::*;
        assert!(Indexing.can_advance_to(PerTimestepTiling));
        assert!(PerTimestepTiling.can_advance_to(Assembling));
        assert!(PerTimestepTiling.can_advance_to(Done));
        assert!(Assembling.can_advance_to(Done));

        assert!(!PerTimestepTiling.can_advance_to(Indexing));
        assert!(!Assembling.can_advance_to(PerTimestepTiling));
        assert!(!Done.can_advance_to(Indexing));
        assert!(!Indexing.can_advance_to(Done));
        assert!(!Done.can_advance_to(Done));
    }

    #[test]
    fn test_advance_rejects_backward() {
        let style = StyleDescriptor::new(0.0, 1.0).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = TilingPipeline::new(
            TilingConfig::default(),
            style,
            ZoomRange::single(0).unwrap(),
            dir.path(),
        )
        .unwrap();

        pipeline.advance(PipelineStage::PerTimestepTiling).unwrap();
        assert!(matches!(
            pipeline.advance(PipelineStage::Indexing),
            Err(TilingError::Configuration(_))
        ));
        assert_eq!(pipeline.stage(), PipelineStage::PerTimestepTiling);
    }
}
