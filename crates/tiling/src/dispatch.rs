//! Concurrent fan-out of tile tasks over a worker pool.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tile_common::TileCoord;
use tracing::{debug, error};

use crate::cancel::CancellationToken;
use crate::engine::{FrameSlot, TileEngine, TileOutcome};
use crate::error::{Result, TileError, TilingError};

/// A tile that failed, with its cause.
#[derive(Debug)]
pub struct TileFailure {
    pub coord: TileCoord,
    pub error: TileError,
}

/// A tile that produced a PNG.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WrittenTile {
    pub coord: TileCoord,
    pub path: PathBuf,
}

/// Aggregated outcomes of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    /// Written tiles, sorted by coordinate.
    pub written: Vec<WrittenTile>,
    pub out_of_bounds: usize,
    pub cancelled: usize,
    pub failures: Vec<TileFailure>,
}

impl DispatchSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.out_of_bounds + self.cancelled + self.failures.len()
    }

    fn record(&mut self, outcome: TileOutcome) {
        match outcome {
            TileOutcome::Written { coord, path } => self.written.push(WrittenTile { coord, path }),
            TileOutcome::OutOfBounds(_) => self.out_of_bounds += 1,
            TileOutcome::Cancelled(_) => self.cancelled += 1,
            TileOutcome::Failed { coord, error } => self.failures.push(TileFailure { coord, error }),
        }
    }
}

/// Runs every tile of a set on a bounded rayon pool and joins.
///
/// Tiles complete in no particular order. A failing or panicking tile is
/// recorded in the summary and never stops its siblings.
pub struct TileDispatcher {
    pool: ThreadPool,
}

impl TileDispatcher {
    /// Build a pool with `workers` threads, or rayon's default sizing.
    pub fn new(workers: Option<usize>) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("tile-worker-{}", i));
        if let Some(n) = workers {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| TilingError::configuration(format!("failed to build tile worker pool: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Render every tile in `tiles` and wait for all of them.
    pub fn dispatch(
        &self,
        engine: &TileEngine,
        tiles: &[TileCoord],
        frame: Option<FrameSlot>,
        cancel: &CancellationToken,
    ) -> DispatchSummary {
        let outcomes: Vec<TileOutcome> = self.pool.install(|| {
            tiles
                .par_iter()
                .map(|&coord| run_tile(engine, coord, frame, cancel))
                .collect()
        });

        let mut summary = DispatchSummary::default();
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary.written.sort();

        debug!(
            tiles = tiles.len(),
            written = summary.written.len(),
            out_of_bounds = summary.out_of_bounds,
            cancelled = summary.cancelled,
            failed = summary.failures.len(),
            "Dispatch complete"
        );
        summary
    }
}

fn run_tile(
    engine: &TileEngine,
    coord: TileCoord,
    frame: Option<FrameSlot>,
    cancel: &CancellationToken,
) -> TileOutcome {
    if cancel.is_cancelled() {
        return TileOutcome::Cancelled(coord);
    }

    match catch_unwind(AssertUnwindSafe(|| engine.render_tile(coord, frame))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(tile = %coord, panic = %message, "Tile task panicked");
            TileOutcome::Failed {
                coord,
                error: TileError::Panicked(message),
            }
        }
    }
}

impl std::fmt::Debug for TileDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileDispatcher")
            .field("workers", &self.workers())
            .finish()
    }
}
