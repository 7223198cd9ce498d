//! Consolidation of per-timestep frame files into animated tiles.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use renderer::{create_apng_from_pngs, FrameDelay};
use tile_common::{FrameFileName, TileCoord};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, TilingError};

/// One animated tile written by the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTile {
    pub coord: TileCoord,
    pub path: PathBuf,
    pub frames: usize,
}

/// Frames found for one tile, keyed by frame index.
type FrameGroup = BTreeMap<u32, PathBuf>;

/// Merges `<y>_<frame>.png` files into `<y>.png` animations.
#[derive(Debug, Clone, Default)]
pub struct AnimationAssembler {
    delay: FrameDelay,
}

impl AnimationAssembler {
    pub fn new(delay: FrameDelay) -> Self {
        Self { delay }
    }

    /// Assemble every frame group under `root`.
    ///
    /// Each tile in `expected` must have at least one frame on disk. Frames
    /// are ordered by numeric index, merged into one APNG at the tile's
    /// static path, and deleted once the artifact is written. Any
    /// inconsistency (missing group, duplicate index, unparseable name,
    /// undecodable or mismatched frames) aborts with an error.
    pub fn assemble(&self, root: &Path, expected: &[TileCoord]) -> Result<Vec<AssembledTile>> {
        let groups = scan_frames(root)?;

        for coord in expected {
            if !groups.contains_key(coord) {
                return Err(TilingError::assembly(
                    coord.tile_path(root),
                    format!("tile {} has no frames", coord),
                ));
            }
        }

        let mut assembled = Vec::with_capacity(groups.len());
        for (coord, frames) in groups {
            assembled.push(self.assemble_group(root, coord, &frames)?);
        }
        Ok(assembled)
    }

    fn assemble_group(&self, root: &Path, coord: TileCoord, frames: &FrameGroup) -> Result<AssembledTile> {
        let output = coord.tile_path(root);
        if frames.is_empty() {
            return Err(TilingError::assembly(&output, "group has no frames"));
        }

        let mut pngs = Vec::with_capacity(frames.len());
        for path in frames.values() {
            pngs.push(fs::read(path)?);
        }

        let apng = create_apng_from_pngs(&pngs, self.delay)
            .map_err(|e| TilingError::assembly(&output, e.to_string()))?;
        fs::write(&output, apng)?;

        for path in frames.values() {
            fs::remove_file(path)?;
        }

        info!(tile = %coord, frames = frames.len(), path = %output.display(), "Assembled animated tile");
        Ok(AssembledTile {
            coord,
            path: output,
            frames: frames.len(),
        })
    }
}

/// Group frame files under `<root>/<z>/<x>/` by tile.
fn scan_frames(root: &Path) -> Result<BTreeMap<TileCoord, FrameGroup>> {
    let mut groups: BTreeMap<TileCoord, FrameGroup> = BTreeMap::new();
    if !root.is_dir() {
        return Ok(groups);
    }

    let column_dirs: BTreeSet<PathBuf> = WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect();

    for dir in column_dirs {
        let (z, x) = match parse_column_dir(root, &dir) {
            Some(zx) => zx,
            None => {
                debug!(dir = %dir.display(), "Skipping non-tile directory");
                continue;
            }
        };

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let parsed = match FrameFileName::parse(&name) {
                Some(parsed) => parsed,
                None => continue,
            };

            let (row, frame) = match parsed {
                FrameFileName::Tile { .. } => continue,
                FrameFileName::Frame { row, frame } => (row, frame),
                FrameFileName::Malformed { suffix, .. } => {
                    return Err(TilingError::assembly(
                        &path,
                        format!("frame suffix '{}' is not a frame index", suffix),
                    ))
                }
            };

            let y: u32 = row.parse().map_err(|_| {
                TilingError::assembly(&path, format!("row '{}' is not a tile row", row))
            })?;
            let group = groups.entry(TileCoord::new(z, x, y)).or_default();
            if let Some(existing) = group.insert(frame, path.clone()) {
                return Err(TilingError::assembly(
                    &path,
                    format!("duplicate frame {} (also {})", frame, existing.display()),
                ));
            }
        }
    }

    Ok(groups)
}

fn parse_column_dir(root: &Path, dir: &Path) -> Option<(u32, u32)> {
    let rel = dir.strip_prefix(root).ok()?;
    let mut parts = rel.components().map(|c| c.as_os_str().to_str());
    let z = parts.next()??.parse().ok()?;
    let x = parts.next()??.parse().ok()?;
    Some((z, x))
}
