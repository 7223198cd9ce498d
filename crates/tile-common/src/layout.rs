//! On-disk layout of tile pyramids.
//!
//! Static tiles live at `<root>/<z>/<x>/<y>.png`. Frames of an animated
//! sequence live next to them as `<root>/<z>/<x>/<y>_<frame>.png`, where the
//! frame index is zero padded so that lexical and numeric order agree.

use crate::tile::TileCoord;
use std::path::{Path, PathBuf};

/// Extension used for every tile artifact.
pub const TILE_EXTENSION: &str = "png";

/// Minimum number of digits in a frame suffix.
pub const DEFAULT_FRAME_WIDTH: usize = 3;

impl TileCoord {
    /// Directory holding all rows of this tile's column.
    pub fn column_dir(&self, root: &Path) -> PathBuf {
        root.join(self.z.to_string()).join(self.x.to_string())
    }

    /// Path of the static (or assembled animated) artifact for this tile.
    pub fn tile_path(&self, root: &Path) -> PathBuf {
        self.column_dir(root)
            .join(format!("{}.{}", self.y, TILE_EXTENSION))
    }

    /// Path of one frame of this tile.
    pub fn frame_path(&self, root: &Path, numbering: &FrameNumbering, frame: usize) -> PathBuf {
        self.column_dir(root).join(format!(
            "{}_{}.{}",
            self.y,
            numbering.label(frame),
            TILE_EXTENSION
        ))
    }
}

/// Zero-padded frame numbering for one sequence.
///
/// The width is `max(min_width, digits(frame_count))`, so sequences longer
/// than 999 frames get wider suffixes instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameNumbering {
    width: usize,
}

impl FrameNumbering {
    pub fn for_count(frame_count: usize, min_width: usize) -> Self {
        let digits = frame_count.max(1).to_string().len();
        Self {
            width: digits.max(min_width),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn label(&self, frame: usize) -> String {
        format!("{:0width$}", frame, width = self.width)
    }
}

impl Default for FrameNumbering {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_WIDTH,
        }
    }
}

/// A parsed tile file name inside a column directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFileName {
    /// `<y>.png`
    Tile { row: String },
    /// `<y>_<frame>.png`
    Frame { row: String, frame: u32 },
    /// `<y>_<suffix>.png` where the suffix is not a frame index.
    Malformed { row: String, suffix: String },
}

impl FrameFileName {
    /// Parse a file name. Returns `None` for anything that is not a PNG.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", TILE_EXTENSION))?;
        match stem.split_once('_') {
            None => Some(Self::Tile {
                row: stem.to_string(),
            }),
            Some((row, suffix)) => match suffix.parse::<u32>() {
                Ok(frame) if suffix.bytes().all(|b| b.is_ascii_digit()) => Some(Self::Frame {
                    row: row.to_string(),
                    frame,
                }),
                _ => Some(Self::Malformed {
                    row: row.to_string(),
                    suffix: suffix.to_string(),
                }),
            },
        }
    }

    pub fn row(&self) -> &str {
        match self {
            Self::Tile { row } | Self::Frame { row, .. } | Self::Malformed { row, .. } => row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_and_frame_paths() {
        let root = Path::new("/tiles/layer");
        let tile = TileCoord::new(4, 8, 5);
        assert_eq!(tile.tile_path(root), PathBuf::from("/tiles/layer/4/8/5.png"));
        assert_eq!(
            tile.frame_path(root, &FrameNumbering::default(), 7),
            PathBuf::from("/tiles/layer/4/8/5_007.png")
        );
    }

    #[test]
    fn test_frame_numbering_width() {
        assert_eq!(FrameNumbering::for_count(3, 3).width(), 3);
        assert_eq!(FrameNumbering::for_count(999, 3).width(), 3);
        assert_eq!(FrameNumbering::for_count(1000, 3).width(), 4);
        assert_eq!(FrameNumbering::for_count(0, 3).width(), 3);

        let numbering = FrameNumbering::for_count(1200, 3);
        assert_eq!(numbering.label(5), "0005");
        assert_eq!(numbering.label(1199), "1199");
    }

    #[test]
    fn test_parse_frame_file_names() {
        assert_eq!(
            FrameFileName::parse("12_003.png"),
            Some(FrameFileName::Frame {
                row: "12".to_string(),
                frame: 3
            })
        );
        assert_eq!(
            FrameFileName::parse("12.png"),
            Some(FrameFileName::Tile {
                row: "12".to_string()
            })
        );
        assert_eq!(
            FrameFileName::parse("12_x1.png"),
            Some(FrameFileName::Malformed {
                row: "12".to_string(),
                suffix: "x1".to_string()
            })
        );
        assert_eq!(FrameFileName::parse("12_003.tif"), None);
        assert_eq!(FrameFileName::parse("12_+3.png").map(|f| f.row().to_string()), Some("12".to_string()));
    }
}
