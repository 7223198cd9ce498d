//! Pixel blocks returned by a raster reader for one tile.

use crate::error::RenderError;

/// Pixel data for one tile: `bands` planes of `width * height` values plus a
/// validity mask.
///
/// Values are stored band-major (`data[band * width * height + row * width + col]`),
/// the layout raster readers produce. The mask is shared by all bands and is
/// `true` where the source holds data.
#[derive(Debug, Clone, PartialEq)]
pub struct TileBlock {
    pub bands: usize,
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
    pub mask: Vec<bool>,
}

impl TileBlock {
    /// Build a block, checking that data and mask lengths match the shape.
    pub fn new(
        bands: usize,
        width: usize,
        height: usize,
        data: Vec<f32>,
        mask: Vec<bool>,
    ) -> Result<Self, RenderError> {
        let plane = width * height;
        if data.len() != bands * plane {
            return Err(RenderError::ShapeMismatch {
                expected: bands * plane,
                actual: data.len(),
            });
        }
        if mask.len() != plane {
            return Err(RenderError::ShapeMismatch {
                expected: plane,
                actual: mask.len(),
            });
        }
        Ok(Self {
            bands,
            width,
            height,
            data,
            mask,
        })
    }

    /// A fully valid square block with every value set to `value`.
    pub fn filled(bands: usize, size: usize, value: f32) -> Self {
        Self {
            bands,
            width: size,
            height: size,
            data: vec![value; bands * size * size],
            mask: vec![true; size * size],
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Values of one band, row-major.
    pub fn band(&self, band: usize) -> &[f32] {
        let plane = self.pixel_count();
        &self.data[band * plane..(band + 1) * plane]
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|v| **v).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_shape() {
        assert!(TileBlock::new(2, 2, 2, vec![0.0; 8], vec![true; 4]).is_ok());
        assert!(matches!(
            TileBlock::new(2, 2, 2, vec![0.0; 7], vec![true; 4]),
            Err(RenderError::ShapeMismatch { expected: 8, actual: 7 })
        ));
        assert!(matches!(
            TileBlock::new(1, 2, 2, vec![0.0; 4], vec![true; 3]),
            Err(RenderError::ShapeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_band_slices() {
        let data: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let block = TileBlock::new(2, 2, 2, data, vec![true, false, true, true]).unwrap();
        assert_eq!(block.band(1), &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(block.valid_count(), 3);
    }
}
