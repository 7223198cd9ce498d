//! Rescale and colormap rendering of tile blocks.

use crate::block::TileBlock;
use crate::error::RenderError;
use crate::style::{Color, StyleDescriptor};

/// Linearly rescale `value` from `[vmin, vmax]` to `[0, 255]`.
///
/// Values outside the range clamp to the nearest end, infinities included.
/// NaN maps to 0; callers mask those pixels before they reach the colormap.
pub fn rescale_value(value: f64, vmin: f64, vmax: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    let range = vmax - vmin;
    if range <= 0.0 {
        return if value >= vmax { 255 } else { 0 };
    }
    let scaled = ((value - vmin) / range * 255.0).clamp(0.0, 255.0);
    scaled.round() as u8
}

/// How a block's bands become RGBA channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// One band, rescaled and colormapped.
    SingleBand,
    /// Three (RGB) or four (RGBA) bands passed through as channels.
    MultiBand,
}

impl RenderMode {
    pub fn for_band_count(bands: usize) -> Self {
        if bands == 1 {
            RenderMode::SingleBand
        } else {
            RenderMode::MultiBand
        }
    }
}

/// Rendered RGBA pixels, 4 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    /// True when every pixel has zero alpha.
    pub fn is_transparent(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 0)
    }
}

/// Turns tile blocks into RGBA images using one style.
#[derive(Debug, Clone)]
pub struct PixelRenderer {
    style: StyleDescriptor,
}

impl PixelRenderer {
    pub fn new(style: StyleDescriptor) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &StyleDescriptor {
        &self.style
    }

    /// Render with the mode implied by the block's band count.
    pub fn render(&self, block: &TileBlock) -> Result<RgbaImage, RenderError> {
        self.render_as(block, RenderMode::for_band_count(block.bands))
    }

    pub fn render_as(&self, block: &TileBlock, mode: RenderMode) -> Result<RgbaImage, RenderError> {
        match mode {
            RenderMode::SingleBand => self.render_single_band(block),
            RenderMode::MultiBand => render_multi_band(block),
        }
    }

    fn render_single_band(&self, block: &TileBlock) -> Result<RgbaImage, RenderError> {
        if block.bands != 1 {
            return Err(RenderError::BandMismatch {
                mode: "single-band",
                expected: "1",
                actual: block.bands,
            });
        }

        let mut pixels = vec![0u8; block.pixel_count() * 4];
        for (idx, (&value, &valid)) in block.band(0).iter().zip(&block.mask).enumerate() {
            if !valid || !value.is_finite() {
                continue;
            }
            let index = self.style.rescale(value as f64);
            let color = match &self.style.colormap {
                Some(cmap) => cmap.get(index),
                None => Color::opaque(index, index, index),
            };
            pixels[idx * 4..idx * 4 + 4].copy_from_slice(&color.to_array());
        }

        Ok(RgbaImage {
            width: block.width,
            height: block.height,
            pixels,
        })
    }
}

/// Interleave 3 or 4 band planes into RGBA with no rescale.
///
/// RGB sources take alpha from the validity mask. Masked pixels are fully
/// transparent in both cases.
fn render_multi_band(block: &TileBlock) -> Result<RgbaImage, RenderError> {
    if block.bands != 3 && block.bands != 4 {
        return Err(RenderError::BandMismatch {
            mode: "multi-band",
            expected: "3 or 4",
            actual: block.bands,
        });
    }

    let plane = block.pixel_count();
    let mut pixels = vec![0u8; plane * 4];
    for idx in 0..plane {
        if !block.mask[idx] {
            continue;
        }
        let out = &mut pixels[idx * 4..idx * 4 + 4];
        for band in 0..block.bands {
            out[band] = to_channel(block.data[band * plane + idx]);
        }
        if block.bands == 3 {
            out[3] = 255;
        }
    }

    Ok(RgbaImage {
        width: block.width,
        height: block.height,
        pixels,
    })
}

fn to_channel(value: f32) -> u8 {
    if value.is_finite() {
        value.clamp(0.0, 255.0) as u8
    } else {
        0
    }
}
