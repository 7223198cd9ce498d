//! Pixel rendering for raster map tiles.
//!
//! - Tile blocks: pixel data plus validity mask as read from a source
//! - Styles: value range, colormaps and palettes
//! - Gradient rendering: linear rescale into 8-bit and colormap lookup
//! - PNG and animated PNG encoding

pub mod apng;
pub mod block;
pub mod error;
pub mod gradient;
pub mod png;
pub mod style;

pub use apng::{create_apng, create_apng_from_pngs, FrameDelay};
pub use block::TileBlock;
pub use error::RenderError;
pub use gradient::{rescale_value, PixelRenderer, RenderMode, RgbaImage};
pub use style::{Color, Colormap, Palette, PaletteMode, StyleDescriptor};
