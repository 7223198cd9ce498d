//! Error types for the renderer crate.

use thiserror::Error;

/// Errors that can occur while rendering or encoding a tile.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{mode} rendering expects {expected} band(s), got {actual}")]
    BandMismatch {
        mode: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("Pixel block shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Invalid style: {0}")]
    InvalidStyle(String),

    #[error("Invalid color '{0}'. Expected '#rrggbb' or '#rrggbbaa'")]
    InvalidColor(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("PNG decoding failed: {0}")]
    Decode(String),
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Encode(err.to_string())
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Decode(err.to_string())
    }
}
