//! Animated PNG encoding.
//!
//! Frames are written as RGBA 8-bit. The first frame lives in `IDAT` so
//! viewers without APNG support still show it; later frames go in `fdAT`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RenderError;
use crate::gradient::RgbaImage;
use crate::png::{decode_png, deflate_rgba, ihdr, write_chunk, PNG_SIGNATURE};

const DISPOSE_OP_NONE: u8 = 0;
const BLEND_OP_SOURCE: u8 = 0;

/// Per-frame display time as a fraction of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDelay {
    pub numerator: u16,
    pub denominator: u16,
}

impl FrameDelay {
    pub fn new(numerator: u16, denominator: u16) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Delay in seconds. A zero denominator means hundredths.
    pub fn seconds(&self) -> f64 {
        let den = if self.denominator == 0 { 100 } else { self.denominator };
        self.numerator as f64 / den as f64
    }
}

impl Default for FrameDelay {
    fn default() -> Self {
        // One millisecond per frame
        Self::new(1, 1000)
    }
}

/// Encode frames as an infinitely looping APNG.
///
/// All frames must share the first frame's dimensions.
pub fn create_apng(frames: &[RgbaImage], delay: FrameDelay) -> Result<Vec<u8>, RenderError> {
    let first = frames
        .first()
        .ok_or_else(|| RenderError::Encode("animation needs at least one frame".to_string()))?;
    let (width, height) = (first.width, first.height);

    for (i, frame) in frames.iter().enumerate() {
        if frame.width != width || frame.height != height {
            return Err(RenderError::Encode(format!(
                "frame {} is {}x{}, expected {}x{}",
                i, frame.width, frame.height, width, height
            )));
        }
        if frame.pixels.len() != width * height * 4 {
            return Err(RenderError::ShapeMismatch {
                expected: width * height * 4,
                actual: frame.pixels.len(),
            });
        }
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));

    let mut actl = Vec::with_capacity(8);
    actl.extend_from_slice(&(frames.len() as u32).to_be_bytes());
    actl.extend_from_slice(&0u32.to_be_bytes()); // loop forever
    write_chunk(&mut png, b"acTL", &actl);

    // fcTL and fdAT chunks share one sequence counter
    let mut sequence: u32 = 0;
    for (i, frame) in frames.iter().enumerate() {
        write_chunk(&mut png, b"fcTL", &fctl(sequence, width, height, delay));
        sequence += 1;

        let data = deflate_rgba(&frame.pixels, width, height)?;
        if i == 0 {
            write_chunk(&mut png, b"IDAT", &data);
        } else {
            let mut fdat = Vec::with_capacity(4 + data.len());
            fdat.extend_from_slice(&sequence.to_be_bytes());
            fdat.extend_from_slice(&data);
            write_chunk(&mut png, b"fdAT", &fdat);
            sequence += 1;
        }
    }

    write_chunk(&mut png, b"IEND", &[]);
    debug!(frames = frames.len(), width, height, bytes = png.len(), "Encoded animated PNG");
    Ok(png)
}

/// Decode each PNG and encode them, in order, as one APNG.
pub fn create_apng_from_pngs<B: AsRef<[u8]>>(
    pngs: &[B],
    delay: FrameDelay,
) -> Result<Vec<u8>, RenderError> {
    let frames = pngs
        .iter()
        .map(|bytes| decode_png(bytes.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    create_apng(&frames, delay)
}

fn fctl(sequence: u32, width: usize, height: usize, delay: FrameDelay) -> Vec<u8> {
    let mut data = Vec::with_capacity(26);
    data.extend_from_slice(&sequence.to_be_bytes());
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes()); // x offset
    data.extend_from_slice(&0u32.to_be_bytes()); // y offset
    data.extend_from_slice(&delay.numerator.to_be_bytes());
    data.extend_from_slice(&delay.denominator.to_be_bytes());
    data.push(DISPOSE_OP_NONE);
    data.push(BLEND_OP_SOURCE);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fctl_layout() {
        let data = fctl(3, 256, 128, FrameDelay::default());
        assert_eq!(data.len(), 26);
        assert_eq!(&data[0..4], &3u32.to_be_bytes());
        assert_eq!(&data[4..8], &256u32.to_be_bytes());
        assert_eq!(&data[8..12], &128u32.to_be_bytes());
        assert_eq!(&data[20..22], &1u16.to_be_bytes());
        assert_eq!(&data[22..24], &1000u16.to_be_bytes());
        assert_eq!(data[24], DISPOSE_OP_NONE);
        assert_eq!(data[25], BLEND_OP_SOURCE);
    }

    #[test]
    fn test_frame_delay_seconds() {
        assert_eq!(FrameDelay::default().seconds(), 0.001);
        assert_eq!(FrameDelay::new(5, 0).seconds(), 0.05);
    }

    #[test]
    fn test_empty_animation_rejected() {
        assert!(create_apng(&[], FrameDelay::default()).is_err());
    }
}
