//! Tests for PNG and animated PNG encoding.
//!
//! Encoded bytes are decoded back through the `image` crate to check that
//! what we write by hand is readable by a standard decoder.

use std::io::Cursor;

use image::codecs::png::PngDecoder;
use image::AnimationDecoder;
use renderer::png::{create_png, create_png_auto, decode_png, encode_tile, PNG_SIGNATURE};
use renderer::{create_apng, create_apng_from_pngs, FrameDelay, RenderError, RgbaImage};

// ============================================================================
// Helper functions
// ============================================================================

/// Banded image with a handful of colors and a transparent column.
fn banded_image(width: usize, height: usize, shade: u8) -> RgbaImage {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            if x == 0 {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
            } else {
                let band = ((y * 4) / height) as u8;
                pixels.extend_from_slice(&[band * 60, shade, 255 - band * 60, 255]);
            }
        }
    }
    RgbaImage {
        width,
        height,
        pixels,
    }
}

/// Walk chunk types of a PNG stream.
fn chunk_types(png: &[u8]) -> Vec<String> {
    let mut types = Vec::new();
    let mut pos = PNG_SIGNATURE.len();
    while pos + 8 <= png.len() {
        let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
        types.push(String::from_utf8_lossy(&png[pos + 4..pos + 8]).to_string());
        pos += 12 + len;
    }
    types
}

// ============================================================================
// Static PNG
// ============================================================================

#[test]
fn test_indexed_png_decodes_to_same_pixels() {
    let image = banded_image(16, 16, 40);
    let png = encode_tile(&image).unwrap();

    assert_eq!(&png[0..8], &PNG_SIGNATURE);
    assert!(chunk_types(&png).contains(&"PLTE".to_string()));
    assert!(chunk_types(&png).contains(&"tRNS".to_string()));

    let decoded = decode_png(&png).unwrap();
    assert_eq!(decoded, image);
}

#[test]
fn test_rgba_fallback_decodes_to_same_pixels() {
    // 300 unique colors
    let pixels: Vec<u8> = (0..300u32)
        .flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 7, 255])
        .collect();
    let png = create_png_auto(&pixels, 300, 1).unwrap();
    assert!(!chunk_types(&png).contains(&"PLTE".to_string()));

    let decoded = decode_png(&png).unwrap();
    assert_eq!(decoded.width, 300);
    assert_eq!(decoded.pixels, pixels);
}

#[test]
fn test_encoding_is_deterministic() {
    let image = banded_image(64, 64, 90);
    assert_eq!(encode_tile(&image).unwrap(), encode_tile(&image).unwrap());
}

#[test]
fn test_indexed_smaller_than_rgba_for_few_colors() {
    let image = banded_image(256, 256, 10);
    let indexed = encode_tile(&image).unwrap();
    let rgba = create_png(&image.pixels, 256, 256).unwrap();
    assert!(indexed.len() < rgba.len());
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(matches!(decode_png(b"not a png"), Err(RenderError::Decode(_))));
}

// ============================================================================
// Animated PNG
// ============================================================================

#[test]
fn test_apng_chunk_order() {
    let frames: Vec<RgbaImage> = (0..3).map(|i| banded_image(8, 8, i * 50)).collect();
    let apng = create_apng(&frames, FrameDelay::default()).unwrap();

    let types = chunk_types(&apng);
    assert_eq!(
        types,
        vec!["IHDR", "acTL", "fcTL", "IDAT", "fcTL", "fdAT", "fcTL", "fdAT", "IEND"]
    );
}

#[test]
fn test_apng_decodes_all_frames_in_order() {
    let frames: Vec<RgbaImage> = (0..3).map(|i| banded_image(8, 8, i * 50)).collect();
    let apng = create_apng(&frames, FrameDelay::new(1, 1000)).unwrap();

    let decoder = PngDecoder::new(Cursor::new(apng.as_slice())).unwrap();
    assert!(decoder.is_apng());
    let decoded = decoder.apng().into_frames().collect_frames().unwrap();
    assert_eq!(decoded.len(), 3);

    for (frame, expected) in decoded.iter().zip(&frames) {
        assert_eq!(frame.buffer().as_raw(), &expected.pixels);
        let (num, den) = frame.delay().numer_denom_ms();
        assert_eq!(num as f64 / den as f64, 1.0);
    }
}

#[test]
fn test_apng_from_png_frames() {
    let pngs: Vec<Vec<u8>> = (0..2)
        .map(|i| encode_tile(&banded_image(4, 4, i * 100)).unwrap())
        .collect();
    let apng = create_apng_from_pngs(&pngs, FrameDelay::default()).unwrap();

    let decoder = PngDecoder::new(Cursor::new(apng.as_slice())).unwrap();
    assert!(decoder.is_apng());
    assert_eq!(decoder.apng().into_frames().count(), 2);
}

#[test]
fn test_apng_single_frame() {
    let apng = create_apng(&[banded_image(4, 4, 0)], FrameDelay::default()).unwrap();
    assert_eq!(chunk_types(&apng), vec!["IHDR", "acTL", "fcTL", "IDAT", "IEND"]);
    // Still a readable still image
    assert_eq!(decode_png(&apng).unwrap(), banded_image(4, 4, 0));
}

#[test]
fn test_apng_rejects_mismatched_frames() {
    let frames = vec![banded_image(4, 4, 0), banded_image(8, 4, 0)];
    assert!(matches!(
        create_apng(&frames, FrameDelay::default()),
        Err(RenderError::Encode(_))
    ));
}
