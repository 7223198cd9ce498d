//! Tests for rescale and colormap rendering.

use renderer::gradient::{rescale_value, PixelRenderer, RenderMode};
use renderer::{Palette, PaletteMode, RenderError, StyleDescriptor, TileBlock};

fn gray_renderer(vmin: f64, vmax: f64) -> PixelRenderer {
    PixelRenderer::new(StyleDescriptor::new(vmin, vmax).unwrap())
}

// ============================================================================
// rescale_value tests
// ============================================================================

#[test]
fn test_rescale_endpoints() {
    assert_eq!(rescale_value(0.0, 0.0, 100.0), 0);
    assert_eq!(rescale_value(100.0, 0.0, 100.0), 255);
    assert_eq!(rescale_value(50.0, 0.0, 100.0), 128);
}

#[test]
fn test_rescale_clamp_law() {
    // Sweep well past both ends of several ranges
    let ranges = [(0.0, 100.0), (-40.0, 40.0), (250.0, 320.0), (0.0, 1e-3)];
    for (vmin, vmax) in ranges {
        let span = vmax - vmin;
        for step in -100..=200 {
            let v = vmin + span * step as f64 / 100.0;
            let out = rescale_value(v, vmin, vmax);
            if v <= vmin {
                assert_eq!(out, 0, "v={} range=[{}, {}]", v, vmin, vmax);
            }
            if v >= vmax {
                assert_eq!(out, 255, "v={} range=[{}, {}]", v, vmin, vmax);
            }
        }
    }
}

#[test]
fn test_rescale_monotonic() {
    let mut last = 0u8;
    for i in 0..=1000 {
        let out = rescale_value(i as f64 / 10.0, 0.0, 100.0);
        assert!(out >= last);
        last = out;
    }
}

#[test]
fn test_rescale_non_finite() {
    assert_eq!(rescale_value(f64::NAN, 0.0, 1.0), 0);
    assert_eq!(rescale_value(f64::INFINITY, 0.0, 100.0), 255);
    assert_eq!(rescale_value(f64::NEG_INFINITY, 0.0, 100.0), 0);
}

// ============================================================================
// Single-band rendering
// ============================================================================

#[test]
fn test_single_band_gray_without_colormap() {
    let block = TileBlock::new(1, 2, 1, vec![0.0, 100.0], vec![true, true]).unwrap();
    let image = gray_renderer(0.0, 100.0).render(&block).unwrap();
    assert_eq!(image.pixel(0, 0), [0, 0, 0, 255]);
    assert_eq!(image.pixel(1, 0), [255, 255, 255, 255]);
}

#[test]
fn test_single_band_masked_pixels_transparent() {
    let block = TileBlock::new(1, 3, 1, vec![10.0, f32::NAN, 90.0], vec![false, true, true]).unwrap();
    let image = gray_renderer(0.0, 100.0).render(&block).unwrap();
    assert_eq!(image.pixel(0, 0)[3], 0);
    assert_eq!(image.pixel(1, 0)[3], 0);
    assert_eq!(image.pixel(2, 0)[3], 255);
}

#[test]
fn test_single_band_palette_white_tile() {
    let palette = Palette::from_hex_map([(0, "#000000"), (100, "#ffffff")]).unwrap();
    let style = StyleDescriptor::new(0.0, 100.0)
        .unwrap()
        .with_palette(&palette, PaletteMode::Discrete)
        .unwrap();
    let renderer = PixelRenderer::new(style);

    let block = TileBlock::filled(1, 256, 100.0);
    let image = renderer.render(&block).unwrap();

    assert_eq!(image.width, 256);
    assert_eq!(image.height, 256);
    assert!(image.pixels.chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
}

#[test]
fn test_single_band_values_above_range_clamp() {
    let palette = Palette::from_hex_map([(0, "#000000"), (100, "#ff0000")]).unwrap();
    let style = StyleDescriptor::new(0.0, 100.0)
        .unwrap()
        .with_palette(&palette, PaletteMode::Discrete)
        .unwrap();
    let block = TileBlock::new(1, 2, 1, vec![-50.0, 5000.0], vec![true, true]).unwrap();
    let image = PixelRenderer::new(style).render(&block).unwrap();
    assert_eq!(image.pixel(0, 0), [0, 0, 0, 255]);
    assert_eq!(image.pixel(1, 0), [255, 0, 0, 255]);
}

#[test]
fn test_single_band_rejects_multi_band_block() {
    let block = TileBlock::filled(3, 4, 1.0);
    let err = gray_renderer(0.0, 1.0)
        .render_as(&block, RenderMode::SingleBand)
        .unwrap_err();
    assert!(matches!(err, RenderError::BandMismatch { actual: 3, .. }));
}

// ============================================================================
// Multi-band rendering
// ============================================================================

#[test]
fn test_multi_band_rgba_pass_through() {
    // 4 bands of 2 pixels, band-major
    let data = vec![
        10.0, 20.0, // R
        30.0, 40.0, // G
        50.0, 60.0, // B
        255.0, 128.0, // A
    ];
    let block = TileBlock::new(4, 2, 1, data, vec![true, true]).unwrap();
    let image = gray_renderer(0.0, 1.0).render(&block).unwrap();
    assert_eq!(image.pixel(0, 0), [10, 30, 50, 255]);
    assert_eq!(image.pixel(1, 0), [20, 40, 60, 128]);
}

#[test]
fn test_multi_band_no_rescale() {
    // vmin/vmax are ignored for pass-through
    let block = TileBlock::new(3, 1, 1, vec![200.0, 100.0, 0.0], vec![true]).unwrap();
    let image = gray_renderer(0.0, 1000.0).render(&block).unwrap();
    assert_eq!(image.pixel(0, 0), [200, 100, 0, 255]);
}

#[test]
fn test_multi_band_mask_and_bad_band_count() {
    let block = TileBlock::new(3, 1, 1, vec![200.0, 100.0, 0.0], vec![false]).unwrap();
    let image = gray_renderer(0.0, 1.0).render(&block).unwrap();
    assert!(image.is_transparent());

    let two = TileBlock::filled(2, 2, 1.0);
    assert!(matches!(
        gray_renderer(0.0, 1.0).render(&two),
        Err(RenderError::BandMismatch { actual: 2, .. })
    ));
}
