//! Style descriptors, colormaps and palette parsing.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::gradient::rescale_value;

/// Number of entries in a colormap lookup table.
pub const COLORMAP_SIZE: usize = 256;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`. The leading `#` is optional.
    pub fn from_hex(hex: &str) -> Result<Self, RenderError> {
        let digits = hex.trim().trim_start_matches('#');
        let channel = |i: usize| {
            digits
                .get(i..i + 2)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| RenderError::InvalidColor(hex.to_string()))
        };

        match digits.len() {
            6 => Ok(Self::opaque(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => Err(RenderError::InvalidColor(hex.to_string())),
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn to_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Linear color interpolation
fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;
    let mix = |a: u8, b: u8| ((a as f32 * t_inv) + (b as f32 * t)).round() as u8;

    Color::new(
        mix(color1.r, color2.r),
        mix(color1.g, color2.g),
        mix(color1.b, color2.b),
        mix(color1.a, color2.a),
    )
}

/// How palette stops are expanded into a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteMode {
    /// Each entry takes the color of the closest stop at or below it.
    #[default]
    Discrete,
    /// Entries between stops are interpolated.
    Linear,
}

/// Discrete mapping from raw data value to display color.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Palette {
    entries: BTreeMap<i64, Color>,
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: i64, color: Color) {
        self.entries.insert(value, color);
    }

    /// Build from `value -> "#rrggbb"` pairs.
    pub fn from_hex_map<'a, I>(pairs: I) -> Result<Self, RenderError>
    where
        I: IntoIterator<Item = (i64, &'a str)>,
    {
        let mut palette = Self::new();
        for (value, hex) in pairs {
            palette.insert(value, Color::from_hex(hex)?);
        }
        Ok(palette)
    }

    /// Parse the `paletteEntry` elements of a QGIS QML style document.
    ///
    /// Each entry needs a `value` and `color` attribute; an optional `alpha`
    /// attribute (0-255) overrides the color's alpha channel.
    pub fn from_qml(xml: &str) -> Result<Self, RenderError> {
        let mut reader = Reader::from_str(xml);
        let mut palette = Self::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                    if e.name().as_ref() == b"paletteEntry" =>
                {
                    let mut value = None;
                    let mut color = None;
                    let mut alpha = None;

                    for attr in e.attributes().flatten() {
                        let text = attr
                            .unescape_value()
                            .map_err(|e| RenderError::InvalidStyle(e.to_string()))?;
                        match attr.key.as_ref() {
                            b"value" => value = Some(text.trim().to_string()),
                            b"color" => color = Some(Color::from_hex(&text)?),
                            b"alpha" => alpha = text.trim().parse::<u8>().ok(),
                            _ => {}
                        }
                    }

                    let (value, mut color) = match (value, color) {
                        (Some(v), Some(c)) => (v, c),
                        _ => {
                            return Err(RenderError::InvalidStyle(
                                "paletteEntry without value or color".to_string(),
                            ))
                        }
                    };
                    let value = value.parse::<i64>().map_err(|_| {
                        RenderError::InvalidStyle(format!("palette value '{}' is not an integer", value))
                    })?;
                    if let Some(a) = alpha {
                        color.a = a;
                    }
                    palette.insert(value, color);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(RenderError::InvalidStyle(format!("QML parse error: {}", e))),
                _ => {}
            }
        }

        Ok(palette)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, value: i64) -> Option<Color> {
        self.entries.get(&value).copied()
    }

    /// Entries in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, Color)> + '_ {
        self.entries.iter().map(|(v, c)| (*v, *c))
    }
}

/// 256-entry RGBA lookup table indexed by rescaled 8-bit value.
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
    entries: Vec<Color>,
}

impl Colormap {
    /// Build from explicit entries. Missing trailing entries are transparent.
    pub fn from_entries(entries: &[Color]) -> Result<Self, RenderError> {
        if entries.len() > COLORMAP_SIZE {
            return Err(RenderError::InvalidStyle(format!(
                "colormap has {} entries, at most {} allowed",
                entries.len(),
                COLORMAP_SIZE
            )));
        }
        let mut table = vec![Color::transparent(); COLORMAP_SIZE];
        table[..entries.len()].copy_from_slice(entries);
        Ok(Self { entries: table })
    }

    /// Evenly space `colors` across the table and interpolate between them.
    ///
    /// Channels are truncated to 8 bits after interpolation.
    pub fn linear_segmented(colors: &[Color]) -> Result<Self, RenderError> {
        if colors.len() < 2 {
            return Err(RenderError::InvalidStyle(
                "linear segmented colormap needs at least two colors".to_string(),
            ));
        }

        let segments = (colors.len() - 1) as f64;
        let last = (COLORMAP_SIZE - 1) as f64;
        let entries = (0..COLORMAP_SIZE)
            .map(|i| {
                let pos = i as f64 / last * segments;
                let seg = (pos.floor() as usize).min(colors.len() - 2);
                let t = pos - seg as f64;
                let (lo, hi) = (colors[seg], colors[seg + 1]);
                let mix = |a: u8, b: u8| {
                    let unit = (a as f64 / 255.0) * (1.0 - t) + (b as f64 / 255.0) * t;
                    (unit * 255.0) as u8
                };
                Color::new(mix(lo.r, hi.r), mix(lo.g, hi.g), mix(lo.b, hi.b), mix(lo.a, hi.a))
            })
            .collect();

        Ok(Self { entries })
    }

    /// Expand palette stops keyed by data value into a lookup table.
    ///
    /// Stop values go through the same rescale as pixel values, so a stop at
    /// `vmax` lands on entry 255.
    pub fn from_palette(
        palette: &Palette,
        vmin: f64,
        vmax: f64,
        mode: PaletteMode,
    ) -> Result<Self, RenderError> {
        if palette.is_empty() {
            return Err(RenderError::InvalidStyle("palette is empty".to_string()));
        }

        // Later stops win when two values project onto the same entry.
        let mut stops: BTreeMap<u8, Color> = BTreeMap::new();
        for (value, color) in palette.iter() {
            stops.insert(rescale_value(value as f64, vmin, vmax), color);
        }
        let stops: Vec<(u8, Color)> = stops.into_iter().collect();

        let entries = (0..COLORMAP_SIZE)
            .map(|i| {
                let i = i as u8;
                let below = stops.iter().rev().find(|(k, _)| *k <= i);
                match mode {
                    PaletteMode::Discrete => below.map(|(_, c)| *c).unwrap_or_else(Color::transparent),
                    PaletteMode::Linear => {
                        let above = stops.iter().find(|(k, _)| *k >= i);
                        match (below, above) {
                            (Some((k0, c0)), Some((k1, c1))) if k1 > k0 => {
                                let t = (i - k0) as f32 / (k1 - k0) as f32;
                                interpolate_color(*c0, *c1, t)
                            }
                            (Some((_, c)), _) | (None, Some((_, c))) => *c,
                            (None, None) => Color::transparent(),
                        }
                    }
                }
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn get(&self, index: u8) -> Color {
        self.entries[index as usize]
    }

    pub fn entries(&self) -> &[Color] {
        &self.entries
    }
}

/// Value range plus optional colormap for single-band rendering.
///
/// Shared read-only across every tile rendered for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDescriptor {
    pub vmin: f64,
    pub vmax: f64,
    pub colormap: Option<Colormap>,
}

impl StyleDescriptor {
    pub fn new(vmin: f64, vmax: f64) -> Result<Self, RenderError> {
        if !vmin.is_finite() || !vmax.is_finite() {
            return Err(RenderError::InvalidStyle(format!(
                "value range must be finite, got [{}, {}]",
                vmin, vmax
            )));
        }
        if vmin >= vmax {
            return Err(RenderError::InvalidStyle(format!(
                "vmin ({}) must be less than vmax ({})",
                vmin, vmax
            )));
        }
        Ok(Self {
            vmin,
            vmax,
            colormap: None,
        })
    }

    pub fn with_colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = Some(colormap);
        self
    }

    /// Attach a colormap built from palette stops over this value range.
    pub fn with_palette(self, palette: &Palette, mode: PaletteMode) -> Result<Self, RenderError> {
        let colormap = Colormap::from_palette(palette, self.vmin, self.vmax, mode)?;
        Ok(self.with_colormap(colormap))
    }

    pub fn rescale(&self, value: f64) -> u8 {
        rescale_value(value, self.vmin, self.vmax)
    }
}
