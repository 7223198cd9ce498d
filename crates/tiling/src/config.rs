//! Configuration for tiling runs and layers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use renderer::{Color, Colormap, FrameDelay, Palette, PaletteMode, StyleDescriptor};
use serde::{Deserialize, Serialize};
use tile_common::{BoundingBox, ZoomRange, DEFAULT_FRAME_WIDTH, MAX_ZOOM};

use crate::error::{Result, TilingError};
use crate::source::EngineKind;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: usize = 256;

/// Process-level settings shared by every layer in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TilingConfig {
    /// Tile edge length in pixels.
    pub tile_size: usize,

    /// Worker threads per dispatch. `None` uses rayon's default sizing.
    pub workers: Option<usize>,

    /// Display time of each animation frame.
    pub frame_delay: FrameDelay,

    /// Minimum digits in frame suffixes.
    pub min_frame_width: usize,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            workers: None,
            frame_delay: FrameDelay::default(),
            min_frame_width: DEFAULT_FRAME_WIDTH,
        }
    }
}

impl TilingConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TILE_SIZE") {
            if let Ok(size) = val.parse() {
                config.tile_size = size;
            }
        }

        if let Ok(val) = std::env::var("TILE_WORKERS") {
            if let Ok(workers) = val.parse() {
                config.workers = Some(workers);
            }
        }

        if let Ok(val) = std::env::var("TILE_FRAME_DELAY_NUM") {
            if let Ok(num) = val.parse() {
                config.frame_delay.numerator = num;
            }
        }

        if let Ok(val) = std::env::var("TILE_FRAME_DELAY_DEN") {
            if let Ok(den) = val.parse() {
                config.frame_delay.denominator = den;
            }
        }

        if let Ok(val) = std::env::var("TILE_FRAME_MIN_WIDTH") {
            if let Ok(width) = val.parse() {
                config.min_frame_width = width;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.tile_size == 0 {
            return Err("tile_size must be > 0".to_string());
        }

        if self.workers == Some(0) {
            return Err("workers must be > 0 when set".to_string());
        }

        if self.frame_delay.denominator == 0 {
            return Err("frame delay denominator must be > 0".to_string());
        }

        if self.min_frame_width == 0 {
            return Err("min_frame_width must be > 0".to_string());
        }

        Ok(())
    }
}

/// Everything the pipeline needs to know about one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Engine variant; names are checked while parsing.
    #[serde(default = "default_engine")]
    pub engine: EngineKind,

    #[serde(default)]
    pub min_zoom: u32,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: u32,

    #[serde(default)]
    pub vmin: f64,

    #[serde(default = "default_vmax")]
    pub vmax: f64,

    /// Data value to `#rrggbb` color.
    #[serde(default)]
    pub palette: Option<BTreeMap<i64, String>>,

    #[serde(default)]
    pub palette_mode: PaletteMode,

    /// Colors spread evenly over the value range.
    #[serde(default)]
    pub colors: Option<Vec<String>>,

    /// QGIS style file holding palette entries.
    #[serde(default)]
    pub qml: Option<PathBuf>,

    /// Name of the temporal dimension of animated sources.
    #[serde(default = "default_time_dimension")]
    pub time_dimension: String,

    /// Explicit extent to index, as `[west, south, east, north]`.
    /// Defaults to the source extent.
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
}

fn default_engine() -> EngineKind {
    EngineKind::ArrayBacked
}

fn default_max_zoom() -> u32 {
    12
}

fn default_vmax() -> f64 {
    30000.0
}

fn default_time_dimension() -> String {
    "time".to_string()
}

impl LayerConfig {
    /// Parse one layer from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        check_engines(&value)?;
        let config: Self = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.zoom_range()?;

        if !(self.vmin < self.vmax) {
            return Err(TilingError::configuration(format!(
                "vmin ({}) must be less than vmax ({})",
                self.vmin, self.vmax
            )));
        }

        let sources = [
            self.palette.is_some(),
            self.colors.is_some(),
            self.qml.is_some(),
        ];
        if sources.iter().filter(|s| **s).count() > 1 {
            return Err(TilingError::configuration(
                "set at most one of palette, colors and qml",
            ));
        }

        if let Some(colors) = &self.colors {
            if colors.len() < 2 {
                return Err(TilingError::configuration(
                    "colors needs at least two entries",
                ));
            }
        }

        if self.time_dimension.trim().is_empty() {
            return Err(TilingError::configuration("time_dimension must not be empty"));
        }

        Ok(())
    }

    pub fn zoom_range(&self) -> Result<ZoomRange> {
        if self.max_zoom > MAX_ZOOM {
            return Err(TilingError::configuration(format!(
                "max_zoom {} exceeds {}",
                self.max_zoom, MAX_ZOOM
            )));
        }
        ZoomRange::new(self.min_zoom, self.max_zoom)
            .map_err(|e| TilingError::configuration(e.to_string()))
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bbox.map(|[w, s, e, n]| BoundingBox::new(w, s, e, n))
    }

    /// Build the style shared by every tile of this layer.
    pub fn style(&self) -> Result<StyleDescriptor> {
        let style = StyleDescriptor::new(self.vmin, self.vmax)?;

        if let Some(palette) = &self.palette {
            let palette = Palette::from_hex_map(palette.iter().map(|(v, c)| (*v, c.as_str())))?;
            return Ok(style.with_palette(&palette, self.palette_mode)?);
        }

        if let Some(colors) = &self.colors {
            let colors = colors
                .iter()
                .map(|c| Color::from_hex(c))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(style.with_colormap(Colormap::linear_segmented(&colors)?));
        }

        if let Some(qml) = &self.qml {
            let xml = std::fs::read_to_string(qml)?;
            let palette = Palette::from_qml(&xml)?;
            return Ok(style.with_palette(&palette, self.palette_mode)?);
        }

        Ok(style)
    }
}

/// Reject unknown engine names anywhere in a document before typed
/// deserialization, so they surface as [`TilingError::UnsupportedEngine`].
fn check_engines(value: &serde_yaml::Value) -> Result<()> {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, val) in map {
                if key.as_str() == Some("engine") {
                    if let Some(name) = val.as_str() {
                        name.parse::<EngineKind>()?;
                    }
                }
                check_engines(val)?;
            }
            Ok(())
        }
        serde_yaml::Value::Sequence(items) => items.iter().try_for_each(check_engines),
        _ => Ok(()),
    }
}

/// Layers of one dataset, by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub description: Option<String>,
    pub layers: BTreeMap<String, LayerConfig>,
}

/// Every dataset known to a run, by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub datasets: BTreeMap<String, DatasetConfig>,
}

impl Catalog {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        check_engines(&value)?;
        let catalog: Self = serde_yaml::from_value(value)?;
        for (dataset, config) in &catalog.datasets {
            for (layer, layer_config) in &config.layers {
                layer_config.validate().map_err(|e| {
                    TilingError::configuration(format!("{}/{}: {}", dataset, layer, e))
                })?;
            }
        }
        Ok(catalog)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Look up a layer by dataset and layer name.
    pub fn layer(&self, dataset: &str, layer: &str) -> Result<&LayerConfig> {
        self.datasets
            .get(dataset)
            .ok_or_else(|| TilingError::configuration(format!("unknown dataset '{}'", dataset)))?
            .layers
            .get(layer)
            .ok_or_else(|| {
                TilingError::configuration(format!("unknown layer '{}' in dataset '{}'", layer, dataset))
            })
    }
}
