//! Subcommand implementations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tile_common::BoundingBox;
use tiling::{
    read_geotiff, zonal_means, Catalog, EngineKind, FrameSource, LayerConfig, PipelineInput,
    PipelineReport, RasterArray, RasterSource, TemporalAggregation, TilingConfig, TilingPipeline,
    ZoneMask,
};
use tracing::{info, warn};

use crate::{TileArgs, ZonalArgs};

/// Serialized form of a finished run.
#[derive(Debug, Serialize)]
struct RunSummary {
    dataset: String,
    layer: String,
    tiles: usize,
    frames: Vec<FrameSummary>,
    artifacts: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FrameSummary {
    written: usize,
    out_of_bounds: usize,
    failures: Vec<String>,
}

impl RunSummary {
    fn new(args: &TileArgs, report: &PipelineReport) -> Self {
        Self {
            dataset: args.dataset.clone(),
            layer: args.layer.clone(),
            tiles: report.tiles.len(),
            frames: report
                .frames
                .iter()
                .map(|f| FrameSummary {
                    written: f.written.len(),
                    out_of_bounds: f.out_of_bounds,
                    failures: f
                        .failures
                        .iter()
                        .map(|failure| format!("{}: {}", failure.coord, failure.error))
                        .collect(),
                })
                .collect(),
            artifacts: report.artifacts.iter().map(|a| a.path.clone()).collect(),
        }
    }
}

pub fn tile(args: &TileArgs) -> Result<()> {
    let catalog = Catalog::from_file(&args.config)
        .with_context(|| format!("loading catalog {}", args.config.display()))?;
    let layer = catalog.layer(&args.dataset, &args.layer)?;

    let mut config = TilingConfig::from_env();
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let bbox = match &args.bbox {
        Some(csv) => Some(BoundingBox::from_csv(csv)?),
        None => layer.bounding_box(),
    };

    info!(
        dataset = %args.dataset,
        layer = %args.layer,
        engine = %layer.engine,
        source = %args.source.display(),
        output = %args.output.display(),
        "Tiling layer"
    );

    let input = pipeline_input(args, layer)?;
    let mut pipeline = TilingPipeline::new(config, layer.style()?, layer.zoom_range()?, &args.output)?;
    let report = pipeline.run(input, bbox)?;

    let failed = report.failed_tiles();
    if failed > 0 {
        warn!(failed, "Some tiles failed");
    }
    info!(
        tiles = report.tiles.len(),
        frames = report.frames.len(),
        artifacts = report.artifacts.len(),
        "Layer complete"
    );

    if let Some(path) = &args.report {
        let summary = RunSummary::new(args, &report);
        fs::write(path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing report {}", path.display()))?;
    }
    Ok(())
}

/// Pick the pipeline input from the source path and the layer's engine.
fn pipeline_input(args: &TileArgs, layer: &LayerConfig) -> Result<PipelineInput> {
    let preprocessing = args.from.is_some() || args.to.is_some() || args.monthly.is_some();

    if args.source.is_dir() {
        let frames = FrameSource::yearly_dir(&args.source)?;
        return match layer.engine {
            EngineKind::FileBacked if preprocessing => {
                bail!("--from/--to/--monthly need an array engine layer")
            }
            EngineKind::FileBacked => Ok(PipelineInput::Animated(frames)),
            EngineKind::ArrayBacked => {
                let array = frames.load_array(&layer.time_dimension)?;
                let array = preprocess(array, args)?;
                Ok(PipelineInput::Animated(FrameSource::Array(Arc::new(array))))
            }
        };
    }

    if preprocessing {
        bail!("--from/--to/--monthly need a directory of yearly files");
    }
    let source = match layer.engine {
        EngineKind::FileBacked => RasterSource::File(args.source.clone()),
        EngineKind::ArrayBacked => RasterSource::from(read_geotiff(&args.source)?),
    };
    Ok(PipelineInput::Static {
        kind: layer.engine,
        source,
    })
}

fn preprocess(mut array: RasterArray, args: &TileArgs) -> Result<RasterArray> {
    if args.from.is_some() || args.to.is_some() {
        let start = match &args.from {
            Some(s) => parse_date(s, false)?,
            None => NaiveDateTime::MIN,
        };
        let end = match &args.to {
            Some(s) => parse_date(s, true)?,
            None => NaiveDateTime::MAX,
        };
        array = array.select_time(start, end)?;
    }

    if let Some(name) = &args.monthly {
        let aggregation = match name.to_lowercase().as_str() {
            "mean" => TemporalAggregation::Mean,
            "sum" => TemporalAggregation::Sum,
            other => bail!("unknown monthly aggregation '{}' (expected mean or sum)", other),
        };
        array = array.group_by_month(aggregation)?;
    }

    info!(timesteps = array.time_len(), "Preprocessed time series");
    Ok(array)
}

/// `YYYY-MM-DD` at the start of the day, or its last second for range ends.
fn parse_date(s: &str, end_of_day: bool) -> Result<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("'{}' is not a YYYY-MM-DD date", s))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.with_context(|| format!("invalid time for {}", s))
}

pub fn zonal(args: &ZonalArgs) -> Result<()> {
    let array = load_values(&args.source, &args.time_dimension)?;
    let zones = read_geotiff(&args.zones)
        .with_context(|| format!("reading zones {}", args.zones.display()))?;

    let labels = zones
        .plane(0, 0)
        .iter()
        .map(|&v| {
            if zones.is_valid(v) && v >= 0.0 {
                Some(v as u32)
            } else {
                None
            }
        })
        .collect();
    let mask = ZoneMask::from_labels(zones.height(), zones.width(), labels)?;

    let series = zonal_means(&array, &mask, args.band, &args.unit)?;
    info!(zones = series.len(), "Zonal statistics complete");
    println!("{}", serde_json::to_string_pretty(&series)?);
    Ok(())
}

fn load_values(source: &Path, dimension: &str) -> Result<RasterArray> {
    if source.is_dir() {
        Ok(FrameSource::yearly_dir(source)?.load_array(dimension)?)
    } else {
        Ok(read_geotiff(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let start = parse_date("2020-03-01", false).unwrap();
        assert_eq!(start.to_string(), "2020-03-01 00:00:00");
        let end = parse_date("2020-03-31", true).unwrap();
        assert_eq!(end.to_string(), "2020-03-31 23:59:59");
        assert!(parse_date("03/01/2020", false).is_err());
    }
}
