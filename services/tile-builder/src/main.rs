//! Batch tile pyramid builder.
//!
//! Looks up a layer in a YAML catalog, opens a GeoTIFF (static layer) or a
//! directory of yearly GeoTIFFs (animated layer) and writes the tile tree.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tile-builder")]
#[command(about = "Build mercator PNG tile pyramids from raster layers")]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tile one layer
    Tile(TileArgs),
    /// Per-zone mean time series as JSON
    Zonal(ZonalArgs),
}

#[derive(clap::Args, Debug)]
pub struct TileArgs {
    /// Layer catalog
    #[arg(short, long, default_value = "catalog.yaml")]
    pub config: PathBuf,

    #[arg(short, long)]
    pub dataset: String,

    #[arg(short, long)]
    pub layer: String,

    /// GeoTIFF file, or directory of `*YYYY.tif` files for an animated layer
    #[arg(short, long)]
    pub source: PathBuf,

    /// Root of the tile tree
    #[arg(short, long)]
    pub output: PathBuf,

    /// Override the indexed extent: west,south,east,north
    #[arg(long)]
    pub bbox: Option<String>,

    /// Worker threads (default: TILE_WORKERS or one per core)
    #[arg(long, env = "TILE_WORKERS")]
    pub workers: Option<usize>,

    /// First date to keep (YYYY-MM-DD), array layers only
    #[arg(long)]
    pub from: Option<String>,

    /// Last date to keep (YYYY-MM-DD), array layers only
    #[arg(long)]
    pub to: Option<String>,

    /// Collapse timesteps to monthly values: mean or sum
    #[arg(long)]
    pub monthly: Option<String>,

    /// Write a JSON run summary here
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ZonalArgs {
    /// GeoTIFF file, or directory of `*YYYY.tif` files
    #[arg(short, long)]
    pub source: PathBuf,

    /// Single-band GeoTIFF of integer zone ids on the source grid
    #[arg(short, long)]
    pub zones: PathBuf,

    /// Unit of the values, reported as the y-axis unit
    #[arg(short, long, default_value = "")]
    pub unit: String,

    #[arg(long, default_value_t = 0)]
    pub band: usize,

    /// Name of the temporal dimension
    #[arg(long, default_value = "time")]
    pub time_dimension: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting tile builder");

    match args.command {
        Command::Tile(tile) => commands::tile(&tile),
        Command::Zonal(zonal) => commands::zonal(&zonal),
    }
}
