//! Command-line interface.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{FileConfig, RunSettings, DEFAULT_ASSETS, DEFAULT_FPS};
use compositor::{Boundary, CompositeConfig};
use renderer::{ChannelOrder, RenderOptions};
use scene_catalog::StacConfig;
use videomap_common::TimeRange;

/// Cloud-free Sentinel-2 composite videos for web-map tiles.
#[derive(Parser, Debug, Clone)]
#[command(name = "videomap")]
#[command(about = "Generate cloud-free Sentinel-2 composite videos for a block of map tiles")]
pub struct Args {
    /// Directory to which output will be written; must exist
    #[arg(long)]
    pub dst: PathBuf,

    /// Longitude coordinate to select the central tile
    #[arg(long, allow_negative_numbers = true)]
    pub coordx: f64,

    /// Latitude coordinate to select the central tile
    #[arg(long, allow_negative_numbers = true)]
    pub coordy: f64,

    /// Zoom level of the target tiles
    #[arg(long)]
    pub zoom: u32,

    /// Start date in YYYY-MM-DD
    #[arg(long)]
    pub start: String,

    /// End date in YYYY-MM-DD (inclusive)
    #[arg(long)]
    pub end: String,

    /// How many tiles to include in X direction
    #[arg(long, default_value_t = 3)]
    pub width: u32,

    /// How many tiles to include in Y direction
    #[arg(long, default_value_t = 3)]
    pub height: u32,

    /// Compositing interval, e.g. 14D, 2W or 12H
    #[arg(long, env = "COMPOSITE_INTERVAL")]
    pub interval: Option<String>,

    /// Inclusive edge of each interval (left or right)
    #[arg(long, env = "COMPOSITE_BOUNDARY")]
    pub boundary: Option<Boundary>,

    /// Resolution multiplier; frames are 256 * 2^up pixels square
    #[arg(long, default_value_t = 0)]
    pub up: u32,

    /// Also write every frame as a PNG image
    #[arg(long)]
    pub images: bool,

    /// Keep the intermediate mp4 next to the webm
    #[arg(long)]
    pub keep_mp4: bool,

    /// Video frame rate
    #[arg(long, env = "VIDEOMAP_FPS")]
    pub fps: Option<u32>,

    /// Reflectance value rendered as full brightness
    #[arg(long, env = "VIDEOMAP_DISPLAY_SCALE")]
    pub display_scale: Option<f32>,

    /// Tiles processed at once
    #[arg(long, default_value_t = 4, env = "VIDEOMAP_CONCURRENCY")]
    pub concurrency: usize,

    /// STAC API root
    #[arg(long, env = "STAC_API_URL")]
    pub stac_url: Option<String>,

    /// STAC collection to search
    #[arg(long, env = "STAC_COLLECTION")]
    pub collection: Option<String>,

    /// Local mirror directory for remote asset hrefs
    #[arg(long, env = "VIDEOMAP_ASSET_ROOT")]
    pub asset_root: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// YAML file with composite, stac, render and stack sections
    #[arg(long, env = "VIDEOMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of runtime worker threads
    #[arg(long, env = "VIDEOMAP_WORKER_THREADS")]
    pub worker_threads: Option<usize>,
}

impl Args {
    /// Resolve the flags against the config file (if any) and defaults.
    pub fn into_settings(self) -> Result<RunSettings> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        self.resolve(file)
    }

    /// Merge flags over an already loaded config file.
    pub fn resolve(self, file: FileConfig) -> Result<RunSettings> {
        let range = TimeRange::from_dates(&self.start, &self.end)
            .with_context(|| format!("Invalid date range {} to {}", self.start, self.end))?;

        let mut composite = file.composite.unwrap_or_else(CompositeConfig::from_env);
        if let Some(interval) = self.interval {
            composite.interval = interval;
        }
        if let Some(boundary) = self.boundary {
            composite.boundary = boundary;
        }
        // every tile buckets from the same origin so frames line up
        composite.origin = Some(range.start);

        let mut stac = file.stac.unwrap_or_else(StacConfig::from_env);
        if let Some(url) = self.stac_url {
            stac.api_url = url;
        }
        if let Some(collection) = self.collection {
            stac.collection = collection;
        }

        let defaults = RenderOptions::default();
        let render = RenderOptions {
            display_scale: self
                .display_scale
                .or(file.render.display_scale)
                .unwrap_or(defaults.display_scale),
            clip_max: file.render.clip_max.unwrap_or(defaults.clip_max),
            channel_order: ChannelOrder::Bgr,
        };

        let settings = RunSettings {
            dst: self.dst,
            center: (self.coordx, self.coordy),
            zoom: self.zoom,
            range,
            width: self.width,
            height: self.height,
            up: self.up,
            images: self.images,
            keep_mp4: self.keep_mp4,
            concurrency: self.concurrency,
            fps: self.fps.or(file.render.fps).unwrap_or(DEFAULT_FPS),
            composite,
            stac,
            render,
            assets: file
                .stack
                .assets
                .unwrap_or_else(|| DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect()),
            resampling: file.stack.resampling.unwrap_or_default(),
            asset_root: self.asset_root.or(file.stack.asset_root),
        };

        settings.validate()?;
        Ok(settings)
    }
}
