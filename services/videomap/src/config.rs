//! Run configuration.
//!
//! Settings are layered: built-in defaults and environment, then an optional
//! YAML file, then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use compositor::CompositeConfig;
use renderer::RenderOptions;
use scene_catalog::{Resampling, StacConfig};
use videomap_common::tile::{latlon_to_tile, tile_pixels, MAX_ZOOM};
use videomap_common::{TileCoord, TimeRange};

/// Asset names stacked by default, display bands first.
pub const DEFAULT_ASSETS: [&str; 4] = ["blue", "green", "red", "scl"];

pub const DEFAULT_FPS: u32 = 4;

/// Optional overrides loaded from a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub composite: Option<CompositeConfig>,
    pub stac: Option<StacConfig>,
    pub render: RenderSection,
    pub stack: StackSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    pub display_scale: Option<f32>,
    pub clip_max: Option<u8>,
    pub fps: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StackSection {
    pub assets: Option<Vec<String>>,
    pub resampling: Option<Resampling>,
    pub asset_root: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        debug!(?config, "Loaded config file");
        Ok(config)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub dst: PathBuf,
    /// Coordinate selecting the central tile, as (lon, lat).
    pub center: (f64, f64),
    pub zoom: u32,
    pub range: TimeRange,
    /// Tiles around the center, per axis.
    pub width: u32,
    pub height: u32,
    /// Resolution multiplier; videos are `256 * 2^up` pixels square.
    pub up: u32,
    pub images: bool,
    pub keep_mp4: bool,
    pub concurrency: usize,
    pub fps: u32,
    /// Origin is always the start of `range`.
    pub composite: CompositeConfig,
    pub stac: StacConfig,
    pub render: RenderOptions,
    pub assets: Vec<String>,
    pub resampling: Resampling,
    pub asset_root: Option<PathBuf>,
}

impl RunSettings {
    pub fn origin_tile(&self) -> Result<TileCoord> {
        latlon_to_tile(self.center.1, self.center.0, self.zoom)
            .with_context(|| format!("zoom {} is deeper than {}", self.zoom, MAX_ZOOM))
    }

    /// Edge length of every video frame in pixels.
    pub fn frame_size(&self) -> usize {
        tile_pixels(self.up) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dst.is_dir() {
            bail!(
                "Target folder {} does not exist, please create it before running",
                self.dst.display()
            );
        }
        if self.width == 0 || self.height == 0 {
            bail!("width and height must be at least 1 tile");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be positive");
        }
        if self.up > 4 {
            bail!("up must be at most 4, got {}", self.up);
        }
        if self.zoom.saturating_add(self.up) > MAX_ZOOM {
            bail!(
                "zoom + up must be at most {}, got {} + {}",
                MAX_ZOOM,
                self.zoom,
                self.up
            );
        }
        if self.fps == 0 {
            bail!("fps must be positive");
        }
        if !(-180.0..=180.0).contains(&self.center.0) || !(-90.0..=90.0).contains(&self.center.1) {
            bail!("coordinate ({}, {}) is out of range", self.center.0, self.center.1);
        }

        let classification = &self.composite.classification_band;
        if !self
            .assets
            .iter()
            .any(|a| a.eq_ignore_ascii_case(classification))
        {
            bail!("assets must include the classification band '{}'", classification);
        }
        let display = self
            .assets
            .iter()
            .filter(|a| !a.eq_ignore_ascii_case(classification))
            .count();
        if display < 3 {
            bail!("assets must include 3 display bands, found {}", display);
        }

        self.composite
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid composite config: {}", e))?;
        self.stac
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid STAC config: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = FileConfig::from_yaml("{}").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_yaml_sections() {
        let config = FileConfig::from_yaml(
            r#"
composite:
  interval: 7D
  boundary: left
  cloud_codes: [0, 3, 8, 9, 10, 11]
stac:
  collection: sentinel-2-c1-l2a
render:
  display_scale: 3000
  fps: 6
stack:
  assets: [B02, B03, B04, SCL]
  resampling: nearest
"#,
        )
        .unwrap();

        let composite = config.composite.unwrap();
        assert_eq!(composite.interval, "7D");
        assert_eq!(composite.cloud_codes.len(), 6);
        assert_eq!(composite.classification_band, "scl");
        let stac = config.stac.unwrap();
        assert_eq!(stac.collection, "sentinel-2-c1-l2a");
        assert_eq!(stac.page_limit, 100);
        assert_eq!(config.render.display_scale, Some(3000.0));
        assert_eq!(config.render.fps, Some(6));
        assert_eq!(config.stack.resampling, Some(Resampling::Nearest));
    }

    #[test]
    fn test_unknown_boundary_is_rejected() {
        assert!(FileConfig::from_yaml("composite:\n  boundary: middle\n").is_err());
    }
}
