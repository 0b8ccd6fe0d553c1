//! GeoJSON manifest describing the videos of a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use compositor::{FrameAggregate, TileFrames};
use videomap_common::tile::{tile_center, tile_feature};
use videomap_common::{TileCoord, TileFeature};

pub const MANIFEST_FILE: &str = "videos.geojson";

/// Video file name of a tile, without directory.
pub fn video_file_name(tile: &TileCoord, extension: &str) -> String {
    format!("videomap-{}.{}", tile.file_key(), extension)
}

/// Still image file name of one frame of a tile.
pub fn still_file_name(tile: &TileCoord, date: &str) -> String {
    format!("videomap-{}-{}.png", tile.file_key(), date)
}

/// FeatureCollection of tile outlines with per-frame summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "type")]
    pub type_: String,
    pub name: String,
    pub base_url: String,
    /// Center of the origin tile as (lon, lat).
    pub center: [f64; 2],
    pub zoom: u32,
    /// Frame index to aggregate, keyed `"0"`, `"1"`, ...
    #[serde(serialize_with = "frames_as_map", deserialize_with = "frames_from_map")]
    pub frames: Vec<FrameAggregate>,
    pub features: Vec<TileFeature>,
}

impl Manifest {
    /// Assemble the manifest for `tiles` around `origin`.
    pub fn build(origin: &TileCoord, tiles: &[TileFrames], frames: Vec<FrameAggregate>) -> Result<Self> {
        let features = tiles
            .iter()
            .map(|t| {
                let metadata = serde_json::to_value(&t.frames)
                    .context("Failed to serialize frame metadata")?;
                Ok(tile_feature(&t.tile)
                    .with_property("url", video_file_name(&t.tile, "webm"))
                    .with_property("metadata", metadata))
            })
            .collect::<Result<Vec<_>>>()?;

        let (lon, lat) = tile_center(origin);
        Ok(Self {
            type_: "FeatureCollection".to_string(),
            name: "Videomap".to_string(),
            base_url: "videos/".to_string(),
            center: [lon, lat],
            zoom: origin.z,
            frames,
            features,
        })
    }

    /// Write `videos.geojson` into `dir`, returning its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string(self).context("Failed to serialize manifest")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
        info!(
            path = %path.display(),
            tiles = self.features.len(),
            frames = self.frames.len(),
            "Wrote manifest"
        );
        Ok(path)
    }
}

fn frames_as_map<S: Serializer>(frames: &[FrameAggregate], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(frames.iter().enumerate().map(|(i, f)| (i.to_string(), f)))
}

fn frames_from_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FrameAggregate>, D::Error> {
    let map = BTreeMap::<String, FrameAggregate>::deserialize(deserializer)?;
    let mut indexed = map
        .into_iter()
        .map(|(k, v)| {
            k.parse::<usize>()
                .map(|i| (i, v))
                .map_err(|_| serde::de::Error::custom(format!("frame key '{}' is not an index", k)))
        })
        .collect::<Result<Vec<_>, D::Error>>()?;
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
