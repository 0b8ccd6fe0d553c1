//! Per-frame provenance metadata and its cross-tile aggregate.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::composite::{round2, Frame};
use crate::error::{CompositeError, Result};
use videomap_common::time::date_label;
use videomap_common::TileCoord;

/// Provenance of one frame of one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub title: String,
    pub description: String,
    /// RFC 3339 acquisition times, ascending.
    pub dates: Vec<String>,
    pub cloud_percentage: f64,
    /// Bucket span the frame was composited over.
    pub span_start: DateTime<Utc>,
    pub span_end: DateTime<Utc>,
}

impl FrameMetadata {
    pub fn from_frame(frame: &Frame) -> Self {
        let dates: Vec<String> = frame
            .source_dates
            .iter()
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
            .collect();

        let first = frame.source_dates.first().map(date_label).unwrap_or_default();
        let last = frame.source_dates.last().map(date_label).unwrap_or_default();

        Self {
            title: last.clone(),
            description: describe(dates.len(), &first, &last),
            dates,
            cloud_percentage: frame.cloud_fraction,
            span_start: frame.span_start,
            span_end: frame.span_end,
        }
    }
}

/// The complete frame metadata sequence of one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFrames {
    pub tile: TileCoord,
    pub frames: Vec<FrameMetadata>,
}

impl TileFrames {
    pub fn from_frames(tile: TileCoord, frames: &[Frame]) -> Self {
        Self {
            tile,
            frames: frames.iter().map(FrameMetadata::from_frame).collect(),
        }
    }
}

/// One frame index summarised across every tile of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAggregate {
    pub title: String,
    pub description: String,
    /// Union of the tiles' source dates, sorted and deduplicated.
    pub frame_input_dates: Vec<String>,
    /// Mean of the tiles' cloud percentages, 2 decimals.
    pub frame_average_cloud_cover: f64,
}

/// Combine the k-th frame of every tile into the k-th aggregate.
///
/// All tiles must carry the same number of frames in the same temporal
/// order: frame k of every tile covers the same bucket span as frame k of the
/// first tile. Violations are reported against the first offending tile.
pub fn aggregate(tiles: &[TileFrames]) -> Result<Vec<FrameAggregate>> {
    let Some(first) = tiles.first() else {
        return Ok(Vec::new());
    };
    let expected = first.frames.len();

    if let Some(tile) = tiles.iter().find(|t| t.frames.len() != expected) {
        return Err(CompositeError::FrameCountMismatch {
            tile: tile.tile.to_string(),
            expected,
            found: tile.frames.len(),
        });
    }

    for tile in &tiles[1..] {
        let misaligned = tile
            .frames
            .iter()
            .zip(&first.frames)
            .position(|(frame, reference)| {
                frame.span_start != reference.span_start || frame.span_end != reference.span_end
            });
        if let Some(index) = misaligned {
            return Err(CompositeError::FrameMisaligned {
                tile: tile.tile.to_string(),
                index,
                expected: span_label(&first.frames[index]),
                found: span_label(&tile.frames[index]),
            });
        }
    }

    let aggregates: Vec<FrameAggregate> = (0..expected)
        .map(|k| {
            let dates: BTreeSet<&str> = tiles
                .iter()
                .flat_map(|t| t.frames[k].dates.iter().map(String::as_str))
                .collect();
            let dates: Vec<String> = dates.into_iter().map(str::to_string).collect();

            let mean = tiles
                .iter()
                .map(|t| t.frames[k].cloud_percentage)
                .sum::<f64>()
                / tiles.len() as f64;

            let first = dates.first().map(|d| day_prefix(d)).unwrap_or_default();
            let last = dates.last().map(|d| day_prefix(d)).unwrap_or_default();
            let title = last.to_string();
            let description = describe(dates.len(), first, last);

            FrameAggregate {
                title,
                description,
                frame_input_dates: dates,
                frame_average_cloud_cover: round2(mean),
            }
        })
        .collect();

    debug!(
        tiles = tiles.len(),
        frames = aggregates.len(),
        "Aggregated frame metadata"
    );

    Ok(aggregates)
}

fn describe(count: usize, first: &str, last: &str) -> String {
    format!(
        "Sentinel-2 composite of {} images between {} and {}.",
        count, first, last
    )
}

fn span_label(frame: &FrameMetadata) -> String {
    format!("{}/{}", date_label(&frame.span_start), date_label(&frame.span_end))
}

/// `YYYY-MM-DD` part of a timestamp string.
fn day_prefix(date: &str) -> &str {
    date.get(..10).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn meta(dates: &[&str], cloud: f64) -> FrameMetadata {
        let start = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        FrameMetadata {
            title: String::new(),
            description: String::new(),
            dates: dates.iter().map(|d| d.to_string()).collect(),
            cloud_percentage: cloud,
            span_start: start,
            span_end: start + chrono::Duration::days(14),
        }
    }

    #[test]
    fn test_single_tile_passthrough() {
        let tiles = vec![TileFrames {
            tile: TileCoord::new(1, 0, 0),
            frames: vec![meta(&["2022-01-02T00:00:00Z"], 0.25)],
        }];

        let agg = aggregate(&tiles).unwrap();
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].frame_input_dates, vec!["2022-01-02T00:00:00Z"]);
        assert_eq!(agg[0].frame_average_cloud_cover, 0.25);
        assert_eq!(agg[0].title, "2022-01-02");
    }

    #[test]
    fn test_no_tiles() {
        assert!(aggregate(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_mean_is_rounded() {
        let tiles: Vec<TileFrames> = [0.1, 0.2, 0.2]
            .iter()
            .enumerate()
            .map(|(i, &c)| TileFrames {
                tile: TileCoord::new(2, i as u32, 0),
                frames: vec![meta(&["2022-01-01"], c)],
            })
            .collect();

        let agg = aggregate(&tiles).unwrap();
        assert_eq!(agg[0].frame_average_cloud_cover, 0.17);
    }
}
