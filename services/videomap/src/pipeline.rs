//! Per-tile processing and the run that ties the tiles together.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, instrument};

use compositor::{aggregate, Boundary, CompositeEngine, Frame, TileFrames};
use renderer::png::write_png;
use renderer::{is_ffmpeg_on_path, render, transcode, EncodeConfig, FfmpegEncoder, RenderedImage};
use scene_catalog::{RasterStacker, SceneRecord, StacSession, StackRequest, TiffStacker};
use videomap_common::tile::{neighborhood, EPSG};
use videomap_common::time::date_label;
use videomap_common::TileCoord;

use crate::config::RunSettings;
use crate::manifest::{still_file_name, video_file_name, Manifest};

/// Everything one tile produced.
#[derive(Debug, Clone)]
pub struct TileOutput {
    pub frames: TileFrames,
    pub video: PathBuf,
    pub stills: Vec<PathBuf>,
}

/// Stacks, composites, renders and encodes single tiles.
///
/// Shared read-only between tile tasks.
pub struct TileWorker {
    settings: RunSettings,
    engine: CompositeEngine,
    stacker: Box<dyn RasterStacker>,
}

impl TileWorker {
    pub fn new(settings: RunSettings, stacker: Box<dyn RasterStacker>) -> Result<Self> {
        let engine =
            CompositeEngine::new(settings.composite.clone()).context("Invalid composite config")?;
        Ok(Self {
            settings,
            engine,
            stacker,
        })
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Output grid of a tile: its Web Mercator extent at the video size.
    pub fn stack_request(&self, tile: &TileCoord) -> StackRequest {
        let size = self.settings.frame_size();
        StackRequest {
            bounds: tile.xy_bounds(),
            epsg: EPSG,
            assets: self.settings.assets.clone(),
            width: size,
            height: size,
            resampling: self.settings.resampling,
        }
    }

    /// Stack the scenes of a tile and composite them into frames.
    pub fn composite(&self, tile: &TileCoord, scenes: &[SceneRecord]) -> Result<Vec<Frame>> {
        let cube = self
            .stacker
            .stack(scenes, &self.stack_request(tile))
            .with_context(|| format!("Failed to stack scenes for tile {}", tile))?;

        let frames = self
            .engine
            .run(&cube)
            .with_context(|| format!("Failed to composite tile {}", tile))?;
        if frames.is_empty() {
            bail!("tile {} produced no frames", tile);
        }
        debug!(tile = %tile, frames = frames.len(), "Composited frames");
        Ok(frames)
    }

    /// Render every frame to a PNG still in the destination folder.
    pub fn write_stills(&self, tile: &TileCoord, frames: &[Frame]) -> Result<Vec<PathBuf>> {
        frames
            .iter()
            .map(|frame| {
                let image = render(&frame.composite, &self.settings.render)?;
                self.write_still(tile, frame, &image)
            })
            .collect()
    }

    fn write_still(&self, tile: &TileCoord, frame: &Frame, image: &RenderedImage) -> Result<PathBuf> {
        let label = frame_label(frame, self.settings.composite.boundary);
        let path = self.settings.dst.join(still_file_name(tile, &label));
        write_png(&path, image)?;
        Ok(path)
    }

    /// Stack, composite, render and encode one tile.
    pub fn build(&self, tile: TileCoord, scenes: &[SceneRecord]) -> Result<TileOutput> {
        let settings = &self.settings;
        let size = settings.frame_size();
        let frames = self.composite(&tile, scenes)?;

        let mp4 = settings.dst.join(video_file_name(&tile, "mp4"));
        let webm = settings.dst.join(video_file_name(&tile, "webm"));

        let config = EncodeConfig {
            channel_order: settings.render.channel_order,
            ..EncodeConfig::mp4(&mp4, size, size, settings.fps)
        };
        let mut encoder = FfmpegEncoder::new(config)?;
        let mut stills = Vec::new();

        for frame in &frames {
            let image = render(&frame.composite, &settings.render)?;
            encoder.encode_frame(&image)?;

            if settings.images {
                stills.push(self.write_still(&tile, frame, &image)?);
            }
        }
        encoder.finish()?;

        transcode(&mp4, &webm)?;
        if !settings.keep_mp4 {
            std::fs::remove_file(&mp4)
                .with_context(|| format!("Failed to remove {}", mp4.display()))?;
        }

        info!(tile = %tile, frames = frames.len(), video = %webm.display(), "Tile complete");

        Ok(TileOutput {
            frames: TileFrames::from_frames(tile, &frames),
            video: webm,
            stills,
        })
    }
}

/// Produce the videos and manifest for every tile of the run.
pub async fn run(settings: RunSettings) -> Result<Manifest> {
    let session = StacSession::open(settings.stac.clone()).context("Failed to open STAC session")?;
    let stacker = TiffStacker::new(settings.asset_root.clone());
    let worker = TileWorker::new(settings, Box::new(stacker))?;
    run_with(&session, worker).await
}

/// Run every tile of the neighborhood through `worker`, searching `session`.
pub async fn run_with(session: &StacSession, worker: TileWorker) -> Result<Manifest> {
    let started = Instant::now();
    let settings = worker.settings();
    let origin = settings.origin_tile()?;
    let tiles = neighborhood(&origin, settings.width, settings.height);

    info!(
        origin = %origin,
        tiles = tiles.len(),
        start = %settings.range.start,
        end = %settings.range.end,
        interval = %settings.composite.interval,
        "Collecting videos"
    );

    if !is_ffmpeg_on_path() {
        bail!("ffmpeg is required for video encoding, but was not found on PATH");
    }

    let concurrency = settings.concurrency;
    let worker = Arc::new(worker);

    let outputs: Vec<TileOutput> = stream::iter(tiles)
        .map(|tile| process_tile(tile, session, worker.clone()))
        .buffered(concurrency)
        .try_collect()
        .await?;

    let tile_frames: Vec<TileFrames> = outputs.iter().map(|o| o.frames.clone()).collect();
    let frames = aggregate(&tile_frames).context("Tiles produced diverging frame sequences")?;

    let manifest = Manifest::build(&origin, &tile_frames, frames)?;
    manifest.write(&worker.settings().dst)?;

    info!(
        tiles = outputs.len(),
        frames = manifest.frames.len(),
        elapsed_secs = started.elapsed().as_secs_f64(),
        "Run complete"
    );
    Ok(manifest)
}

#[instrument(skip(tile, session, worker), fields(tile = %tile))]
async fn process_tile(
    tile: TileCoord,
    session: &StacSession,
    worker: Arc<TileWorker>,
) -> Result<TileOutput> {
    let scenes = session
        .search(&tile.bounds(), &worker.settings().range)
        .await
        .with_context(|| format!("Scene search failed for tile {}", tile))?;
    info!(scenes = scenes.len(), "Found scenes");

    tokio::task::spawn_blocking(move || worker.build(tile, &scenes))
        .await
        .with_context(|| format!("Worker for tile {} panicked", tile))?
}

/// Date of the inclusive edge of a frame's bucket.
pub fn frame_label(frame: &Frame, boundary: Boundary) -> String {
    match boundary {
        Boundary::Left => date_label(&frame.span_start),
        Boundary::Right => date_label(&frame.span_end),
    }
}
