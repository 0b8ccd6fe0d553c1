//! videomap
//!
//! Generates cloud-free Sentinel-2 composite videos for a block of web-map
//! tiles and a GeoJSON manifest describing them.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use videomap::Args;

fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    if let Err(e) = run(args) {
        error!("videomap failed: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = fmt().with_env_filter(filter).with_target(true).with_level(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: Args) -> Result<()> {
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    let settings = args.into_settings()?;
    info!(dst = %settings.dst.display(), zoom = settings.zoom, "Starting videomap");

    let manifest = runtime.block_on(videomap::run(settings))?;
    info!(
        tiles = manifest.features.len(),
        frames = manifest.frames.len(),
        "Done"
    );
    Ok(())
}
