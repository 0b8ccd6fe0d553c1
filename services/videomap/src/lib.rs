//! Composite video generation for a block of web-map tiles.
//!
//! A run resolves the tiles around a coordinate, searches and stacks the
//! scenes of each tile, composites them into frames, encodes one video per
//! tile and finally writes a GeoJSON manifest describing every frame.

pub mod cli;
pub mod config;
pub mod manifest;
pub mod pipeline;

pub use cli::Args;
pub use config::{FileConfig, RunSettings};
pub use manifest::{Manifest, MANIFEST_FILE};
pub use pipeline::{run, run_with, TileOutput, TileWorker};
