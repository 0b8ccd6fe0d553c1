//! Temporal cloud-masked compositing of satellite raster cubes.
//!
//! Turns a (time, band, row, col) stack of observations plus a per-pixel
//! scene classification band into one gap-filled median composite per time
//! bucket, with per-frame cloud statistics.
//!
//! # Architecture
//!
//! ```text
//! RasterCube ──► classification band ──► build_mask ──► CloudMask
//!      │                                                    │
//!      └──► timestamps ──► bucketize ──► [Bucket] ──────────┤
//!                                                           ▼
//!                                   composite (parallel per bucket)
//!                                                           │
//!                                                           ▼
//!                                  [Frame] ──► FrameMetadata ──► aggregate
//! ```
//!
//! # Example
//!
//! ```ignore
//! use compositor::{CompositeConfig, CompositeEngine};
//!
//! let engine = CompositeEngine::new(CompositeConfig::default())?;
//! let frames = engine.run(&cube)?;
//! for frame in &frames {
//!     println!("{} dates, {:.2} cloudy", frame.source_dates.len(), frame.cloud_fraction);
//! }
//! ```

pub mod bucket;
pub mod composite;
pub mod config;
pub mod cube;
pub mod engine;
pub mod error;
pub mod mask;
pub mod metadata;

// Re-export commonly used types at crate root
pub use bucket::{bucketize, Boundary, Bucket};
pub use composite::{composite, composite_bands, median, Composite, Frame};
pub use config::CompositeConfig;
pub use cube::{ClassificationBand, CubeShape, RasterCube, NODATA};
pub use engine::CompositeEngine;
pub use error::{CompositeError, Result};
pub use mask::{build_mask, CloudMask, CloudSet, SCL_CLOUDY_OR_NODATA};
pub use metadata::{aggregate, FrameAggregate, FrameMetadata, TileFrames};
