//! Scene discovery and raster stacking for the videomap pipeline.
//!
//! - [`stac`] searches a STAC API for the scenes covering a tile and period.
//! - [`stack`] turns the returned scene records into a [`compositor::RasterCube`].

pub mod error;
pub mod stac;
pub mod stack;

pub use error::{CatalogError, Result};
pub use stac::{SceneRecord, StacConfig, StacSession};
pub use stack::{
    read_band, resample, warp, GeoTransform, RasterBand, RasterStacker, Resampling, StackRequest,
    TiffStacker,
};
