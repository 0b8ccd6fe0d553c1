//! Error types for scene search and stacking.

use std::path::PathBuf;

use compositor::CompositeError;
use thiserror::Error;

/// Errors that can occur while finding or loading scenes.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("catalog returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The catalog response could not be understood.
    #[error("invalid catalog response: {0}")]
    Parse(String),

    /// The search matched nothing.
    #[error("no scenes found for bbox {bbox:?} and datetime {datetime}")]
    NoScenes { bbox: [f64; 4], datetime: String },

    /// A scene does not carry a requested asset.
    #[error("scene {scene} has no asset '{asset}'")]
    AssetMissing { scene: String, asset: String },

    /// An asset href cannot be mapped to a local file.
    #[error("cannot resolve asset href {0}")]
    UnresolvableAsset(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The GeoTIFF could not be decoded.
    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Only single-band 8 and 16 bit rasters are supported.
    #[error("unsupported sample format in {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// A georeferenced asset is not in the output grid's CRS.
    #[error("{path} is in EPSG:{found}, expected EPSG:{expected}")]
    CrsMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The stacked samples do not form a valid cube.
    #[error(transparent)]
    Cube(#[from] CompositeError),
}

impl CatalogError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
