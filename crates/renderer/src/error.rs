//! Error types for rendering and encoding.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Rendering or encoding parameters are out of range.
    #[error("invalid render options: {0}")]
    InvalidOptions(String),

    /// A composite needs three display bands.
    #[error("composite has {found} bands, at least 3 are required")]
    MissingBands { found: usize },

    /// Input does not match what the encoder was configured for.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The external encoder failed.
    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
