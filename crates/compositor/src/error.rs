//! Error types for compositing.

use thiserror::Error;

/// Errors raised when inputs violate the compositing contract.
///
/// Per-pixel data gaps are not errors; they surface as missing samples.
#[derive(Error, Debug)]
pub enum CompositeError {
    /// Two inputs that must share axes do not.
    #[error("shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },

    /// A named band is not present in the cube.
    #[error("band not found: {0}")]
    BandNotFound(String),

    /// Observation timestamps must be strictly increasing.
    #[error("timestamps are not strictly increasing at index {index}")]
    NotIncreasing { index: usize },

    /// The bucketing interval is zero, negative or too large.
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// A bucket references a time step the cube does not have.
    #[error("bucket references time step {index} but cube has {times}")]
    BucketOutOfRange { index: usize, times: usize },

    /// Tiles produced different numbers of frames.
    #[error("tile {tile} has {found} frames, expected {expected}")]
    FrameCountMismatch {
        tile: String,
        expected: usize,
        found: usize,
    },

    /// Frame `index` of a tile covers a different span than the first tile's.
    #[error("tile {tile} frame {index} covers {found}, expected {expected}")]
    FrameMisaligned {
        tile: String,
        index: usize,
        expected: String,
        found: String,
    },

    /// A classification sample does not fit a class code.
    #[error("classification value {value} at time step {time} is not a valid class code")]
    InvalidClassCode { value: u16, time: usize },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl CompositeError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(
        what: impl Into<String>,
        expected: impl std::fmt::Debug,
        found: impl std::fmt::Debug,
    ) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        }
    }

    /// Create an InvalidInterval error.
    pub fn invalid_interval(msg: impl Into<String>) -> Self {
        Self::InvalidInterval(msg.into())
    }

    /// Create a ConfigError.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<videomap_common::TimeParseError> for CompositeError {
    fn from(err: videomap_common::TimeParseError) -> Self {
        Self::InvalidInterval(err.to_string())
    }
}

/// Result type for compositing operations.
pub type Result<T> = std::result::Result<T, CompositeError>;
