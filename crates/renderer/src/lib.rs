//! Turning composites into viewable output.
//!
//! - [`frame`]: linear 8-bit rendering of a composite's display bands
//! - [`png`]: RGB PNG stills
//! - [`video`]: raw frames piped through `ffmpeg`, plus container conversion

pub mod error;
pub mod frame;
pub mod png;
pub mod video;

pub use error::{RenderError, Result};
pub use frame::{render, ChannelOrder, RenderOptions, RenderedImage};
pub use video::{is_ffmpeg_on_path, transcode, EncodeConfig, FfmpegEncoder};
