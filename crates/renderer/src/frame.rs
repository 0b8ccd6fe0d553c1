//! Linear 8-bit rendering of composite frames.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RenderError, Result};
use compositor::Composite;

/// Byte order of the three channels in a rendered pixel.
///
/// Composites carry their display bands as blue, green, red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    /// Band order as stacked.
    #[default]
    Bgr,
    /// Band order reversed.
    Rgb,
}

impl ChannelOrder {
    /// Composite band feeding each output channel.
    fn bands(&self) -> [usize; 3] {
        match self {
            Self::Bgr => [0, 1, 2],
            Self::Rgb => [2, 1, 0],
        }
    }

    /// ffmpeg rawvideo pixel format name.
    pub fn pix_fmt(&self) -> &'static str {
        match self {
            Self::Bgr => "bgr24",
            Self::Rgb => "rgb24",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Sample value that maps to 255.
    pub display_scale: f32,
    pub clip_max: u8,
    pub channel_order: ChannelOrder,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            display_scale: 2000.0,
            clip_max: 255,
            channel_order: ChannelOrder::Bgr,
        }
    }
}

/// An interleaved 3-channel 8-bit image.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub width: usize,
    pub height: usize,
    pub order: ChannelOrder,
    /// Row-major pixels, 3 bytes each.
    pub data: Vec<u8>,
    /// Samples that exceeded `clip_max` before clipping.
    pub clipped: usize,
}

impl RenderedImage {
    /// Pixel bytes in RGB order.
    pub fn to_rgb(&self) -> Vec<u8> {
        match self.order {
            ChannelOrder::Rgb => self.data.clone(),
            ChannelOrder::Bgr => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
        }
    }

    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 3]> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let i = (row * self.width + col) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }
}

/// Render the first three bands of a composite to 8 bits.
///
/// Each sample becomes `v * 255 / display_scale`, clipped to
/// `[0, clip_max]` and truncated. Missing samples render black.
pub fn render(composite: &Composite, options: &RenderOptions) -> Result<RenderedImage> {
    if !(options.display_scale.is_finite() && options.display_scale > 0.0) {
        return Err(RenderError::InvalidOptions(format!(
            "display_scale must be positive, got {}",
            options.display_scale
        )));
    }
    if composite.band_count() < 3 {
        return Err(RenderError::MissingBands {
            found: composite.band_count(),
        });
    }

    let (width, height) = (composite.width, composite.height);
    let mut data = vec![0u8; width * height * 3];
    if data.is_empty() {
        return Ok(RenderedImage {
            width,
            height,
            order: options.channel_order,
            data,
            clipped: 0,
        });
    }

    let channels = options.channel_order.bands().map(|b| composite.band(b));
    let scale = options.display_scale;
    let clip_max = options.clip_max as f32;

    let clipped: usize = data
        .par_chunks_mut(width * 3)
        .enumerate()
        .map(|(row, out)| {
            let mut clipped = 0;
            for col in 0..width {
                let i = row * width + col;
                for (c, band) in channels.iter().enumerate() {
                    let scaled = band[i].map(|v| v * 255.0 / scale).unwrap_or(0.0);
                    if scaled > clip_max {
                        clipped += 1;
                    }
                    out[col * 3 + c] = scaled.clamp(0.0, clip_max) as u8;
                }
            }
            clipped
        })
        .sum();

    if clipped > 0 {
        warn!(
            clipped,
            display_scale = options.display_scale,
            "Clipped samples above display scale"
        );
    }
    debug!(width, height, order = ?options.channel_order, "Rendered frame");

    Ok(RenderedImage {
        width,
        height,
        order: options.channel_order,
        data,
        clipped,
    })
}
