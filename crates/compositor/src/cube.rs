//! Raster cube and classification band types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CompositeError, Result};

/// Sample value the stacker writes where a scene has no data.
pub const NODATA: u16 = 0;

/// Axis lengths of a raster cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeShape {
    pub times: usize,
    pub bands: usize,
    pub height: usize,
    pub width: usize,
}

impl CubeShape {
    /// Number of samples in one (row, col) plane.
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.times * self.bands * self.plane_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A (time, band, row, col) stack of unsigned samples on a common grid.
///
/// Samples are stored time-major, then band, then row-major pixels. The cube
/// is immutable once built.
#[derive(Debug, Clone)]
pub struct RasterCube {
    shape: CubeShape,
    timestamps: Vec<DateTime<Utc>>,
    band_names: Vec<String>,
    data: Vec<u16>,
}

impl RasterCube {
    /// Create a cube, checking that every axis agrees with the sample buffer.
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        band_names: Vec<String>,
        height: usize,
        width: usize,
        data: Vec<u16>,
    ) -> Result<Self> {
        let shape = CubeShape {
            times: timestamps.len(),
            bands: band_names.len(),
            height,
            width,
        };

        if data.len() != shape.len() {
            return Err(CompositeError::shape_mismatch(
                "cube samples",
                shape.len(),
                data.len(),
            ));
        }

        Ok(Self {
            shape,
            timestamps,
            band_names,
            data,
        })
    }

    pub fn shape(&self) -> CubeShape {
        self.shape
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    /// Position of a band by name (case-insensitive).
    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.band_names
            .iter()
            .position(|b| b.eq_ignore_ascii_case(name))
    }

    /// One band of one time step, row-major.
    pub fn plane(&self, time: usize, band: usize) -> &[u16] {
        let plane = self.shape.plane_len();
        let start = (time * self.shape.bands + band) * plane;
        &self.data[start..start + plane]
    }

    /// Single sample lookup.
    pub fn get(&self, time: usize, band: usize, row: usize, col: usize) -> Option<u16> {
        if time >= self.shape.times
            || band >= self.shape.bands
            || row >= self.shape.height
            || col >= self.shape.width
        {
            return None;
        }
        Some(self.plane(time, band)[row * self.shape.width + col])
    }

    /// Extract a band as classification codes.
    ///
    /// Values above 255 are rejected rather than narrowed.
    pub fn classification(&self, band_name: &str) -> Result<ClassificationBand> {
        let band = self
            .band_index(band_name)
            .ok_or_else(|| CompositeError::BandNotFound(band_name.to_string()))?;

        let mut codes = Vec::with_capacity(self.shape.times * self.shape.plane_len());
        for t in 0..self.shape.times {
            for &value in self.plane(t, band) {
                let code = u8::try_from(value)
                    .map_err(|_| CompositeError::InvalidClassCode { value, time: t })?;
                codes.push(code);
            }
        }

        ClassificationBand::new(self.shape.times, self.shape.height, self.shape.width, codes)
    }
}

/// Per-pixel discrete category codes over (time, row, col).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationBand {
    times: usize,
    height: usize,
    width: usize,
    codes: Vec<u8>,
}

impl ClassificationBand {
    pub fn new(times: usize, height: usize, width: usize, codes: Vec<u8>) -> Result<Self> {
        let expected = times * height * width;
        if codes.len() != expected {
            return Err(CompositeError::shape_mismatch(
                "classification codes",
                expected,
                codes.len(),
            ));
        }
        Ok(Self {
            times,
            height,
            width,
            codes,
        })
    }

    /// (times, height, width)
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.times, self.height, self.width)
    }

    pub fn codes(&self) -> &[u8] {
        &self.codes
    }

    pub fn get(&self, time: usize, row: usize, col: usize) -> Option<u8> {
        if time >= self.times || row >= self.height || col >= self.width {
            return None;
        }
        Some(self.codes[(time * self.height + row) * self.width + col])
    }
}
