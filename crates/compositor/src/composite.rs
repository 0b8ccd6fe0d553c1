//! Cloud-masked median compositing with all-pixel fallback.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::debug;

use crate::bucket::Bucket;
use crate::cube::{RasterCube, NODATA};
use crate::error::{CompositeError, Result};
use crate::mask::CloudMask;

/// A (band, row, col) composite with explicitly missing samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub band_names: Vec<String>,
    pub height: usize,
    pub width: usize,
    /// Band-major, row-major samples; `None` where no observation was valid.
    pub data: Vec<Option<f32>>,
}

impl Composite {
    pub fn band_count(&self) -> usize {
        self.band_names.len()
    }

    /// One band as a row-major slice.
    pub fn band(&self, band: usize) -> &[Option<f32>] {
        let plane = self.height * self.width;
        &self.data[band * plane..(band + 1) * plane]
    }

    pub fn get(&self, band: usize, row: usize, col: usize) -> Option<f32> {
        if band >= self.band_count() || row >= self.height || col >= self.width {
            return None;
        }
        self.band(band)[row * self.width + col]
    }

    /// Share of samples that hold a value.
    pub fn coverage(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().filter(|v| v.is_some()).count() as f64 / self.data.len() as f64
    }
}

/// One composited bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the emitted frame sequence.
    pub index: usize,
    pub composite: Composite,
    /// Share of pixels with no clean observation in the bucket, 2 decimals.
    pub cloud_fraction: f64,
    /// Acquisition times that fed this frame, ascending.
    pub source_dates: Vec<DateTime<Utc>>,
    pub span_start: DateTime<Utc>,
    pub span_end: DateTime<Utc>,
}

/// Median of the values, averaging the two middle values for even counts.
///
/// Reorders `values` in place. Returns `None` for an empty slice.
pub fn median(values: &mut [u16]) -> Option<f32> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_unstable();
    if n % 2 == 1 {
        Some(values[n / 2] as f32)
    } else {
        Some((values[n / 2 - 1] as f32 + values[n / 2] as f32) / 2.0)
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Composite every band of the cube for each bucket.
pub fn composite(cube: &RasterCube, mask: &CloudMask, buckets: &[Bucket]) -> Result<Vec<Frame>> {
    let bands: Vec<usize> = (0..cube.shape().bands).collect();
    composite_bands(cube, mask, buckets, &bands)
}

/// Composite the selected bands for each bucket.
///
/// Buckets are processed in parallel; frames come back in bucket order.
/// Empty buckets are skipped.
pub fn composite_bands(
    cube: &RasterCube,
    mask: &CloudMask,
    buckets: &[Bucket],
    bands: &[usize],
) -> Result<Vec<Frame>> {
    let shape = cube.shape();

    let cube_dims = (shape.times, shape.height, shape.width);
    if mask.dims() != cube_dims {
        return Err(CompositeError::shape_mismatch(
            "cloud mask (times, height, width)",
            cube_dims,
            mask.dims(),
        ));
    }

    if let Some(&band) = bands.iter().find(|&&b| b >= shape.bands) {
        return Err(CompositeError::BandNotFound(format!("band index {}", band)));
    }

    for bucket in buckets {
        if let Some(&index) = bucket.indices.iter().find(|&&i| i >= shape.times) {
            return Err(CompositeError::BucketOutOfRange {
                index,
                times: shape.times,
            });
        }
    }

    let frames: Vec<Frame> = buckets
        .iter()
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .par_iter()
        .enumerate()
        .map(|(index, bucket)| composite_bucket(cube, mask, bucket, bands, index))
        .collect();

    debug!(
        frames = frames.len(),
        buckets = buckets.len(),
        bands = bands.len(),
        "Composited buckets"
    );

    Ok(frames)
}

/// Median composite of one bucket, clean observations first.
fn composite_bucket(
    cube: &RasterCube,
    mask: &CloudMask,
    bucket: &Bucket,
    bands: &[usize],
    index: usize,
) -> Frame {
    let shape = cube.shape();
    let plane = shape.plane_len();
    let steps = bucket.indices.len();

    let mut data = vec![None; bands.len() * plane];
    let mut clean: Vec<u16> = Vec::with_capacity(steps);
    let mut all: Vec<u16> = Vec::with_capacity(steps);

    for (out_band, &band) in bands.iter().enumerate() {
        let planes: Vec<(&[u16], &[bool])> = bucket
            .indices
            .iter()
            .map(|&t| (cube.plane(t, band), mask.plane(t)))
            .collect();

        let out = &mut data[out_band * plane..(out_band + 1) * plane];
        for (pixel, slot) in out.iter_mut().enumerate() {
            clean.clear();
            all.clear();
            for (values, masked) in &planes {
                let v = values[pixel];
                if v == NODATA {
                    continue;
                }
                all.push(v);
                if !masked[pixel] {
                    clean.push(v);
                }
            }
            *slot = median(&mut clean).or_else(|| median(&mut all));
        }
    }

    Frame {
        index,
        composite: Composite {
            band_names: bands
                .iter()
                .map(|&b| cube.band_names()[b].clone())
                .collect(),
            height: shape.height,
            width: shape.width,
            data,
        },
        cloud_fraction: cloud_fraction(mask, &bucket.indices),
        source_dates: bucket
            .indices
            .iter()
            .map(|&t| cube.timestamps()[t])
            .collect(),
        span_start: bucket.start,
        span_end: bucket.end,
    }
}

/// Share of pixels masked at every time step of the bucket, rounded.
fn cloud_fraction(mask: &CloudMask, indices: &[usize]) -> f64 {
    let (_, height, width) = mask.dims();
    let plane = height * width;
    if plane == 0 {
        return 0.0;
    }

    let mut has_clean = vec![false; plane];
    for &t in indices {
        for (seen, &masked) in has_clean.iter_mut().zip(mask.plane(t)) {
            *seen |= !masked;
        }
    }

    let cloudy = has_clean.iter().filter(|&&seen| !seen).count();
    round2(cloudy as f64 / plane as f64)
}
