//! End-to-end compositing of one tile's raster cube.

use chrono::Duration;
use tracing::{debug, instrument};

use crate::bucket::bucketize;
use crate::composite::{composite_bands, Frame};
use crate::config::CompositeConfig;
use crate::cube::RasterCube;
use crate::error::{CompositeError, Result};
use crate::mask::{build_mask, CloudSet};

/// Mask, bucket and composite a cube with one fixed configuration.
#[derive(Debug, Clone)]
pub struct CompositeEngine {
    config: CompositeConfig,
    interval: Duration,
    cloud_set: CloudSet,
}

impl CompositeEngine {
    pub fn new(config: CompositeConfig) -> Result<Self> {
        config.validate().map_err(CompositeError::config)?;
        Ok(Self {
            interval: config.interval_duration()?,
            cloud_set: config.cloud_set(),
            config,
        })
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    /// Produce the ordered frame sequence for a cube.
    #[instrument(skip(self, cube), fields(times = cube.shape().times, bands = cube.shape().bands))]
    pub fn run(&self, cube: &RasterCube) -> Result<Vec<Frame>> {
        let classification = cube.classification(&self.config.classification_band)?;
        let mask = build_mask(&classification, &self.cloud_set);

        let buckets = bucketize(
            cube.timestamps(),
            self.interval,
            self.config.origin,
            self.config.boundary,
        )?;

        let bands = self.composite_bands(cube);
        debug!(
            buckets = buckets.len(),
            masked = mask.masked_count(),
            "Prepared mask and buckets"
        );

        composite_bands(cube, &mask, &buckets, &bands)
    }

    /// Indices of the bands that go into the composite.
    fn composite_bands(&self, cube: &RasterCube) -> Vec<usize> {
        cube.band_names()
            .iter()
            .enumerate()
            .filter(|(_, name)| {
                !name.eq_ignore_ascii_case(&self.config.classification_band)
                    && !self
                        .config
                        .skip_bands
                        .iter()
                        .any(|skip| skip.eq_ignore_ascii_case(name))
            })
            .map(|(i, _)| i)
            .collect()
    }
}
