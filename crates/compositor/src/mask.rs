//! Cloud-or-no-data masks derived from scene classification codes.

use crate::cube::ClassificationBand;

/// Sentinel-2 L2A scene classification (SCL) codes.
pub mod scl {
    pub const NO_DATA: u8 = 0;
    pub const SATURATED_OR_DEFECTIVE: u8 = 1;
    pub const DARK_AREA_PIXELS: u8 = 2;
    pub const CLOUD_SHADOWS: u8 = 3;
    pub const VEGETATION: u8 = 4;
    pub const NOT_VEGETATED: u8 = 5;
    pub const WATER: u8 = 6;
    pub const UNCLASSIFIED: u8 = 7;
    pub const CLOUD_MEDIUM_PROBABILITY: u8 = 8;
    pub const CLOUD_HIGH_PROBABILITY: u8 = 9;
    pub const THIN_CIRRUS: u8 = 10;
    pub const SNOW: u8 = 11;
}

/// SCL codes treated as unusable for compositing.
pub const SCL_CLOUDY_OR_NODATA: [u8; 5] = [
    scl::NO_DATA,
    scl::CLOUD_SHADOWS,
    scl::CLOUD_MEDIUM_PROBABILITY,
    scl::CLOUD_HIGH_PROBABILITY,
    scl::THIN_CIRRUS,
];

/// A closed set of classification codes, with O(1) membership.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudSet {
    members: [bool; 256],
}

impl CloudSet {
    pub fn from_codes(codes: &[u8]) -> Self {
        let mut members = [false; 256];
        for &code in codes {
            members[code as usize] = true;
        }
        Self { members }
    }

    pub fn contains(&self, code: u8) -> bool {
        self.members[code as usize]
    }

    /// Member codes in ascending order.
    pub fn codes(&self) -> Vec<u8> {
        (0..=255u8).filter(|&c| self.contains(c)).collect()
    }
}

impl Default for CloudSet {
    fn default() -> Self {
        Self::from_codes(&SCL_CLOUDY_OR_NODATA)
    }
}

impl std::fmt::Debug for CloudSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.codes()).finish()
    }
}

/// Boolean (time, row, col) cube, `true` where the observation is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudMask {
    times: usize,
    height: usize,
    width: usize,
    masked: Vec<bool>,
}

impl CloudMask {
    /// (times, height, width)
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.times, self.height, self.width)
    }

    /// Mask values for one time step, row-major.
    pub fn plane(&self, time: usize) -> &[bool] {
        let plane = self.height * self.width;
        &self.masked[time * plane..(time + 1) * plane]
    }

    pub fn is_masked(&self, time: usize, row: usize, col: usize) -> bool {
        self.masked[(time * self.height + row) * self.width + col]
    }

    /// Number of masked observations across the whole cube.
    pub fn masked_count(&self) -> usize {
        self.masked.iter().filter(|&&m| m).count()
    }
}

/// Flag every observation whose classification code is in `cloud_set`.
pub fn build_mask(classification: &ClassificationBand, cloud_set: &CloudSet) -> CloudMask {
    let (times, height, width) = classification.dims();
    CloudMask {
        times,
        height,
        width,
        masked: classification
            .codes()
            .iter()
            .map(|&code| cloud_set.contains(code))
            .collect(),
    }
}
