//! Common test fixtures for videomap tests.
//!
//! This module provides pre-defined data for common compositing scenarios.

/// Sentinel-2 scene classification codes used in fixtures.
pub mod scl {
    pub const NO_DATA: u16 = 0;
    pub const CLOUD_SHADOWS: u16 = 3;
    pub const VEGETATION: u16 = 4;
    pub const NOT_VEGETATED: u16 = 5;
    pub const WATER: u16 = 6;
    pub const CLOUD_MEDIUM_PROBABILITY: u16 = 8;
    pub const CLOUD_HIGH_PROBABILITY: u16 = 9;
    pub const THIN_CIRRUS: u16 = 10;
    pub const SNOW: u16 = 11;
}

/// Tile coordinates as (z, x, y).
pub mod tiles {
    /// Boulder, Colorado at zoom 12.
    pub const BOULDER_Z12: (u32, u32, u32) = (12, 850, 1550);
}

/// Create a temporary output directory that is removed on drop.
pub fn temp_output_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("videomap-test-")
        .tempdir()
        .unwrap_or_else(|e| panic!("failed to create temp dir: {}", e))
}
