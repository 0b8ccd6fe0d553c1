//! Configuration for the composite engine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::Boundary;
use crate::mask::{CloudSet, SCL_CLOUDY_OR_NODATA};
use videomap_common::parse_interval;

/// Configuration for turning a raster cube into frames.
///
/// Every tile of one run must share the same interval, origin and boundary
/// so that their frame sequences line up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Bucket width, e.g. `14D`.
    pub interval: String,

    /// Inclusive edge of each bucket.
    pub boundary: Boundary,

    /// First bucket edge; the first observation when unset.
    pub origin: Option<DateTime<Utc>>,

    /// Name of the scene classification band in the cube.
    pub classification_band: String,

    /// Classification codes treated as cloudy or missing.
    pub cloud_codes: Vec<u8>,

    /// Bands left out of the composite. The classification band is always
    /// left out.
    pub skip_bands: Vec<String>,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            interval: "14D".to_string(),
            boundary: Boundary::Right,
            origin: None,
            classification_band: "scl".to_string(),
            cloud_codes: SCL_CLOUDY_OR_NODATA.to_vec(),
            skip_bands: Vec::new(),
        }
    }
}

impl CompositeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COMPOSITE_INTERVAL") {
            config.interval = val;
        }

        if let Ok(val) = std::env::var("COMPOSITE_BOUNDARY") {
            if let Ok(boundary) = val.parse() {
                config.boundary = boundary;
            }
        }

        if let Ok(val) = std::env::var("COMPOSITE_CLASSIFICATION_BAND") {
            config.classification_band = val;
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        parse_interval(&self.interval).map_err(|e| e.to_string())?;

        if self.classification_band.trim().is_empty() {
            return Err("classification_band must not be empty".to_string());
        }

        Ok(())
    }

    /// Parsed bucket width.
    pub fn interval_duration(&self) -> crate::Result<Duration> {
        Ok(parse_interval(&self.interval)?)
    }

    pub fn cloud_set(&self) -> CloudSet {
        CloudSet::from_codes(&self.cloud_codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompositeConfig::default();
        assert_eq!(config.interval, "14D");
        assert_eq!(config.boundary, Boundary::Right);
        assert_eq!(config.classification_band, "scl");
        assert_eq!(config.cloud_codes, vec![0, 3, 8, 9, 10]);
        assert!(config.validate().is_ok());
        assert_eq!(config.interval_duration().unwrap(), Duration::days(14));
    }

    #[test]
    fn test_config_validation() {
        let mut config = CompositeConfig::default();
        config.interval = "fortnight".to_string();
        assert!(config.validate().is_err());

        config = CompositeConfig::default();
        config.classification_band = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: CompositeConfig =
            serde_json::from_str(r#"{"interval": "7D", "boundary": "left"}"#).unwrap();
        assert_eq!(config.interval, "7D");
        assert_eq!(config.boundary, Boundary::Left);
        assert_eq!(config.classification_band, "scl");
    }
}
