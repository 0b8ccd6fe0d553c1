//! WebMercatorQuad tile arithmetic.
//!
//! Tiles use the XYZ convention: top-left origin, 256x256 pixels at every
//! zoom level, EPSG:3857 as the native CRS.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::f64::consts::PI;

use crate::BoundingBox;

/// Tile edge length in pixels at `up = 0`.
pub const TILE_SIZE: u32 = 256;

/// WGS84 semi-major axis used by spherical Web Mercator.
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the projected world width in meters.
const ORIGIN_SHIFT: f64 = PI * EARTH_RADIUS;

/// Latitude limit of the Web Mercator square.
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Deepest zoom whose tile indices fit in `u32`.
pub const MAX_ZOOM: u32 = 30;

pub const GRID_NAME: &str = "WebMercatorQuad";
pub const GRID_CRS: &str = "http://www.opengis.net/def/crs/EPSG/0/3857";
pub const EPSG: u32 = 3857;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at this zoom.
    ///
    /// Zoom levels past [`MAX_ZOOM`] count as [`MAX_ZOOM`].
    pub fn matrix_size(&self) -> u32 {
        1u32 << self.z.min(MAX_ZOOM)
    }

    /// `z-x-y`, used in output file names.
    pub fn file_key(&self) -> String {
        format!("{}-{}-{}", self.z, self.x, self.y)
    }

    /// All descendants of this tile at `zoom`, row by row.
    ///
    /// Returns an empty list when `zoom` is shallower than the tile itself or
    /// deeper than [`MAX_ZOOM`].
    pub fn children(&self, zoom: u32) -> Vec<TileCoord> {
        if zoom < self.z || zoom > MAX_ZOOM {
            return Vec::new();
        }
        let factor = 1u32 << (zoom - self.z);
        let mut out = Vec::with_capacity((factor * factor) as usize);
        for y in self.y * factor..(self.y + 1) * factor {
            for x in self.x * factor..(self.x + 1) * factor {
                out.push(TileCoord { z: zoom, x, y });
            }
        }
        out
    }

    /// Geographic (lon/lat) bounds of the tile.
    pub fn bounds(&self) -> BoundingBox {
        tile_bounds(self)
    }

    /// Web Mercator (meter) bounds of the tile.
    pub fn xy_bounds(&self) -> BoundingBox {
        tile_xy_bounds(self)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Convert lat/lon to the tile containing it.
///
/// Latitudes beyond the Mercator limit are clamped onto the edge rows.
/// Returns `None` for zoom levels past [`MAX_ZOOM`].
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> Option<TileCoord> {
    if zoom > MAX_ZOOM {
        return None;
    }
    let size = 1u64.checked_shl(zoom)?;
    let n = size as f64;
    let max_index = size - 1;

    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();

    Some(TileCoord {
        z: zoom,
        x: (x.max(0.0) as u64).min(max_index) as u32,
        y: (y.max(0.0) as u64).min(max_index) as u32,
    })
}

/// Geographic (lon/lat) bounds of a tile.
pub fn tile_bounds(coord: &TileCoord) -> BoundingBox {
    let n = coord.matrix_size() as f64;

    let lon_min = coord.x as f64 / n * 360.0 - 180.0;
    let lon_max = (coord.x + 1) as f64 / n * 360.0 - 180.0;

    let lat_max = (PI * (1.0 - 2.0 * coord.y as f64 / n))
        .sinh()
        .atan()
        .to_degrees();
    let lat_min = (PI * (1.0 - 2.0 * (coord.y + 1) as f64 / n))
        .sinh()
        .atan()
        .to_degrees();

    BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
}

/// Web Mercator bounds of a tile in meters.
pub fn tile_xy_bounds(coord: &TileCoord) -> BoundingBox {
    let span = 2.0 * ORIGIN_SHIFT / coord.matrix_size() as f64;

    let min_x = -ORIGIN_SHIFT + coord.x as f64 * span;
    let max_y = ORIGIN_SHIFT - coord.y as f64 * span;

    BoundingBox::new(min_x, max_y - span, min_x + span, max_y)
}

/// Center of a tile as (lon, lat).
pub fn tile_center(coord: &TileCoord) -> (f64, f64) {
    tile_bounds(coord).center()
}

/// Pixel edge of a tile rendered at `zoom + up` resolution.
pub fn tile_pixels(up: u32) -> u32 {
    TILE_SIZE << up
}

/// Tiles in a `width x height` block around `center`.
///
/// Offsets run from `-(n / 2)` to `n / 2` on each axis, columns outermost.
/// Tiles falling off the matrix are skipped.
pub fn neighborhood(center: &TileCoord, width: u32, height: u32) -> Vec<TileCoord> {
    let n = center.matrix_size() as i64;
    let half_w = (width / 2) as i64;
    let half_h = (height / 2) as i64;

    let mut tiles = Vec::new();
    for i in -half_w..=half_w {
        for j in -half_h..=half_h {
            let x = center.x as i64 + i;
            let y = center.y as i64 + j;
            if (0..n).contains(&x) && (0..n).contains(&y) {
                tiles.push(TileCoord::new(center.z, x as u32, y as u32));
            }
        }
    }
    tiles
}

/// A tile outline as a GeoJSON Feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileFeature {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    pub bbox: [f64; 4],
    pub geometry: PolygonGeometry,
    pub properties: Map<String, Value>,
}

/// GeoJSON Polygon geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolygonGeometry {
    #[serde(rename = "type")]
    pub type_: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl TileFeature {
    /// Attach an extra property, replacing any previous value.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// GeoJSON feature for a tile, outlined in lon/lat.
pub fn tile_feature(coord: &TileCoord) -> TileFeature {
    let bounds = tile_bounds(coord);

    let mut properties = Map::new();
    properties.insert(
        "title".to_string(),
        Value::from(format!("XYZ tile ({}, {}, {})", coord.x, coord.y, coord.z)),
    );
    properties.insert("grid_name".to_string(), Value::from(GRID_NAME));
    properties.insert("grid_crs".to_string(), Value::from(GRID_CRS));

    TileFeature {
        type_: "Feature".to_string(),
        id: format!("Tile(x={}, y={}, z={})", coord.x, coord.y, coord.z),
        bbox: bounds.to_array(),
        geometry: PolygonGeometry {
            type_: "Polygon".to_string(),
            coordinates: vec![bounds.ring()],
        },
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_past_limit() {
        assert_eq!(latlon_to_tile(40.0, -105.0, MAX_ZOOM + 2), None);
        assert!(latlon_to_tile(40.0, -105.0, MAX_ZOOM).is_some());
        assert!(TileCoord::new(29, 0, 0).children(MAX_ZOOM + 1).is_empty());
        assert_eq!(TileCoord::new(40, 0, 0).matrix_size(), 1 << MAX_ZOOM);
    }

    #[test]
    fn test_tile_pixels() {
        assert_eq!(tile_pixels(0), 256);
        assert_eq!(tile_pixels(1), 512);
        assert_eq!(tile_pixels(2), 1024);
    }

    #[test]
    fn test_file_key() {
        assert_eq!(TileCoord::new(12, 2148, 1584).file_key(), "12-2148-1584");
    }
}
