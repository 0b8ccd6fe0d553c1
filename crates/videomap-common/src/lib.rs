//! Common types and utilities shared across the videomap crates.

pub mod bbox;
pub mod tile;
pub mod time;

pub use bbox::BoundingBox;
pub use tile::{TileCoord, TileFeature, TILE_SIZE};
pub use time::{parse_date, parse_interval, TimeParseError, TimeRange};
