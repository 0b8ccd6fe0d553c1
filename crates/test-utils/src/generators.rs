//! Synthetic raster cube generators.
//!
//! These generators create small, predictable cubes whose samples can be
//! checked by hand. The cube layout matches the stacker output: time-major,
//! then band, then row-major pixels.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Midnight UTC on the given day of January 2022.
///
/// # Example
///
/// ```
/// use test_utils::day;
///
/// assert_eq!(day(3).to_rfc3339(), "2022-01-03T00:00:00+00:00");
/// ```
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0)
        .single()
        .map(|start| start + Duration::days(d as i64 - 1))
        .unwrap_or_default()
}

/// `count` timestamps spaced `step_days` apart, starting on January 1st 2022.
pub fn daily_series(count: usize, step_days: i64) -> Vec<DateTime<Utc>> {
    (0..count)
        .map(|i| day(1) + Duration::days(i as i64 * step_days))
        .collect()
}

/// A mutable cube under construction.
///
/// # Example
///
/// ```
/// use test_utils::{daily_series, SyntheticCube};
///
/// let mut cube = SyntheticCube::new(daily_series(3, 1), &["blue", "scl"], 2, 2);
/// cube.set(1, "blue", 0, 1, 420);
/// assert_eq!(cube.get(1, "blue", 0, 1), 420);
/// ```
#[derive(Debug, Clone)]
pub struct SyntheticCube {
    pub timestamps: Vec<DateTime<Utc>>,
    pub band_names: Vec<String>,
    pub height: usize,
    pub width: usize,
    pub data: Vec<u16>,
}

impl SyntheticCube {
    /// All-NoData cube with the given axes.
    pub fn new(timestamps: Vec<DateTime<Utc>>, bands: &[&str], height: usize, width: usize) -> Self {
        let len = timestamps.len() * bands.len() * height * width;
        Self {
            timestamps,
            band_names: bands.iter().map(|b| b.to_string()).collect(),
            height,
            width,
            data: vec![0; len],
        }
    }

    fn band(&self, name: &str) -> usize {
        self.band_names
            .iter()
            .position(|b| b == name)
            .unwrap_or_else(|| panic!("synthetic cube has no band '{}'", name))
    }

    fn offset(&self, time: usize, band: usize, row: usize, col: usize) -> usize {
        ((time * self.band_names.len() + band) * self.height + row) * self.width + col
    }

    pub fn set(&mut self, time: usize, band: &str, row: usize, col: usize, value: u16) {
        let b = self.band(band);
        let i = self.offset(time, b, row, col);
        self.data[i] = value;
    }

    pub fn get(&self, time: usize, band: &str, row: usize, col: usize) -> u16 {
        self.data[self.offset(time, self.band(band), row, col)]
    }

    /// Set one band of one time step to a constant.
    pub fn fill(&mut self, time: usize, band: &str, value: u16) {
        let b = self.band(band);
        let start = self.offset(time, b, 0, 0);
        let plane = self.height * self.width;
        self.data[start..start + plane].fill(value);
    }

    /// Set one band to a constant at every time step.
    pub fn fill_all(&mut self, band: &str, value: u16) {
        for t in 0..self.timestamps.len() {
            self.fill(t, band, value);
        }
    }

    /// Give every pixel of `band` the value `base + time * 100 + row * 10 + col`.
    pub fn fill_pattern(&mut self, band: &str, base: u16) {
        for t in 0..self.timestamps.len() {
            for row in 0..self.height {
                for col in 0..self.width {
                    let v = base + (t * 100 + row * 10 + col) as u16;
                    self.set(t, band, row, col, v);
                }
            }
        }
    }

    /// Decompose into `(timestamps, band_names, height, width, data)`.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(self) -> (Vec<DateTime<Utc>>, Vec<String>, usize, usize, Vec<u16>) {
        (
            self.timestamps,
            self.band_names,
            self.height,
            self.width,
            self.data,
        )
    }
}
