//! Shared test utilities for the videomap workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic raster cube generators
//! - Scene classification and date fixtures
//! - Approximate float assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, SyntheticCube};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that an optional composite sample holds approximately `expected`.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_sample_eq;
///
/// assert_sample_eq!(Some(20.0_f32), 20.0);
/// ```
#[macro_export]
macro_rules! assert_sample_eq {
    ($sample:expr, $expected:expr) => {{
        match $sample {
            Some(value) => $crate::assert_approx_eq!(value, $expected, 1e-4),
            None => panic!("assertion failed: sample is missing, expected {:?}", $expected),
        }
    }};
}
