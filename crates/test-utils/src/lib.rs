//! Shared test utilities for the ncfile workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Temporary file helpers
//! - Array generators
//! - Schema document fixtures
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
//! use test_utils::{assert_approx_eq, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use generators::*;
pub use paths::*;

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

/// Compare decoded values element by element.
///
/// Masked elements (`None`) must line up exactly; defined elements must agree
/// within `epsilon`.
///
/// ```ignore
/// use test_utils::assert_decoded_approx_eq;
///
/// assert_decoded_approx_eq!(decoded.iter(), [Some(1.0), None], 0.01);
/// ```
#[macro_export]
macro_rules! assert_decoded_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: Vec<Option<f64>> = $left.into_iter().map(|v| *v).collect();
        let right: Vec<Option<f64>> = $right.into_iter().collect();
        assert_eq!(left.len(), right.len(), "length mismatch: {:?} vs {:?}", left, right);
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            match (l, r) {
                (Some(l), Some(r)) => {
                    if (l - r).abs() > $epsilon as f64 {
                        panic!("assertion failed at element {}: {} vs {} (epsilon {})", i, l, r, $epsilon);
                    }
                }
                (None, None) => {}
                _ => panic!("assertion failed at element {}: {:?} vs {:?}", i, l, r),
            }
        }
    }};
}
