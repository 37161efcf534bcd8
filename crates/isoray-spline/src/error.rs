//! Error types for spline construction.

use thiserror::Error;

/// Errors that can occur while building a spline map.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    /// Knot vector is decreasing somewhere or has the wrong length.
    #[error("invalid {direction} knot vector: len={len}, expected {expected} (n={n}, p={degree})")]
    InvalidKnots {
        /// `"u"` or `"v"`.
        direction: &'static str,
        /// Actual knot count.
        len: usize,
        /// Expected knot count.
        expected: usize,
        /// Number of control points in this direction.
        n: usize,
        /// Polynomial degree.
        degree: usize,
    },

    /// Knot vector is not non-decreasing.
    #[error("{0} knot vector is not non-decreasing")]
    UnsortedKnots(&'static str),

    /// Coefficient grid rows have inconsistent lengths.
    #[error("coefficient grid is ragged: row {row} has {len} entries, expected {expected}")]
    RaggedGrid {
        /// Offending row.
        row: usize,
        /// Its length.
        len: usize,
        /// Length of the first row.
        expected: usize,
    },

    /// Coefficient grid is empty.
    #[error("coefficient grid is empty")]
    EmptyGrid,
}

/// Result type for spline operations.
pub type Result<T> = std::result::Result<T, SplineError>;
