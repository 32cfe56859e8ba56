//! Error types for the LP engine.

use thiserror::Error;

/// Errors that can occur before or outside the simplex iterations.
///
/// Infeasibility, unboundedness and numerical trouble are reported through
/// [`crate::LpStatus`], not as errors.
#[derive(Error, Debug)]
pub enum LpError {
    /// Problem validation failed
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Requested row or column does not exist
    #[error("Index {index} out of range (size {size})")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Current size
        size: usize,
    },

    /// Dense tableau allocation failed
    #[error("Cannot allocate tableau of {rows}x{cols}")]
    Allocation {
        /// Rows requested
        rows: usize,
        /// Columns requested
        cols: usize,
    },

    /// Tableau queries require a successfully factored basis
    #[error("No factored basis available")]
    NoBasis,
}

/// Result type for LP operations.
pub type LpResult<T> = Result<T, LpError>;
