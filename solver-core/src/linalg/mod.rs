//! Linear algebra layer.
//!
//! Sparse storage for LP data. The simplex itself works on a dense tableau.

pub mod sparse;
