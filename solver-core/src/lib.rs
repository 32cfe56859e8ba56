//! LP relaxation engine for the constraint integer programming solver.
//!
//! This crate provides a bounded primal simplex method on a dense tableau.
//! It is built for the repeated, warm-started re-solves that happen inside
//! branch-and-bound:
//!
//! - **Bounded rows and columns**: `row_lower <= A x <= row_upper`,
//!   `col_lower <= x <= col_upper`, infinite bounds allowed
//! - **Warm start** from any saved [`Basis`]; phase 1 repairs primal
//!   infeasibility introduced by bound changes
//! - **Tableau access** after a solve (basic columns, tableau rows) for
//!   cutting-plane separators
//! - **Duals and reduced costs** for pricing and cut aging
//!
//! # Example
//!
//! ```
//! use solver_core::{solve, LpProblem, LpSettings, LpStatus};
//! use solver_core::linalg::sparse;
//!
//! // min -x1 - x2 s.t. x1 + 2 x2 <= 4, 3 x1 + x2 <= 6, x >= 0
//! let prob = LpProblem {
//!     c: vec![-1.0, -1.0],
//!     a: sparse::from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 1.0)]),
//!     row_lower: vec![f64::NEG_INFINITY; 2],
//!     row_upper: vec![4.0, 6.0],
//!     col_lower: vec![0.0; 2],
//!     col_upper: vec![f64::INFINITY; 2],
//! };
//!
//! let result = solve(&prob, &LpSettings::default()).unwrap();
//! assert_eq!(result.status, LpStatus::Optimal);
//! assert!((result.obj_val + 2.8).abs() < 1e-9);
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod linalg;
pub mod problem;
pub mod simplex;

// Re-export main types
pub use error::{LpError, LpResult};
pub use problem::{Basis, BasisStatus, LpInfo, LpProblem, LpSettings, LpSolution, LpStatus};
pub use simplex::{solve, solve_warm, SimplexSolver};
