//! LP problem data, settings, and result types.

use std::fmt;

use crate::error::{LpError, LpResult};
use crate::linalg::sparse::SparseCsc;

/// Linear program in bounded row form.
///
/// ```text
/// minimize    c^T x
/// subject to  row_lower <= A x <= row_upper
///             col_lower <=  x  <= col_upper
/// ```
///
/// Infinite bounds are expressed with `f64::INFINITY` / `f64::NEG_INFINITY`.
#[derive(Debug, Clone)]
pub struct LpProblem {
    /// Objective coefficients (length n)
    pub c: Vec<f64>,

    /// Constraint matrix A (m x n, CSC)
    pub a: SparseCsc,

    /// Row activity lower bounds (length m)
    pub row_lower: Vec<f64>,

    /// Row activity upper bounds (length m)
    pub row_upper: Vec<f64>,

    /// Column lower bounds (length n)
    pub col_lower: Vec<f64>,

    /// Column upper bounds (length n)
    pub col_upper: Vec<f64>,
}

impl LpProblem {
    /// Number of structural columns (n)
    pub fn num_cols(&self) -> usize {
        self.c.len()
    }

    /// Number of rows (m)
    pub fn num_rows(&self) -> usize {
        self.row_lower.len()
    }

    /// Validate dimensions and bound consistency.
    pub fn validate(&self) -> LpResult<()> {
        let n = self.num_cols();
        let m = self.num_rows();

        if self.a.rows() != m || self.a.cols() != n {
            return Err(LpError::InvalidProblem(format!(
                "A has shape {}x{}, expected {}x{}",
                self.a.rows(),
                self.a.cols(),
                m,
                n
            )));
        }
        if !self.a.is_csc() {
            return Err(LpError::InvalidProblem("A must be stored in CSC format".into()));
        }
        if self.row_upper.len() != m {
            return Err(LpError::InvalidProblem(format!(
                "row_upper has length {}, expected {}",
                self.row_upper.len(),
                m
            )));
        }
        if self.col_lower.len() != n || self.col_upper.len() != n {
            return Err(LpError::InvalidProblem(format!(
                "column bounds have lengths {}/{}, expected {}",
                self.col_lower.len(),
                self.col_upper.len(),
                n
            )));
        }
        if self.c.iter().any(|v| !v.is_finite()) {
            return Err(LpError::InvalidProblem("objective has non-finite entries".into()));
        }
        if self.a.data().iter().any(|v| !v.is_finite()) {
            return Err(LpError::InvalidProblem("A has non-finite entries".into()));
        }
        let bounds = self
            .row_lower
            .iter()
            .zip(&self.row_upper)
            .chain(self.col_lower.iter().zip(&self.col_upper));
        for (lo, hi) in bounds {
            if lo.is_nan() || hi.is_nan() || *lo == f64::INFINITY || *hi == f64::NEG_INFINITY {
                return Err(LpError::InvalidProblem(format!("invalid bound pair [{}, {}]", lo, hi)));
            }
        }
        Ok(())
    }
}

/// Nonbasic/basic position of a column or row slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisStatus {
    /// Variable is basic
    Basic,

    /// Nonbasic at its lower bound
    AtLower,

    /// Nonbasic at its upper bound
    AtUpper,

    /// Nonbasic free variable held at zero
    Zero,
}

/// Simplex basis snapshot used for warm starts.
///
/// Row entries describe the row slack `s = A_i x`. A basis whose dimensions do
/// not match the problem, or that turns out singular, is ignored and the
/// solve starts from the slack basis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Basis {
    /// Status of each structural column
    pub col_status: Vec<BasisStatus>,

    /// Status of each row slack
    pub row_status: Vec<BasisStatus>,
}

impl Basis {
    /// Number of basic entries.
    pub fn num_basic(&self) -> usize {
        self.col_status
            .iter()
            .chain(&self.row_status)
            .filter(|s| **s == BasisStatus::Basic)
            .count()
    }
}

/// Simplex settings.
#[derive(Debug, Clone)]
pub struct LpSettings {
    /// Maximum number of simplex pivots (phase 1 + phase 2)
    pub max_iter: usize,

    /// Time limit in milliseconds (None = no limit)
    pub time_limit_ms: Option<u64>,

    /// Enable verbose logging
    pub verbose: bool,

    /// Primal feasibility tolerance
    pub tol_primal: f64,

    /// Reduced cost (dual feasibility) tolerance
    pub tol_dual: f64,

    /// Smallest pivot element accepted in the ratio test
    pub tol_pivot: f64,

    /// Refactor the tableau from scratch every N pivots
    pub refactor_freq: usize,

    /// Consecutive degenerate pivots before switching to Bland's rule
    pub bland_after: usize,
}

impl Default for LpSettings {
    fn default() -> Self {
        Self {
            max_iter: 50_000,
            time_limit_ms: None,
            verbose: false,
            tol_primal: 1e-9,
            tol_dual: 1e-9,
            tol_pivot: 1e-9,
            refactor_freq: 100,
            bland_after: 50,
        }
    }
}

/// Solution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    /// Optimal basic solution found
    Optimal,

    /// No point satisfies the rows and bounds
    PrimalInfeasible,

    /// Objective is unbounded below on the feasible region
    Unbounded,

    /// Iteration limit reached
    MaxIters,

    /// Time limit reached
    TimeLimit,

    /// Singular basis or loss of feasibility that refactoring did not fix
    NumericalError,
}

impl fmt::Display for LpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LpStatus::Optimal => write!(f, "Optimal"),
            LpStatus::PrimalInfeasible => write!(f, "Primal Infeasible"),
            LpStatus::Unbounded => write!(f, "Unbounded"),
            LpStatus::MaxIters => write!(f, "MaxIters"),
            LpStatus::TimeLimit => write!(f, "Time Limit"),
            LpStatus::NumericalError => write!(f, "Numerical Error"),
        }
    }
}

/// Solve result with solution and diagnostics.
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Solution status
    pub status: LpStatus,

    /// Primal column values (length n)
    pub x: Vec<f64>,

    /// Row activities A x (length m)
    pub row_activity: Vec<f64>,

    /// Row duals y, so that the reduced cost of column j is c_j - y^T A_j (length m)
    pub row_duals: Vec<f64>,

    /// Reduced costs of the structural columns (length n)
    pub reduced_costs: Vec<f64>,

    /// Objective value c^T x
    pub obj_val: f64,

    /// Final basis
    pub basis: Basis,

    /// Detailed solve information
    pub info: LpInfo,
}

/// Detailed solve information.
#[derive(Debug, Clone, Default)]
pub struct LpInfo {
    /// Total simplex pivots (including bound flips)
    pub iters: usize,

    /// Pivots spent in phase 1
    pub phase1_iters: usize,

    /// Number of tableau refactorizations
    pub refactors: usize,

    /// Whether the supplied warm-start basis was used
    pub warm_started: bool,

    /// Total solve time (milliseconds)
    pub solve_time_ms: u64,
}
