//! Relaxation oracle contract.

use std::collections::HashMap;

pub use solver_core::BasisStatus;

use super::row::{ColumnData, Row, RowKey};
use crate::error::CipResult;
use crate::model::VarId;

/// Status reported by the relaxation oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxationStatus {
    /// Optimal solution found.
    Optimal,
    /// Relaxation has no feasible point.
    Infeasible,
    /// Objective is unbounded below.
    Unbounded,
    /// Iteration or time limit hit; the result is not a valid bound.
    LimitReached,
    /// Degenerate or unreliable result.
    NumericalError,
}

/// Result of one relaxation solve.
#[derive(Debug, Clone)]
pub struct RelaxationResult {
    /// Solve status.
    pub status: RelaxationStatus,

    /// Objective value in the internal minimization sense, without offset.
    pub objective: f64,

    /// Primal values indexed by variable.
    pub x: Vec<f64>,

    /// Row duals; the reduced cost of a column is `c_j - sum_r y_r a_rj`.
    pub duals: HashMap<RowKey, f64>,

    /// Reduced costs indexed by variable.
    pub reduced_costs: Vec<f64>,

    /// Simplex iterations spent.
    pub iterations: usize,

    /// Whether the solve started from a saved basis.
    pub warm_started: bool,
}

impl RelaxationResult {
    /// A result carrying only a status (no solution).
    pub fn with_status(status: RelaxationStatus) -> Self {
        Self {
            status,
            objective: f64::NAN,
            x: Vec::new(),
            duals: HashMap::new(),
            reduced_costs: Vec::new(),
            iterations: 0,
            warm_started: false,
        }
    }

    /// Dual value of a row (0 for rows not in the relaxation).
    pub fn dual(&self, key: RowKey) -> f64 {
        self.duals.get(&key).copied().unwrap_or(0.0)
    }
}

/// Warm-start information keyed by variable and row identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedBasis {
    /// Status of each column, indexed by variable.
    pub cols: Vec<BasisStatus>,

    /// Status of each row slack.
    pub rows: HashMap<RowKey, BasisStatus>,
}

/// Column of the relaxation: a variable or the slack of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpColumn {
    /// Structural column.
    Var(VarId),
    /// Row slack `s = a x`.
    Slack(RowKey),
}

/// Nonbasic entry of a tableau row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableauEntry {
    /// Column.
    pub col: LpColumn,

    /// Tableau coefficient.
    pub coef: f64,

    /// Where the column sits.
    pub status: BasisStatus,

    /// Current value of the column (its active bound unless free).
    pub value: f64,
}

/// Simplex tableau row of a basic variable:
/// `x_basic + sum coef_j z_j = 0` over the nonbasic columns `z_j`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableauRow {
    /// Basic variable.
    pub basic: VarId,

    /// Its current value.
    pub value: f64,

    /// Nonzero nonbasic entries.
    pub entries: Vec<TableauEntry>,
}

/// External LP solver as seen by the search.
///
/// Columns are the problem variables (indexed by [`VarId`]); rows are added
/// and removed by [`RowKey`]. Bounds are pushed in full before every solve.
pub trait RelaxationOracle {
    /// Oracle name for logs.
    fn name(&self) -> &str;

    /// Number of columns.
    fn num_columns(&self) -> usize;

    /// Number of rows.
    fn num_rows(&self) -> usize;

    /// Append columns; their ids must continue the variable numbering.
    fn add_columns(&mut self, cols: &[ColumnData]) -> CipResult<()>;

    /// Add rows. Adding a key that is already present replaces the row.
    fn add_rows(&mut self, rows: &[(RowKey, Row)]) -> CipResult<()>;

    /// Remove rows; unknown keys are ignored.
    fn remove_rows(&mut self, keys: &[RowKey]) -> CipResult<()>;

    /// Whether a row is present.
    fn has_row(&self, key: RowKey) -> bool;

    /// A present row.
    fn row(&self, key: RowKey) -> Option<&Row>;

    /// Set all column bounds.
    fn set_bounds(&mut self, lb: &[f64], ub: &[f64]) -> CipResult<()>;

    /// Solve from the current warm-start basis, if any.
    fn solve(&mut self) -> CipResult<RelaxationResult>;

    /// Basis of the last solve.
    fn save_basis(&self) -> Option<SavedBasis>;

    /// Use `basis` as warm start of the next solve.
    fn restore_basis(&mut self, basis: &SavedBasis);

    /// Start the next solve from scratch.
    fn clear_basis(&mut self);

    /// Tableau rows of the given variables if they are basic in the last
    /// solve. Oracles without tableau access return nothing.
    fn tableau_rows(&self, _vars: &[VarId]) -> CipResult<Vec<TableauRow>> {
        Ok(Vec::new())
    }
}
