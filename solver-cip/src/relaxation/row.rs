//! Linear rows shared by constraints, cuts and the relaxation.

use std::fmt;

use crate::constraint::ConsId;
use crate::model::VarId;

/// Identity of a relaxation row.
///
/// Rows are addressed by key rather than position, so bases and duals stay
/// meaningful while rows come and go along the search path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    /// Row `k` contributed by a constraint.
    Constraint(ConsId, usize),
    /// Global cut from the cut pool.
    Cut(usize),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Constraint(c, k) => write!(f, "c{}.{}", c.0, k),
            RowKey::Cut(id) => write!(f, "cut{}", id),
        }
    }
}

/// A ranged linear row `lhs <= sum a_j x_j <= rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Nonzero coefficients, sorted by variable, no duplicates.
    pub coefs: Vec<(VarId, f64)>,

    /// Left-hand side (may be -inf).
    pub lhs: f64,

    /// Right-hand side (may be +inf).
    pub rhs: f64,
}

impl Row {
    /// Build a row, merging duplicate variables and dropping zeros.
    pub fn new(coefs: &[(VarId, f64)], lhs: f64, rhs: f64) -> Self {
        let mut merged: Vec<(VarId, f64)> = coefs.to_vec();
        merged.sort_by_key(|(v, _)| *v);
        merged.dedup_by(|b, a| {
            if a.0 == b.0 {
                a.1 += b.1;
                true
            } else {
                false
            }
        });
        merged.retain(|(_, a)| *a != 0.0);
        Self {
            coefs: merged,
            lhs,
            rhs,
        }
    }

    /// `sum a_j x_j <= rhs`
    pub fn less_equal(coefs: &[(VarId, f64)], rhs: f64) -> Self {
        Self::new(coefs, f64::NEG_INFINITY, rhs)
    }

    /// `sum a_j x_j >= lhs`
    pub fn greater_equal(coefs: &[(VarId, f64)], lhs: f64) -> Self {
        Self::new(coefs, lhs, f64::INFINITY)
    }

    /// Activity `sum a_j x_j`.
    pub fn activity(&self, x: &[f64]) -> f64 {
        self.coefs.iter().map(|(v, a)| a * x[v.0]).sum()
    }

    /// Amount by which `x` violates the row (0 if satisfied).
    pub fn violation(&self, x: &[f64]) -> f64 {
        let act = self.activity(x);
        (self.lhs - act).max(act - self.rhs).max(0.0)
    }

    /// Euclidean norm of the coefficients.
    pub fn norm(&self) -> f64 {
        self.coefs.iter().map(|(_, a)| a * a).sum::<f64>().sqrt()
    }

    /// Violation divided by the norm: distance of `x` to the row's half-space.
    pub fn efficacy(&self, x: &[f64]) -> f64 {
        let norm = self.norm();
        if norm < 1e-12 {
            return 0.0;
        }
        self.violation(x) / norm
    }

    /// Coefficient of `var` (0 if absent).
    pub fn coef(&self, var: VarId) -> f64 {
        match self.coefs.binary_search_by_key(&var, |(v, _)| *v) {
            Ok(pos) => self.coefs[pos].1,
            Err(_) => 0.0,
        }
    }

    /// Add `delta` to the coefficient of `var`.
    pub fn add_coef(&mut self, var: VarId, delta: f64) {
        match self.coefs.binary_search_by_key(&var, |(v, _)| *v) {
            Ok(pos) => {
                self.coefs[pos].1 += delta;
                if self.coefs[pos].1 == 0.0 {
                    self.coefs.remove(pos);
                }
            }
            Err(pos) if delta != 0.0 => self.coefs.insert(pos, (var, delta)),
            Err(_) => {}
        }
    }

    /// Whether every coefficient and side is finite where it must be.
    pub fn is_valid(&self) -> bool {
        self.coefs.iter().all(|(_, a)| a.is_finite())
            && !self.lhs.is_nan()
            && !self.rhs.is_nan()
            && self.lhs != f64::INFINITY
            && self.rhs != f64::NEG_INFINITY
    }
}

/// A column offered to the relaxation (initial variable or priced column).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    /// Variable of the column.
    pub var: VarId,

    /// Internal (minimization) objective coefficient.
    pub obj: f64,

    /// Coefficients in existing rows.
    pub entries: Vec<(RowKey, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_merges_duplicates() {
        let row = Row::new(&[(VarId(2), 1.0), (VarId(0), 3.0), (VarId(2), -1.0), (VarId(1), 0.0)], 0.0, 4.0);
        assert_eq!(row.coefs, vec![(VarId(0), 3.0)]);
    }

    #[test]
    fn test_violation_and_efficacy() {
        // x + y <= 1 at (0.5, 0.75)
        let row = Row::less_equal(&[(VarId(0), 1.0), (VarId(1), 1.0)], 1.0);
        let x = [0.5, 0.75];
        assert!((row.activity(&x) - 1.25).abs() < 1e-12);
        assert!((row.violation(&x) - 0.25).abs() < 1e-12);
        assert!((row.efficacy(&x) - 0.25 / 2f64.sqrt()).abs() < 1e-12);

        let ge = Row::greater_equal(&[(VarId(0), 2.0)], 2.0);
        assert!((ge.violation(&x) - 1.0).abs() < 1e-12);
        assert_eq!(ge.violation(&[1.5, 0.0]), 0.0);
    }

    #[test]
    fn test_add_coef() {
        let mut row = Row::less_equal(&[(VarId(1), 1.0)], 1.0);
        row.add_coef(VarId(0), 2.0);
        row.add_coef(VarId(1), -1.0);
        assert_eq!(row.coefs, vec![(VarId(0), 2.0)]);
        assert_eq!(row.coef(VarId(0)), 2.0);
        assert_eq!(row.coef(VarId(5)), 0.0);
    }
}
