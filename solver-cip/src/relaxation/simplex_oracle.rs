//! Default relaxation oracle backed by the `solver-core` simplex.

use std::collections::HashMap;

use solver_core::linalg::sparse;
use solver_core::{Basis, BasisStatus, LpProblem, LpSettings, LpStatus, SimplexSolver};

use super::oracle::{
    LpColumn, RelaxationOracle, RelaxationResult, RelaxationStatus, SavedBasis, TableauEntry,
    TableauRow,
};
use super::row::{ColumnData, Row, RowKey};
use crate::error::{CipError, CipResult};
use crate::model::VarId;

/// Relaxation oracle that rebuilds an [`LpProblem`] from its rows on every
/// solve and warm-starts from a basis keyed by row identity.
#[derive(Debug, Clone)]
pub struct SimplexOracle {
    settings: LpSettings,
    obj: Vec<f64>,
    lb: Vec<f64>,
    ub: Vec<f64>,
    rows: Vec<(RowKey, Row)>,
    row_pos: HashMap<RowKey, usize>,
    warm: Option<SavedBasis>,
    last_basis: Option<SavedBasis>,

    /// Solver of the last solve, kept while the structure is unchanged.
    last: Option<SimplexSolver>,
    last_keys: Vec<RowKey>,
}

impl SimplexOracle {
    /// Create an empty oracle.
    pub fn new(settings: LpSettings) -> Self {
        Self {
            settings,
            obj: Vec::new(),
            lb: Vec::new(),
            ub: Vec::new(),
            rows: Vec::new(),
            row_pos: HashMap::new(),
            warm: None,
            last_basis: None,
            last: None,
            last_keys: Vec::new(),
        }
    }

    fn build_problem(&self) -> LpProblem {
        let n = self.obj.len();
        let coefs: Vec<Vec<(usize, f64)>> = self
            .rows
            .iter()
            .map(|(_, row)| row.coefs.iter().map(|(v, a)| (v.0, *a)).collect())
            .collect();
        LpProblem {
            c: self.obj.clone(),
            a: sparse::from_rows(n, &coefs),
            row_lower: self.rows.iter().map(|(_, r)| r.lhs).collect(),
            row_upper: self.rows.iter().map(|(_, r)| r.rhs).collect(),
            col_lower: self.lb.clone(),
            col_upper: self.ub.clone(),
        }
    }

    /// Translate the keyed warm start to the current row order.
    fn warm_basis(&self) -> Option<Basis> {
        let saved = self.warm.as_ref()?;
        let col_status = (0..self.obj.len())
            .map(|j| match saved.cols.get(j) {
                Some(s) => *s,
                None if self.lb[j].is_finite() => BasisStatus::AtLower,
                None if self.ub[j].is_finite() => BasisStatus::AtUpper,
                None => BasisStatus::Zero,
            })
            .collect();
        let row_status = self
            .rows
            .iter()
            .map(|(key, _)| saved.rows.get(key).copied().unwrap_or(BasisStatus::Basic))
            .collect();
        Some(Basis {
            col_status,
            row_status,
        })
    }

    fn lp_column(&self, j: usize) -> LpColumn {
        let n = self.obj.len();
        if j < n {
            LpColumn::Var(VarId(j))
        } else {
            LpColumn::Slack(self.last_keys[j - n])
        }
    }

    fn invalidate(&mut self) {
        self.last = None;
        self.last_keys.clear();
    }
}

impl RelaxationOracle for SimplexOracle {
    fn name(&self) -> &str {
        "simplex"
    }

    fn num_columns(&self) -> usize {
        self.obj.len()
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn add_columns(&mut self, cols: &[ColumnData]) -> CipResult<()> {
        self.obj.try_reserve(cols.len())?;
        self.lb.try_reserve(cols.len())?;
        self.ub.try_reserve(cols.len())?;
        for col in cols {
            if col.var.0 != self.obj.len() {
                return Err(CipError::InternalError(format!(
                    "column {} added out of order (expected x{})",
                    col.var,
                    self.obj.len()
                )));
            }
            self.obj.push(col.obj);
            self.lb.push(0.0);
            self.ub.push(f64::INFINITY);
            for (key, coef) in &col.entries {
                if let Some(&pos) = self.row_pos.get(key) {
                    self.rows[pos].1.add_coef(col.var, *coef);
                }
            }
        }
        self.invalidate();
        Ok(())
    }

    fn add_rows(&mut self, rows: &[(RowKey, Row)]) -> CipResult<()> {
        self.rows.try_reserve(rows.len())?;
        for (key, row) in rows {
            if let Some((v, _)) = row.coefs.iter().find(|(v, _)| v.0 >= self.obj.len()) {
                return Err(CipError::InternalError(format!("row {} references unknown column {}", key, v)));
            }
            match self.row_pos.get(key) {
                Some(&pos) => self.rows[pos].1 = row.clone(),
                None => {
                    self.row_pos.insert(*key, self.rows.len());
                    self.rows.push((*key, row.clone()));
                }
            }
        }
        self.invalidate();
        Ok(())
    }

    fn remove_rows(&mut self, keys: &[RowKey]) -> CipResult<()> {
        for key in keys {
            let Some(pos) = self.row_pos.remove(key) else {
                continue;
            };
            self.rows.swap_remove(pos);
            if let Some((moved, _)) = self.rows.get(pos) {
                self.row_pos.insert(*moved, pos);
            }
        }
        self.invalidate();
        Ok(())
    }

    fn has_row(&self, key: RowKey) -> bool {
        self.row_pos.contains_key(&key)
    }

    fn row(&self, key: RowKey) -> Option<&Row> {
        self.row_pos.get(&key).map(|&pos| &self.rows[pos].1)
    }

    fn set_bounds(&mut self, lb: &[f64], ub: &[f64]) -> CipResult<()> {
        if lb.len() != self.obj.len() || ub.len() != self.obj.len() {
            return Err(CipError::InternalError(format!(
                "bound vectors of length {}/{} for {} columns",
                lb.len(),
                ub.len(),
                self.obj.len()
            )));
        }
        self.lb.copy_from_slice(lb);
        self.ub.copy_from_slice(ub);
        self.invalidate();
        Ok(())
    }

    fn solve(&mut self) -> CipResult<RelaxationResult> {
        let prob = self.build_problem();
        let mut solver = SimplexSolver::new(&prob, self.settings.clone())?;
        let warm = self.warm_basis();
        let sol = solver.solve(warm.as_ref());

        let status = match sol.status {
            LpStatus::Optimal => RelaxationStatus::Optimal,
            LpStatus::PrimalInfeasible => RelaxationStatus::Infeasible,
            LpStatus::Unbounded => RelaxationStatus::Unbounded,
            LpStatus::MaxIters | LpStatus::TimeLimit => RelaxationStatus::LimitReached,
            LpStatus::NumericalError => RelaxationStatus::NumericalError,
        };

        let keys: Vec<RowKey> = self.rows.iter().map(|(k, _)| *k).collect();
        let basis = SavedBasis {
            cols: sol.basis.col_status.clone(),
            rows: keys.iter().copied().zip(sol.basis.row_status.iter().copied()).collect(),
        };
        let duals = keys.iter().copied().zip(sol.row_duals.iter().copied()).collect();

        self.warm = Some(basis.clone());
        self.last_basis = Some(basis);
        self.last_keys = keys;
        self.last = Some(solver);

        Ok(RelaxationResult {
            status,
            objective: sol.obj_val,
            x: sol.x,
            duals,
            reduced_costs: sol.reduced_costs,
            iterations: sol.info.iters,
            warm_started: sol.info.warm_started,
        })
    }

    fn save_basis(&self) -> Option<SavedBasis> {
        self.last_basis.clone()
    }

    fn restore_basis(&mut self, basis: &SavedBasis) {
        self.warm = Some(basis.clone());
    }

    fn clear_basis(&mut self) {
        self.warm = None;
    }

    fn tableau_rows(&self, vars: &[VarId]) -> CipResult<Vec<TableauRow>> {
        let Some(solver) = self.last.as_ref() else {
            return Ok(Vec::new());
        };
        let n = solver.num_cols();
        let status = solver.column_status();
        let values = solver.column_values();
        let head = solver.basic_columns()?;

        let mut out = Vec::new();
        for (i, &h) in head.iter().enumerate() {
            if h >= n || !vars.contains(&VarId(h)) {
                continue;
            }
            let row = solver.tableau_row(i)?;
            let entries = row
                .iter()
                .enumerate()
                .filter(|&(j, a)| status[j] != BasisStatus::Basic && a.abs() > 1e-12)
                .map(|(j, &coef)| TableauEntry {
                    col: self.lp_column(j),
                    coef,
                    status: status[j],
                    value: values[j],
                })
                .collect();
            out.push(TableauRow {
                basic: VarId(h),
                value: values[h],
                entries,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConsId;

    fn key(i: usize) -> RowKey {
        RowKey::Constraint(ConsId(i), 0)
    }

    fn columns(obj: &[f64]) -> Vec<ColumnData> {
        obj.iter()
            .enumerate()
            .map(|(j, &c)| ColumnData {
                var: VarId(j),
                obj: c,
                entries: Vec::new(),
            })
            .collect()
    }

    /// min -x - y s.t. x + y <= 1.5, x, y in [0, 1]
    fn oracle() -> SimplexOracle {
        let mut lp = SimplexOracle::new(LpSettings::default());
        lp.add_columns(&columns(&[-1.0, -1.0])).unwrap();
        lp.add_rows(&[(key(0), Row::less_equal(&[(VarId(0), 1.0), (VarId(1), 1.0)], 1.5))])
            .unwrap();
        lp.set_bounds(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        lp
    }

    #[test]
    fn test_solve_and_duals() {
        let mut lp = oracle();
        let res = lp.solve().unwrap();
        assert_eq!(res.status, RelaxationStatus::Optimal);
        assert!((res.objective + 1.5).abs() < 1e-9);
        assert!(res.dual(key(0)) < -0.5);
        assert_eq!(res.dual(key(7)), 0.0);
    }

    #[test]
    fn test_rows_by_key() {
        let mut lp = oracle();
        lp.add_rows(&[(key(1), Row::less_equal(&[(VarId(0), 1.0)], 0.25))]).unwrap();
        assert_eq!(lp.num_rows(), 2);
        let res = lp.solve().unwrap();
        assert!((res.objective + 1.25).abs() < 1e-9);

        lp.remove_rows(&[key(0), key(9)]).unwrap();
        assert_eq!(lp.num_rows(), 1);
        assert!(lp.has_row(key(1)));
        assert!(lp.row(key(0)).is_none());
        let res = lp.solve().unwrap();
        assert!(res.warm_started);
        assert!((res.objective + 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_priced_column_enters_rows() {
        let mut lp = oracle();
        lp.add_columns(&[ColumnData {
            var: VarId(2),
            obj: -3.0,
            entries: vec![(key(0), 1.0)],
        }])
        .unwrap();
        lp.set_bounds(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(lp.row(key(0)).unwrap().coef(VarId(2)), 1.0);

        let res = lp.solve().unwrap();
        // x2 = 1 uses capacity 1, the remaining 0.5 goes to x or y
        assert!((res.objective + 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_infeasible_bounds() {
        let mut lp = oracle();
        lp.add_rows(&[(key(1), Row::greater_equal(&[(VarId(0), 1.0), (VarId(1), 1.0)], 1.8))])
            .unwrap();
        let res = lp.solve().unwrap();
        assert_eq!(res.status, RelaxationStatus::Infeasible);
    }

    #[test]
    fn test_tableau_rows() {
        // min -x - y s.t. 2x + 2y <= 3, x, y in [0, 1]: one of x, y is basic at 0.5
        let mut lp = SimplexOracle::new(LpSettings::default());
        lp.add_columns(&columns(&[-1.0, -1.0])).unwrap();
        lp.add_rows(&[(key(0), Row::less_equal(&[(VarId(0), 2.0), (VarId(1), 2.0)], 3.0))])
            .unwrap();
        lp.set_bounds(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        let res = lp.solve().unwrap();
        assert_eq!(res.status, RelaxationStatus::Optimal);

        let rows = lp.tableau_rows(&[VarId(0), VarId(1)]).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!((row.value - 0.5).abs() < 1e-9);

        // x_basic + sum coef_j z_j = 0 holds at the current point
        let lhs = row.value + row.entries.iter().map(|e| e.coef * e.value).sum::<f64>();
        assert!(lhs.abs() < 1e-9);
    }
}
