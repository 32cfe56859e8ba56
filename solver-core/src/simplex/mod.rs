//! Bounded primal simplex on a dense tableau.
//!
//! The LP is brought into the form `[A | -I] z = 0` with `z = (x, s)` and
//! simple bounds on every entry of `z`, so row bounds are bounds on the slack
//! columns. Phase 1 minimizes the sum of bound violations of the basic
//! variables, which lets the solve start from any basis (in particular a warm
//! start whose primal values are infeasible after a bound change). Phase 2
//! uses Dantzig pricing and falls back to Bland's rule after a run of
//! degenerate pivots.

pub mod tableau;

use std::time::Instant;

use crate::error::{LpError, LpResult};
use crate::linalg::sparse::{spmv, spmv_transpose};
use crate::problem::{Basis, BasisStatus, LpInfo, LpProblem, LpSettings, LpSolution, LpStatus};
use tableau::{dense_constraint_matrix, Tableau};

/// Outcome of the ratio test.
enum Step {
    /// Entering variable moves to its opposite bound, no basis change.
    BoundFlip(f64),
    /// Basic variable in `row` leaves at `bound`.
    Pivot { row: usize, t: f64, bound: f64, at_upper: bool },
    /// No blocking variable.
    Unbounded,
}

/// Stateful simplex solver.
///
/// Keeps the factored tableau after [`SimplexSolver::solve`] so that callers
/// can query basis information (tableau rows for cutting planes).
#[derive(Debug, Clone)]
pub struct SimplexSolver {
    n: usize,
    m: usize,
    cost: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    base: Vec<f64>,
    status: Vec<BasisStatus>,
    values: Vec<f64>,
    tableau: Option<Tableau>,
    problem: LpProblem,
    settings: LpSettings,
}

impl SimplexSolver {
    /// Validate `prob` and build the dense working matrix.
    pub fn new(prob: &LpProblem, settings: LpSettings) -> LpResult<Self> {
        prob.validate()?;
        let n = prob.num_cols();
        let m = prob.num_rows();
        let base = dense_constraint_matrix(&prob.a)?;

        let mut cost = prob.c.clone();
        cost.resize(n + m, 0.0);
        let lower: Vec<f64> = prob.col_lower.iter().chain(&prob.row_lower).copied().collect();
        let upper: Vec<f64> = prob.col_upper.iter().chain(&prob.row_upper).copied().collect();

        Ok(Self {
            n,
            m,
            cost,
            lower,
            upper,
            base,
            status: vec![BasisStatus::Basic; n + m],
            values: vec![0.0; n + m],
            tableau: None,
            problem: prob.clone(),
            settings,
        })
    }

    /// Number of structural columns.
    pub fn num_cols(&self) -> usize {
        self.n
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.m
    }

    /// Basic column of each tableau row (columns `n..n+m` are row slacks).
    pub fn basic_columns(&self) -> LpResult<&[usize]> {
        self.tableau.as_ref().map(|t| t.head()).ok_or(LpError::NoBasis)
    }

    /// Tableau row `i` over all `n + m` columns.
    ///
    /// Satisfies `z_{head[i]} + sum_{j nonbasic} row[j] z_j = 0`.
    pub fn tableau_row(&self, i: usize) -> LpResult<&[f64]> {
        let tab = self.tableau.as_ref().ok_or(LpError::NoBasis)?;
        if i >= tab.rows() {
            return Err(LpError::OutOfRange { index: i, size: tab.rows() });
        }
        Ok(tab.row(i))
    }

    /// Status of each of the `n + m` columns in the last basis.
    pub fn column_status(&self) -> &[BasisStatus] {
        &self.status
    }

    /// Current value of each of the `n + m` columns.
    pub fn column_values(&self) -> &[f64] {
        &self.values
    }

    /// Solve from `warm_start` if it is usable, otherwise from the slack basis.
    pub fn solve(&mut self, warm_start: Option<&Basis>) -> LpSolution {
        let start = Instant::now();
        let mut info = LpInfo::default();

        info.warm_started = match warm_start {
            Some(basis) => self.install_basis(basis),
            None => false,
        };
        if !info.warm_started {
            self.install_slack_basis();
        }
        self.compute_basic_values();

        let status = self.iterate(&mut info, start);
        info.solve_time_ms = start.elapsed().as_millis() as u64;

        if self.settings.verbose {
            log::debug!(
                "simplex: status={} iters={} (phase1 {}) refactors={} warm={}",
                status,
                info.iters,
                info.phase1_iters,
                info.refactors,
                info.warm_started
            );
        }
        self.extract(status, info)
    }

    fn install_slack_basis(&mut self) {
        for j in 0..self.n {
            self.status[j] = self.nonbasic_default(j);
        }
        for i in 0..self.m {
            self.status[self.n + i] = BasisStatus::Basic;
        }
        let basic: Vec<usize> = (self.n..self.n + self.m).collect();
        // The slack basis is -I and always factors.
        self.tableau = Tableau::factor(&self.base, self.m, self.n + self.m, &basic, 0.0);
    }

    fn install_basis(&mut self, basis: &Basis) -> bool {
        if basis.col_status.len() != self.n
            || basis.row_status.len() != self.m
            || basis.num_basic() != self.m
        {
            return false;
        }
        let statuses: Vec<BasisStatus> =
            basis.col_status.iter().chain(&basis.row_status).copied().collect();
        for (j, st) in statuses.into_iter().enumerate() {
            self.status[j] = if st == BasisStatus::Basic {
                BasisStatus::Basic
            } else {
                self.sanitize_nonbasic(j, st)
            };
        }
        let basic: Vec<usize> = (0..self.n + self.m)
            .filter(|&j| self.status[j] == BasisStatus::Basic)
            .collect();
        match Tableau::factor(&self.base, self.m, self.n + self.m, &basic, self.settings.tol_pivot) {
            Some(tab) => {
                self.tableau = Some(tab);
                true
            }
            None => false,
        }
    }

    fn nonbasic_default(&self, j: usize) -> BasisStatus {
        if self.lower[j].is_finite() {
            BasisStatus::AtLower
        } else if self.upper[j].is_finite() {
            BasisStatus::AtUpper
        } else {
            BasisStatus::Zero
        }
    }

    fn sanitize_nonbasic(&self, j: usize, st: BasisStatus) -> BasisStatus {
        match st {
            BasisStatus::AtLower if self.lower[j].is_finite() => BasisStatus::AtLower,
            BasisStatus::AtUpper if self.upper[j].is_finite() => BasisStatus::AtUpper,
            _ => self.nonbasic_default(j),
        }
    }

    fn nonbasic_value(&self, j: usize) -> f64 {
        match self.status[j] {
            BasisStatus::AtLower => self.lower[j],
            BasisStatus::AtUpper => self.upper[j],
            _ => 0.0,
        }
    }

    /// Recompute all values from the nonbasic positions.
    fn compute_basic_values(&mut self) {
        for j in 0..self.n + self.m {
            if self.status[j] != BasisStatus::Basic {
                self.values[j] = self.nonbasic_value(j);
            }
        }
        let Some(tab) = self.tableau.as_ref() else {
            return;
        };
        for i in 0..tab.rows() {
            let row = tab.row(i);
            let mut v = 0.0;
            for (j, &a) in row.iter().enumerate() {
                if a != 0.0 && self.status[j] != BasisStatus::Basic {
                    v -= a * self.values[j];
                }
            }
            self.values[tab.head()[i]] = v;
        }
    }

    fn refactor(&mut self) -> bool {
        let basic: Vec<usize> = match self.tableau.as_ref() {
            Some(tab) => tab.head().to_vec(),
            None => return false,
        };
        match Tableau::factor(&self.base, self.m, self.n + self.m, &basic, self.settings.tol_pivot) {
            Some(tab) => {
                self.tableau = Some(tab);
                self.compute_basic_values();
                true
            }
            None => false,
        }
    }

    /// Phase-1 weight of basic variable `col`: -1 below lower, +1 above upper.
    fn infeasibility_weight(&self, col: usize) -> f64 {
        let v = self.values[col];
        let tol = self.settings.tol_primal * (1.0 + v.abs());
        if v < self.lower[col] - tol {
            -1.0
        } else if v > self.upper[col] + tol {
            1.0
        } else {
            0.0
        }
    }

    fn iterate(&mut self, info: &mut LpInfo, start: Instant) -> LpStatus {
        let width = self.n + self.m;
        let mut since_refactor = 0usize;
        let mut degenerate_run = 0usize;
        let mut verified = false;
        let mut dvec = vec![0.0; width];
        let mut cb = vec![0.0; self.m];

        loop {
            if info.iters >= self.settings.max_iter {
                return LpStatus::MaxIters;
            }
            if let Some(limit) = self.settings.time_limit_ms {
                if info.iters % 64 == 0 && start.elapsed().as_millis() as u64 >= limit {
                    return LpStatus::TimeLimit;
                }
            }
            if since_refactor >= self.settings.refactor_freq {
                if !self.refactor() {
                    return LpStatus::NumericalError;
                }
                info.refactors += 1;
                since_refactor = 0;
            }

            let Some(tab) = self.tableau.as_ref() else {
                return LpStatus::NumericalError;
            };

            // Phase and basic costs
            let mut phase1 = false;
            for i in 0..self.m {
                let w = self.infeasibility_weight(tab.head()[i]);
                if w != 0.0 {
                    phase1 = true;
                }
                cb[i] = w;
            }
            if !phase1 {
                for i in 0..self.m {
                    cb[i] = self.cost[tab.head()[i]];
                }
            }

            // Reduced costs d = c_N - cb^T tab
            for j in 0..width {
                dvec[j] = if phase1 { 0.0 } else { self.cost[j] };
            }
            for i in 0..self.m {
                if cb[i] == 0.0 {
                    continue;
                }
                for (d, &a) in dvec.iter_mut().zip(tab.row(i)) {
                    *d -= cb[i] * a;
                }
            }

            let bland = degenerate_run >= self.settings.bland_after;
            let entering = self.choose_entering(&dvec, bland);

            let Some((j, dir)) = entering else {
                // Re-verify once on a fresh factorization before concluding
                if since_refactor > 0 && !verified {
                    if !self.refactor() {
                        return LpStatus::NumericalError;
                    }
                    info.refactors += 1;
                    since_refactor = 0;
                    verified = true;
                    continue;
                }
                return if phase1 {
                    LpStatus::PrimalInfeasible
                } else {
                    LpStatus::Optimal
                };
            };
            verified = false;

            let step = self.ratio_test(j, dir, phase1, bland);
            info.iters += 1;
            if phase1 {
                info.phase1_iters += 1;
            }

            match step {
                Step::Unbounded => {
                    if phase1 {
                        // Phase 1 objective is bounded below; this is drift.
                        if since_refactor > 0 && self.refactor() {
                            info.refactors += 1;
                            since_refactor = 0;
                            continue;
                        }
                        return LpStatus::NumericalError;
                    }
                    return LpStatus::Unbounded;
                }
                Step::BoundFlip(t) => {
                    self.shift(j, dir, t);
                    self.status[j] = if dir > 0.0 { BasisStatus::AtUpper } else { BasisStatus::AtLower };
                    self.values[j] = self.nonbasic_value(j);
                    degenerate_run = 0;
                }
                Step::Pivot { row, t, bound, at_upper } => {
                    self.shift(j, dir, t);
                    let Some(tab) = self.tableau.as_mut() else {
                        return LpStatus::NumericalError;
                    };
                    let leaving = tab.head()[row];
                    tab.pivot(row, j);
                    self.status[j] = BasisStatus::Basic;
                    self.status[leaving] = if at_upper && self.lower[leaving] != self.upper[leaving] {
                        BasisStatus::AtUpper
                    } else {
                        BasisStatus::AtLower
                    };
                    self.values[leaving] = bound;
                    since_refactor += 1;
                    if t <= 1e-12 {
                        degenerate_run += 1;
                    } else {
                        degenerate_run = 0;
                    }
                }
            }
        }
    }

    /// Pick an improving nonbasic column and its direction (+1 increase, -1 decrease).
    fn choose_entering(&self, dvec: &[f64], bland: bool) -> Option<(usize, f64)> {
        let tol = self.settings.tol_dual;
        let mut best: Option<(usize, f64)> = None;
        let mut best_abs = 0.0;

        for (j, &d) in dvec.iter().enumerate() {
            let st = self.status[j];
            if st == BasisStatus::Basic || self.lower[j] == self.upper[j] {
                continue;
            }
            let dir = match st {
                BasisStatus::AtLower if d < -tol => 1.0,
                BasisStatus::AtUpper if d > tol => -1.0,
                BasisStatus::Zero if d < -tol => 1.0,
                BasisStatus::Zero if d > tol => -1.0,
                _ => continue,
            };
            if bland {
                return Some((j, dir));
            }
            if d.abs() > best_abs {
                best_abs = d.abs();
                best = Some((j, dir));
            }
        }
        best
    }

    fn ratio_test(&self, j: usize, dir: f64, phase1: bool, bland: bool) -> Step {
        let Some(tab) = self.tableau.as_ref() else {
            return Step::Unbounded;
        };
        let tol_piv = self.settings.tol_pivot;
        let tol = self.settings.tol_primal;

        let range = self.upper[j] - self.lower[j];
        let mut best_t = f64::INFINITY;
        let mut best: Option<(usize, f64, bool, f64)> = None;

        for i in 0..self.m {
            let alpha = tab.get(i, j) * dir;
            if alpha.abs() <= tol_piv {
                continue;
            }
            let col = tab.head()[i];
            let v = self.values[col];
            let lo = self.lower[col];
            let hi = self.upper[col];
            let slack = tol * (1.0 + v.abs());

            // Basic value moves as v - alpha * t
            let candidate = if alpha > 0.0 {
                if phase1 && v > hi + slack {
                    Some(((v - hi) / alpha, hi, true))
                } else if phase1 && v < lo - slack {
                    None
                } else if lo.is_finite() {
                    Some((((v - lo) / alpha).max(0.0), lo, false))
                } else {
                    None
                }
            } else if phase1 && v < lo - slack {
                Some(((lo - v) / -alpha, lo, false))
            } else if phase1 && v > hi + slack {
                None
            } else if hi.is_finite() {
                Some((((hi - v) / -alpha).max(0.0), hi, true))
            } else {
                None
            };

            let Some((t, bound, at_upper)) = candidate else {
                continue;
            };
            let better = match best {
                None => true,
                Some((bi, _, _, balpha)) => {
                    if t < best_t - 1e-12 {
                        true
                    } else if t <= best_t + 1e-12 {
                        if bland {
                            col < tab.head()[bi]
                        } else {
                            alpha.abs() > balpha.abs()
                        }
                    } else {
                        false
                    }
                }
            };
            if better {
                best_t = t.min(best_t);
                best = Some((i, bound, at_upper, alpha));
            }
        }

        if range.is_finite() && range <= best_t {
            return Step::BoundFlip(range);
        }
        match best {
            Some((row, bound, at_upper, _)) => Step::Pivot { row, t: best_t, bound, at_upper },
            None => Step::Unbounded,
        }
    }

    /// Move entering column `j` by `dir * t` and update basic values.
    fn shift(&mut self, j: usize, dir: f64, t: f64) {
        if t == 0.0 {
            return;
        }
        let Some(tab) = self.tableau.as_ref() else {
            return;
        };
        self.values[j] += dir * t;
        for i in 0..self.m {
            let a = tab.get(i, j);
            if a != 0.0 {
                self.values[tab.head()[i]] -= a * dir * t;
            }
        }
    }

    fn extract(&self, status: LpStatus, info: LpInfo) -> LpSolution {
        let n = self.n;
        let m = self.m;
        let x: Vec<f64> = self.values[..n].to_vec();

        let mut row_activity = vec![0.0; m];
        spmv(&self.problem.a, &x, &mut row_activity, 1.0, 0.0);

        let mut row_duals = vec![0.0; m];
        if let Some(tab) = self.tableau.as_ref() {
            for i in 0..m {
                let cbi = self.cost[tab.head()[i]];
                if cbi == 0.0 {
                    continue;
                }
                let row = tab.row(i);
                for r in 0..m {
                    row_duals[r] -= cbi * row[n + r];
                }
            }
        }

        // d = c - A^T y
        let mut reduced_costs = self.cost[..n].to_vec();
        spmv_transpose(&self.problem.a, &row_duals, &mut reduced_costs, -1.0, 1.0);
        for j in 0..n {
            if self.status[j] == BasisStatus::Basic {
                reduced_costs[j] = 0.0;
            }
        }

        let obj_val = self.problem.c.iter().zip(&x).map(|(c, v)| c * v).sum();

        LpSolution {
            status,
            x,
            row_activity,
            row_duals,
            reduced_costs,
            obj_val,
            basis: Basis {
                col_status: self.status[..n].to_vec(),
                row_status: self.status[n..].to_vec(),
            },
            info,
        }
    }
}

/// Solve `prob` from the slack basis.
pub fn solve(prob: &LpProblem, settings: &LpSettings) -> LpResult<LpSolution> {
    let mut solver = SimplexSolver::new(prob, settings.clone())?;
    Ok(solver.solve(None))
}

/// Solve `prob`, warm-starting from `basis` when it fits.
pub fn solve_warm(prob: &LpProblem, settings: &LpSettings, basis: &Basis) -> LpResult<LpSolution> {
    let mut solver = SimplexSolver::new(prob, settings.clone())?;
    Ok(solver.solve(Some(basis)))
}
