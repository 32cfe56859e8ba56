//! Gomory mixed-integer cuts from the simplex tableau.

use super::separator::Separator;
use super::Cut;
use crate::constraint::SeparationContext;
use crate::error::CipResult;
use crate::model::VarId;
use crate::relaxation::{BasisStatus, LpColumn, RelaxationOracle, Row, TableauRow};

/// Gomory mixed-integer separator.
///
/// For a basic integer variable with fractional value, the tableau row is
/// written over the distances `t_j >= 0` of the nonbasic columns from their
/// bounds, `x_B + sum a_j t_j = beta`, and the GMI inequality
/// `sum g(a_j) t_j >= 1` is mapped back to the problem variables. Cuts use
/// local bounds and are therefore local below the root.
#[derive(Debug, Clone)]
pub struct GomorySeparator {
    /// Maximum cuts per call.
    pub max_cuts: usize,

    /// Deepest node at which cuts are generated.
    pub max_depth: usize,

    /// Fractionality window `[min_frac, 1 - min_frac]` for source rows.
    pub min_frac: f64,

    /// Maximum ratio between largest and smallest cut coefficient.
    pub max_dynamism: f64,
}

impl Default for GomorySeparator {
    fn default() -> Self {
        Self {
            max_cuts: 50,
            max_depth: 0,
            min_frac: 0.01,
            max_dynamism: 1e6,
        }
    }
}

impl GomorySeparator {
    /// Create with a cut limit and depth limit.
    pub fn new(max_cuts: usize, max_depth: usize) -> Self {
        Self {
            max_cuts,
            max_depth,
            ..Default::default()
        }
    }

    /// Derive the cut of one tableau row, or `None` if the row is unusable.
    fn cut_from_row(
        &self,
        row: &TableauRow,
        ctx: &SeparationContext<'_>,
        oracle: &dyn RelaxationOracle,
    ) -> Option<Row> {
        let f0 = row.value - row.value.floor();
        if f0 < self.min_frac || f0 > 1.0 - self.min_frac {
            return None;
        }

        let n = ctx.domains.num_vars();
        let mut dense = vec![0.0; n];
        let mut rhs = 1.0;

        for e in &row.entries {
            // t_j = sign * (z_j - value_j), so a_j = sign * coef_j
            let (a, sign) = match e.status {
                BasisStatus::AtLower => (e.coef, 1.0),
                BasisStatus::AtUpper => (-e.coef, -1.0),
                BasisStatus::Basic | BasisStatus::Zero => return None,
            };
            if !e.value.is_finite() {
                return None;
            }
            let integral = match e.col {
                LpColumn::Var(v) => ctx.domains.is_integral(v) && (e.value - e.value.round()).abs() < 1e-9,
                LpColumn::Slack(_) => false,
            };
            let g = if integral {
                let fj = a - a.floor();
                if fj <= f0 {
                    fj / f0
                } else {
                    (1.0 - fj) / (1.0 - f0)
                }
            } else if a >= 0.0 {
                a / f0
            } else {
                -a / (1.0 - f0)
            };
            if g == 0.0 {
                continue;
            }

            let coef = g * sign;
            rhs += coef * e.value;
            match e.col {
                LpColumn::Var(v) => dense[v.0] += coef,
                LpColumn::Slack(key) => {
                    for &(v, a_rv) in &oracle.row(key)?.coefs {
                        dense[v.0] += coef * a_rv;
                    }
                }
            }
        }

        // Drop tiny coefficients, relaxing the right-hand side by their
        // largest possible contribution.
        let mut coefs = Vec::new();
        for (j, &c) in dense.iter().enumerate() {
            if c.abs() < 1e-9 {
                if c != 0.0 {
                    let v = VarId(j);
                    let worst = if c > 0.0 { c * ctx.domains.ub(v) } else { c * ctx.domains.lb(v) };
                    if !worst.is_finite() {
                        return None;
                    }
                    rhs -= worst;
                }
                continue;
            }
            coefs.push((VarId(j), c));
        }
        if coefs.is_empty() || !rhs.is_finite() {
            return None;
        }

        let (min, max) = coefs
            .iter()
            .fold((f64::INFINITY, 0.0f64), |(lo, hi), (_, c)| (lo.min(c.abs()), hi.max(c.abs())));
        if max / min > self.max_dynamism {
            return None;
        }
        Some(Row::greater_equal(&coefs, rhs))
    }
}

impl Separator for GomorySeparator {
    fn name(&self) -> &str {
        "gomory"
    }

    fn separate(&mut self, ctx: &SeparationContext<'_>, oracle: &dyn RelaxationOracle) -> CipResult<Vec<Cut>> {
        if ctx.depth > self.max_depth || self.max_cuts == 0 {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<(VarId, f64)> = (0..ctx.domains.num_vars())
            .map(VarId)
            .filter(|&v| ctx.domains.is_integral(v) && !ctx.domains.is_fixed(v))
            .filter_map(|v| {
                let x = ctx.x[v.0];
                let f = x - x.floor();
                (f >= self.min_frac && f <= 1.0 - self.min_frac).then_some((v, (f - 0.5).abs()))
            })
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        // Most fractional rows first
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        let vars: Vec<VarId> = candidates.iter().map(|(v, _)| *v).collect();

        let mut rows = oracle.tableau_rows(&vars)?;
        rows.sort_by_key(|r| vars.iter().position(|&v| v == r.basic));

        let mut cuts = Vec::new();
        for row in &rows {
            if cuts.len() >= self.max_cuts {
                break;
            }
            if let Some(cut) = self.cut_from_row(row, ctx, oracle) {
                cuts.push(Cut::new(&format!("gmi_{}", row.basic), cut, ctx.depth > 0, "gomory"));
            }
        }
        log::debug!("gomory: {} rows, {} cuts", rows.len(), cuts.len());
        Ok(cuts)
    }
}
