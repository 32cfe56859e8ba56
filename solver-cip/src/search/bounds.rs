//! Global primal/dual bound bookkeeping.

/// Primal and dual bounds of the search, in the internal minimization sense.
///
/// The primal bound only decreases (strict improvements), the dual bound
/// only increases and never exceeds the primal bound.
#[derive(Debug, Clone)]
pub struct BoundManager {
    /// Best solution found so far.
    solution: Option<Vec<f64>>,

    /// Objective of the best solution (+inf if none).
    primal: f64,

    /// Proven lower bound.
    dual: f64,

    /// Only solutions strictly below this value are accepted.
    obj_limit: f64,

    /// Absolute tolerance for pruning comparisons.
    abs_tol: f64,

    /// Number of accepted solutions.
    updates: u64,
}

impl BoundManager {
    /// Create with an objective limit (internal sense, +inf for none).
    pub fn new(obj_limit: f64, abs_tol: f64) -> Self {
        Self {
            solution: None,
            primal: f64::INFINITY,
            dual: f64::NEG_INFINITY,
            obj_limit,
            abs_tol,
            updates: 0,
        }
    }

    /// Offer a feasible solution. Returns `true` if it strictly improves the
    /// primal bound and respects the objective limit.
    pub fn report_feasible_solution(&mut self, x: &[f64], obj: f64) -> bool {
        if !obj.is_finite() || obj >= self.primal || obj >= self.obj_limit {
            return false;
        }
        self.primal = obj;
        self.solution = Some(x.to_vec());
        self.updates += 1;
        if self.dual > self.primal {
            self.dual = self.primal;
        }
        true
    }

    /// Set the dual bound from the lowest bound of the remaining work
    /// (open, focus and unresolved nodes; +inf once the tree is empty).
    ///
    /// The dual bound never decreases and is clamped to the primal bound;
    /// with no incumbent and an empty tree it becomes +inf.
    pub fn update_dual_bound(&mut self, lowest_open: f64) {
        let bound = lowest_open.min(self.primal);
        if bound > self.dual {
            self.dual = bound;
        }
    }

    /// Whether a node with this bound cannot contain a better solution.
    pub fn is_node_prunable(&self, bound: f64) -> bool {
        bound >= self.cutoff_bound() - self.tolerance()
    }

    /// The smaller of primal bound and objective limit.
    pub fn cutoff_bound(&self) -> f64 {
        self.primal.min(self.obj_limit)
    }

    fn tolerance(&self) -> f64 {
        let c = self.cutoff_bound();
        if c.is_finite() {
            self.abs_tol.max(1e-9 * c.abs())
        } else {
            0.0
        }
    }

    /// Primal bound.
    pub fn primal(&self) -> f64 {
        self.primal
    }

    /// Dual bound.
    pub fn dual(&self) -> f64 {
        self.dual
    }

    /// Best solution.
    pub fn solution(&self) -> Option<&[f64]> {
        self.solution.as_deref()
    }

    /// Whether a solution was found.
    pub fn has_incumbent(&self) -> bool {
        self.solution.is_some()
    }

    /// Number of accepted solutions.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Relative gap `(primal - dual) / max(|primal|, 1)` (inf without both
    /// bounds).
    pub fn gap(&self) -> f64 {
        if !self.primal.is_finite() || !self.dual.is_finite() {
            return f64::INFINITY;
        }
        ((self.primal - self.dual) / self.primal.abs().max(1.0)).max(0.0)
    }

    /// Whether the gap is closed within the given tolerances.
    pub fn gap_closed(&self, rel_tol: f64, abs_tol: f64) -> bool {
        self.primal.is_finite()
            && self.dual.is_finite()
            && (self.primal - self.dual <= abs_tol || self.gap() <= rel_tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incumbent_update() {
        let mut b = BoundManager::new(f64::INFINITY, 1e-9);
        assert!(b.report_feasible_solution(&[1.0], 100.0));
        assert!(!b.report_feasible_solution(&[2.0], 150.0));
        assert!(!b.report_feasible_solution(&[2.0], 100.0));
        assert!(b.report_feasible_solution(&[0.5], 50.0));
        assert_eq!(b.primal(), 50.0);
        assert_eq!(b.solution(), Some(&[0.5][..]));
        assert_eq!(b.updates(), 2);
    }

    #[test]
    fn test_objective_limit() {
        let mut b = BoundManager::new(10.0, 1e-9);
        assert!(!b.report_feasible_solution(&[0.0], 10.0));
        assert!(b.is_node_prunable(10.0));
        assert!(!b.is_node_prunable(9.0));
        assert!(b.report_feasible_solution(&[0.0], 9.0));
    }

    #[test]
    fn test_dual_clamped_and_monotone() {
        let mut b = BoundManager::new(f64::INFINITY, 1e-9);
        b.update_dual_bound(3.0);
        assert_eq!(b.dual(), 3.0);
        b.update_dual_bound(2.0);
        assert_eq!(b.dual(), 3.0);

        b.report_feasible_solution(&[0.0], 5.0);
        b.update_dual_bound(f64::INFINITY);
        assert_eq!(b.dual(), 5.0);
        assert!(b.primal() >= b.dual());
        assert!(b.gap_closed(0.0, 0.0));
    }

    #[test]
    fn test_gap() {
        let mut b = BoundManager::new(f64::INFINITY, 1e-9);
        assert_eq!(b.gap(), f64::INFINITY);
        b.report_feasible_solution(&[0.0], 100.0);
        b.update_dual_bound(90.0);
        assert!((b.gap() - 0.1).abs() < 1e-12);
        assert!(b.gap_closed(0.1, 0.0));
        assert!(!b.gap_closed(0.05, 1.0));
    }
}
