//! CIP solution types.

use std::fmt;

/// Status of the CIP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CipStatus {
    /// Tree exhausted with a feasible solution: optimality proven.
    Optimal,

    /// Tree exhausted without a feasible solution.
    Infeasible,

    /// An unbounded relaxation was proven after pricing.
    Unbounded,

    /// Node limit reached, best solution returned.
    NodeLimit,

    /// Time limit reached, best solution returned.
    TimeLimit,

    /// Gap limit reached (solution within gap_tol of the dual bound).
    GapLimit,

    /// Open-node limit reached.
    OpenNodeLimit,

    /// Solver was interrupted through its interrupt flag.
    Interrupted,

    /// Tree exhausted, but some nodes could not be solved reliably;
    /// bounds are valid, optimality is not proven.
    NumericalTrouble,
}

impl CipStatus {
    /// Returns true if the solve stopped on a limit rather than a proof.
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            CipStatus::NodeLimit
                | CipStatus::TimeLimit
                | CipStatus::OpenNodeLimit
                | CipStatus::Interrupted
                | CipStatus::NumericalTrouble
        )
    }

    /// Returns true if optimality was proven (within the gap tolerance).
    pub fn is_optimal(&self) -> bool {
        matches!(self, CipStatus::Optimal | CipStatus::GapLimit)
    }
}

impl fmt::Display for CipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipStatus::Optimal => write!(f, "Optimal"),
            CipStatus::Infeasible => write!(f, "Infeasible"),
            CipStatus::Unbounded => write!(f, "Unbounded"),
            CipStatus::NodeLimit => write!(f, "Node Limit"),
            CipStatus::TimeLimit => write!(f, "Time Limit"),
            CipStatus::GapLimit => write!(f, "Gap Limit"),
            CipStatus::OpenNodeLimit => write!(f, "Open Node Limit"),
            CipStatus::Interrupted => write!(f, "Interrupted"),
            CipStatus::NumericalTrouble => write!(f, "Numerical Trouble"),
        }
    }
}

/// Counters collected during a solve.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolveStats {
    /// Nodes popped and processed.
    pub nodes_processed: u64,

    /// Nodes that were branched (produced children).
    pub nodes_branched: u64,

    /// Nodes pruned (cutoff, infeasible, bound exceeded or solved).
    pub nodes_pruned: u64,

    /// Open nodes left at termination.
    pub nodes_open: u64,

    /// Deepest node processed.
    pub max_depth: usize,

    /// Relaxation solves.
    pub lp_solves: u64,

    /// Simplex iterations over all relaxation solves.
    pub lp_iterations: u64,

    /// Relaxation solves retried from a cold basis.
    pub lp_retries: u64,

    /// Nodes whose relaxation could not be solved reliably.
    pub unreliable_nodes: u64,

    /// Cuts added (global and local).
    pub cuts_added: u64,

    /// Columns added by pricers.
    pub columns_added: u64,

    /// Domain reductions found by propagation.
    pub domain_reductions: u64,

    /// Number of times the incumbent improved.
    pub incumbent_updates: u64,

    /// Solutions found by primal heuristics.
    pub heuristic_solutions: u64,

    /// Total solve time in milliseconds.
    pub solve_time_ms: u64,
}

/// Complete CIP solution with diagnostics.
///
/// Objective values are in the user's sense (including offset).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CipSolution {
    /// Solve status.
    pub status: CipStatus,

    /// Best solution, indexed by variable id (None if none was found).
    pub x: Option<Vec<f64>>,

    /// Objective value of the best solution (primal bound).
    pub primal_bound: f64,

    /// Best proven bound on the optimal objective (dual bound).
    pub dual_bound: f64,

    /// Relative optimality gap.
    pub gap: f64,

    /// Solve counters.
    pub stats: SolveStats,
}

impl CipSolution {
    /// Whether a feasible solution is available.
    pub fn has_solution(&self) -> bool {
        self.x.is_some()
    }

    /// Compute relative gap |primal - dual| / max(|primal|, eps).
    pub fn compute_gap(primal: f64, dual: f64) -> f64 {
        if primal.is_infinite() || dual.is_infinite() {
            return f64::INFINITY;
        }
        let denom = primal.abs().max(1e-10);
        (primal - dual).abs() / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_computation() {
        // Gap = |10 - 8| / |10| = 0.2
        let gap = CipSolution::compute_gap(10.0, 8.0);
        assert!((gap - 0.2).abs() < 1e-10);

        let gap = CipSolution::compute_gap(10.0, 9.9999);
        assert!(gap < 0.001);

        assert_eq!(CipSolution::compute_gap(f64::INFINITY, 3.0), f64::INFINITY);
    }

    #[test]
    fn test_status_methods() {
        assert!(CipStatus::Optimal.is_optimal());
        assert!(CipStatus::GapLimit.is_optimal());
        assert!(!CipStatus::NodeLimit.is_optimal());

        assert!(CipStatus::NodeLimit.is_limit());
        assert!(CipStatus::NumericalTrouble.is_limit());
        assert!(!CipStatus::Infeasible.is_limit());
        assert!(!CipStatus::Unbounded.is_limit());
    }
}
