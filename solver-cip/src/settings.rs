//! Configuration settings for the CIP solver.

use solver_core::LpSettings;

/// Branching candidate scoring rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BranchingRule {
    /// Select variable with fractional part closest to 0.5.
    #[default]
    MostFractional,

    /// Use pseudocost estimates from previous branches (product score).
    Pseudocost,

    /// Hybrid branching: most-fractional for early nodes, pseudocost later.
    Hybrid {
        /// Switch to pseudocost after this many nodes.
        switch_after_nodes: u64,
    },
}

/// Node selection strategy for the search tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeSelection {
    /// Always select node with best (lowest) dual bound.
    #[default]
    BestBound,

    /// Depth-first search, ties broken by best bound.
    DepthFirst,

    /// Select by estimated objective value.
    BestEstimate,

    /// Hybrid: alternate between diving and best-bound.
    Hybrid {
        /// Every N-th selection is a depth-first pick.
        dive_freq: usize,
    },

    /// Two-phase: depth-first until first incumbent, then best-bound.
    TwoPhase,

    /// Plunging: continue with a child of the last node, best-bound otherwise.
    Plunging {
        /// Maximum plunge length before a best-bound pick is forced.
        max_plunge_depth: usize,
    },
}

/// CIP solver settings.
#[derive(Debug, Clone)]
pub struct CipSettings {
    // === Termination criteria ===
    /// Maximum number of nodes to process.
    pub node_limit: u64,

    /// Time limit in milliseconds (None = unlimited).
    pub time_limit_ms: Option<u64>,

    /// Maximum number of open nodes (None = unlimited).
    pub max_open_nodes: Option<usize>,

    /// Relative optimality gap tolerance.
    /// Stop when |primal - dual| / max(|primal|, eps) <= gap_tol.
    pub gap_tol: f64,

    /// Absolute optimality gap tolerance.
    pub gap_abs_tol: f64,

    // === Tolerances ===
    /// Feasibility tolerance for constraint checks and bound comparisons.
    pub feas_tol: f64,

    /// Integer feasibility tolerance.
    /// A variable is considered integral if |x - round(x)| <= int_feas_tol.
    pub int_feas_tol: f64,

    // === Search strategy ===
    /// Branching candidate scoring rule.
    pub branching_rule: BranchingRule,

    /// Node selection strategy.
    pub node_selection: NodeSelection,

    // === Propagation ===
    /// Maximum propagation passes per node (0 = until fixpoint).
    pub max_propagation_rounds: usize,

    // === Cut and pricing rounds ===
    /// Maximum separation rounds at a non-root node.
    pub max_cut_rounds_per_node: usize,

    /// Maximum separation rounds at the root.
    pub max_cut_rounds_root: usize,

    /// Maximum cuts to add per separation round.
    pub cuts_per_round: usize,

    /// Minimum efficacy (violation / norm) for a cut to be added.
    pub cut_violation_tol: f64,

    /// How often to age out slack cuts (every N relaxation solves).
    pub cut_cleanup_freq: usize,

    /// Run the Gomory mixed-integer separator.
    pub gomory_cuts: bool,

    /// Deepest node depth at which Gomory cuts are separated.
    pub gomory_max_depth: usize,

    /// Maximum Gomory cuts per round.
    pub gomory_max_cuts: usize,

    /// Call pricers after relaxation solves.
    pub pricing_enabled: bool,

    /// Maximum pricing rounds per relaxation solve.
    pub max_pricing_rounds: usize,

    // === Heuristics ===
    /// Run primal heuristics on relaxation solutions.
    pub heuristics: bool,

    // === Relaxation ===
    /// Settings for the LP relaxation oracle.
    pub relaxation: LpSettings,

    // === Output ===
    /// Print progress information.
    pub verbose: bool,

    /// Log frequency (print every N nodes).
    pub log_freq: u64,
}

impl Default for CipSettings {
    fn default() -> Self {
        Self {
            // Termination
            node_limit: 1_000_000,
            time_limit_ms: None,
            max_open_nodes: None,
            gap_tol: 1e-6,
            gap_abs_tol: 1e-9,

            // Tolerances
            feas_tol: 1e-6,
            int_feas_tol: 1e-6,

            // Search
            branching_rule: BranchingRule::default(),
            node_selection: NodeSelection::default(),

            // Propagation
            max_propagation_rounds: 100,

            // Cuts and pricing
            max_cut_rounds_per_node: 5,
            max_cut_rounds_root: 20,
            cuts_per_round: 100,
            cut_violation_tol: 1e-6,
            cut_cleanup_freq: 100,
            gomory_cuts: true,
            gomory_max_depth: 0,
            gomory_max_cuts: 50,
            pricing_enabled: true,
            max_pricing_rounds: 1000,

            // Heuristics
            heuristics: true,

            // Relaxation
            relaxation: LpSettings::default(),

            // Output
            verbose: false,
            log_freq: 100,
        }
    }
}

impl CipSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            log_freq: 1,
            ..Self::default()
        }
    }

    /// Set time limit in seconds.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_ms = Some((seconds * 1000.0) as u64);
        self
    }

    /// Set maximum nodes.
    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.node_limit = nodes;
        self
    }

    /// Set maximum number of open nodes.
    pub fn with_max_open_nodes(mut self, nodes: usize) -> Self {
        self.max_open_nodes = Some(nodes);
        self
    }

    /// Set optimality gap tolerance.
    pub fn with_gap_tol(mut self, tol: f64) -> Self {
        self.gap_tol = tol;
        self
    }

    /// Set node selection strategy.
    pub fn with_node_selection(mut self, selection: NodeSelection) -> Self {
        self.node_selection = selection;
        self
    }

    /// Set branching rule.
    pub fn with_branching_rule(mut self, rule: BranchingRule) -> Self {
        self.branching_rule = rule;
        self
    }

    /// Disable all cutting planes.
    pub fn without_cuts(mut self) -> Self {
        self.gomory_cuts = false;
        self.max_cut_rounds_per_node = 0;
        self.max_cut_rounds_root = 0;
        self
    }

    /// Check settings for values that make the solve meaningless.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.gap_tol >= 0.0) || !(self.gap_abs_tol >= 0.0) {
            return Err("gap tolerances must be nonnegative".into());
        }
        if !(self.feas_tol > 0.0) || !(self.int_feas_tol > 0.0) || self.int_feas_tol >= 0.5 {
            return Err("feasibility tolerances must be in (0, 0.5)".into());
        }
        if let NodeSelection::Hybrid { dive_freq: 0 } = self.node_selection {
            return Err("hybrid node selection needs dive_freq >= 1".into());
        }
        if self.log_freq == 0 {
            return Err("log_freq must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let s = CipSettings::default()
            .with_time_limit(1.5)
            .with_node_limit(10)
            .with_gap_tol(0.01)
            .with_max_open_nodes(5);

        assert_eq!(s.time_limit_ms, Some(1500));
        assert_eq!(s.node_limit, 10);
        assert_eq!(s.gap_tol, 0.01);
        assert_eq!(s.max_open_nodes, Some(5));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut s = CipSettings::default();
        s.int_feas_tol = 0.7;
        assert!(s.validate().is_err());

        let s = CipSettings::default().with_node_selection(NodeSelection::Hybrid { dive_freq: 0 });
        assert!(s.validate().is_err());
    }
}
