//! Branch-and-bound solve loop.
//!
//! [`Solver`] owns the settings and the user plugins. Each call to
//! [`Solver::solve`] builds a fresh [`context::SolverContext`] holding all
//! mutable search state (domains, constraint set, relaxation, tree, bounds)
//! and runs the node loop on it.

mod context;
mod node;
mod search_loop;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::branching::BranchingRulePlugin;
use crate::cuts::Separator;
use crate::error::{CipError, CipResult};
use crate::heuristics::Heuristic;
use crate::model::{CipSolution, Model};
use crate::pricing::Pricer;
use crate::relaxation::{RelaxationOracle, SimplexOracle};
use crate::settings::CipSettings;

use context::SolverContext;

/// User plugins called during a solve.
#[derive(Default)]
pub(crate) struct Plugins {
    pub separators: Vec<Box<dyn Separator>>,
    pub pricers: Vec<Box<dyn Pricer>>,
    pub heuristics: Vec<Box<dyn Heuristic>>,
}

/// Constraint integer programming solver.
///
/// # Example
///
/// ```
/// use solver_cip::{CipSettings, CipStatus, Model, Solver};
///
/// let mut model = Model::new("pair");
/// let x = model.add_binary("x", -1.0).unwrap();
/// let y = model.add_binary("y", -1.0).unwrap();
/// model.add_linear("pack", &[(x, 1.0), (y, 1.0)], f64::NEG_INFINITY, 1.0).unwrap();
///
/// let mut solver = Solver::new(CipSettings::default());
/// let sol = solver.solve(model).unwrap();
/// assert_eq!(sol.status, CipStatus::Optimal);
/// assert!((sol.primal_bound + 1.0).abs() < 1e-6);
/// ```
pub struct Solver {
    settings: CipSettings,
    plugins: Plugins,
    branching_rule: Option<Box<dyn BranchingRulePlugin>>,
    oracle: Option<Box<dyn RelaxationOracle>>,
    interrupt: Arc<AtomicBool>,
}

impl Solver {
    /// Create a solver with the given settings.
    pub fn new(settings: CipSettings) -> Self {
        Self {
            settings,
            plugins: Plugins::default(),
            branching_rule: None,
            oracle: None,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Settings.
    pub fn settings(&self) -> &CipSettings {
        &self.settings
    }

    /// Add a cutting-plane separator.
    pub fn add_separator(&mut self, separator: Box<dyn Separator>) {
        self.plugins.separators.push(separator);
    }

    /// Add a pricer for column generation.
    pub fn add_pricer(&mut self, pricer: Box<dyn Pricer>) {
        self.plugins.pricers.push(pricer);
    }

    /// Add a primal heuristic.
    pub fn add_heuristic(&mut self, heuristic: Box<dyn Heuristic>) {
        self.plugins.heuristics.push(heuristic);
    }

    /// Score branching candidates with a user rule instead of
    /// [`CipSettings::branching_rule`].
    pub fn set_branching_rule(&mut self, rule: Box<dyn BranchingRulePlugin>) {
        self.branching_rule = Some(rule);
    }

    /// Use another relaxation oracle for the next solve (the default is
    /// [`SimplexOracle`]). The oracle must be empty; it is consumed by the
    /// solve.
    pub fn set_oracle(&mut self, oracle: Box<dyn RelaxationOracle>) {
        self.oracle = Some(oracle);
    }

    /// Flag that stops the solve at the next node pop when set. The solve
    /// then reports [`crate::CipStatus::Interrupted`] with valid bounds.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Share an existing flag (e.g. one set by a signal handler) as the
    /// interrupt flag.
    pub fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = flag;
    }

    /// Solve a model.
    ///
    /// Plugins stay with the solver and can be reused for another model.
    pub fn solve(&mut self, model: Model) -> CipResult<CipSolution> {
        self.settings.validate().map_err(CipError::InvalidProblem)?;

        let oracle = self
            .oracle
            .take()
            .unwrap_or_else(|| Box::new(SimplexOracle::new(self.settings.relaxation.clone())));
        let mut ctx = SolverContext::new(
            model,
            &self.settings,
            &mut self.plugins,
            oracle,
            Arc::clone(&self.interrupt),
        )?;
        if let Some(rule) = self.branching_rule.take() {
            ctx.branching.set_plugin(rule);
        }

        let result = ctx.run();
        self.branching_rule = ctx.branching.take_plugin();
        result
    }
}

/// Solve a model with default plugins.
pub fn solve(model: Model, settings: &CipSettings) -> CipResult<CipSolution> {
    Solver::new(settings.clone()).solve(model)
}
