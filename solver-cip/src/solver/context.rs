//! Mutable state of one solve.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use super::Plugins;
use crate::branching::BranchingEngine;
use crate::constraint::{
    ActivationDelta, ConsId, ConstraintHandler, ConstraintSet, HandlerId, LockTable, Scope,
};
use crate::cuts::{Cut, CutPool, CutPoolSettings, GomorySeparator, Separator};
use crate::domain::DomainStore;
use crate::error::{CipError, CipResult};
use crate::heuristics::{Heuristic, SimpleRounding};
use crate::model::{Model, Problem, SolveStats, VarId, VarType};
use crate::pricing::PricedColumn;
use crate::propagation::{ImplicationGraph, PropagationEngine};
use crate::relaxation::{ColumnData, RelaxationOracle, Row, RowKey};
use crate::search::{BoundManager, NodeId, SearchTree};
use crate::settings::CipSettings;

/// All state read and mutated by the node loop.
///
/// Built at solve start from the model and dropped at solve end; nothing
/// outlives it except the user plugins it borrows.
pub(crate) struct SolverContext<'s> {
    pub(super) settings: &'s CipSettings,
    pub(super) plugins: &'s mut Plugins,

    /// Separators enabled by settings (run before user separators).
    pub(super) builtin_separators: Vec<Box<dyn Separator>>,

    /// Heuristics enabled by settings (run before user heuristics).
    pub(super) builtin_heuristics: Vec<Box<dyn Heuristic>>,

    pub(super) problem: Problem,
    pub(super) handlers: Vec<Box<dyn ConstraintHandler>>,
    pub(super) conss: ConstraintSet,
    pub(super) implications: ImplicationGraph,
    pub(super) domains: DomainStore,
    pub(super) locks: LockTable,
    pub(super) propagation: PropagationEngine,
    pub(super) oracle: Box<dyn RelaxationOracle>,
    pub(super) pool: CutPool,
    pub(super) tree: SearchTree,
    pub(super) bounds: BoundManager,
    pub(super) branching: BranchingEngine,
    pub(super) stats: SolveStats,
    pub(super) interrupt: Arc<AtomicBool>,
    pub(super) start: Instant,

    /// Number of relaxation rows of each constraint in the oracle.
    lp_rows: HashMap<ConsId, usize>,

    /// Rows of cuts deactivated by the pool, removed before the next solve
    /// so the tableau of the last solve stays available to separators.
    stale_cut_rows: Vec<RowKey>,
}

impl<'s> SolverContext<'s> {
    /// Set up domains, locks, handlers and the initial relaxation.
    pub(super) fn new(
        model: Model,
        settings: &'s CipSettings,
        plugins: &'s mut Plugins,
        mut oracle: Box<dyn RelaxationOracle>,
        interrupt: Arc<AtomicBool>,
    ) -> CipResult<Self> {
        let start = Instant::now();
        let Model {
            mut problem,
            linear,
            sos1,
            custom,
            conss,
            implications,
            ..
        } = model;

        for i in 0..problem.num_vars() {
            let var = problem.var(VarId(i));
            if var.var_type == VarType::Integer && var.lb >= 0.0 && var.ub <= 1.0 {
                problem.change_var_type(VarId(i), VarType::Binary)?;
            }
        }

        let mut handlers: Vec<Box<dyn ConstraintHandler>> = Vec::with_capacity(2 + custom.len());
        handlers.push(Box::new(linear));
        handlers.push(Box::new(sos1));
        handlers.extend(custom);

        let n = problem.num_vars();
        let vars = problem.vars();
        let domains = DomainStore::new(
            vars.iter().map(|v| v.lb).collect(),
            vars.iter().map(|v| v.ub).collect(),
            vars.iter().map(|v| v.var_type.is_integral()).collect(),
            settings.feas_tol,
        );

        let mut locks = LockTable::new(n);
        let mut propagation = PropagationEngine::new(&handlers, n, settings.max_propagation_rounds);
        let active: Vec<ConsId> = conss.all_active().collect();
        for &c in &active {
            let h = conss.handler(c);
            let var_locks = handlers[h.0].lock_variables(conss.local_index(c));
            locks.add(&var_locks)?;
            propagation.watch(h, &var_locks)?;
        }

        let columns: Vec<ColumnData> = (0..n)
            .map(|j| ColumnData {
                var: VarId(j),
                obj: problem.internal_obj(VarId(j)),
                entries: Vec::new(),
            })
            .collect();
        oracle.add_columns(&columns)?;

        // Cuts combining modifiable rows lose validity once columns are priced
        let modifiable = active
            .iter()
            .any(|&c| handlers[conss.handler(c).0].is_modifiable(conss.local_index(c)));
        let mut builtin_separators: Vec<Box<dyn Separator>> = Vec::new();
        if settings.gomory_cuts && modifiable {
            log::debug!("gomory cuts disabled: model has modifiable constraints");
        } else if settings.gomory_cuts {
            builtin_separators.push(Box::new(GomorySeparator::new(
                settings.gomory_max_cuts,
                settings.gomory_max_depth,
            )));
        }
        let mut builtin_heuristics: Vec<Box<dyn Heuristic>> = Vec::new();
        if settings.heuristics {
            builtin_heuristics.push(Box::new(SimpleRounding::new()));
        }

        let obj_limit = problem
            .obj_limit()
            .map_or(f64::INFINITY, |limit| problem.internal(limit));

        let mut ctx = Self {
            settings,
            plugins,
            builtin_separators,
            builtin_heuristics,
            problem,
            handlers,
            conss,
            implications,
            domains,
            locks,
            propagation,
            oracle,
            pool: CutPool::new(CutPoolSettings {
                cleanup_freq: settings.cut_cleanup_freq,
                ..Default::default()
            }),
            tree: SearchTree::new(settings.node_selection),
            bounds: BoundManager::new(obj_limit, settings.feas_tol),
            branching: BranchingEngine::new(settings.branching_rule, n, settings.int_feas_tol),
            stats: SolveStats::default(),
            interrupt,
            start,
            lp_rows: HashMap::new(),
            stale_cut_rows: Vec::new(),
        };
        for c in active {
            ctx.add_cons_rows(c)?;
        }

        log::debug!(
            "{}: {} variables, {} constraints, {} relaxation rows, oracle '{}'",
            ctx.problem.name,
            n,
            ctx.conss.len(),
            ctx.oracle.num_rows(),
            ctx.oracle.name()
        );
        Ok(ctx)
    }

    /// Milliseconds since the solve started.
    pub(super) fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    // === Relaxation rows ===

    /// Add the relaxation rows of a constraint.
    pub(super) fn add_cons_rows(&mut self, id: ConsId) -> CipResult<()> {
        let h = self.conss.handler(id);
        let rows = self.handlers[h.0].initial_rows(self.conss.local_index(id));
        if rows.is_empty() {
            return Ok(());
        }
        let keyed: Vec<(RowKey, Row)> = rows
            .into_iter()
            .enumerate()
            .map(|(k, row)| (RowKey::Constraint(id, k), row))
            .collect();
        self.oracle.add_rows(&keyed)?;
        self.lp_rows.insert(id, keyed.len());
        Ok(())
    }

    /// Remove the relaxation rows of a constraint.
    pub(super) fn remove_cons_rows(&mut self, id: ConsId) -> CipResult<()> {
        if let Some(n) = self.lp_rows.remove(&id) {
            let keys: Vec<RowKey> = (0..n).map(|k| RowKey::Constraint(id, k)).collect();
            self.oracle.remove_rows(&keys)?;
        }
        Ok(())
    }

    /// Bring the relaxation rows in line with a path switch.
    pub(super) fn sync_rows(&mut self, delta: &ActivationDelta) -> CipResult<()> {
        for &id in &delta.deactivated {
            self.remove_cons_rows(id)?;
        }
        for &id in &delta.activated {
            self.add_cons_rows(id)?;
        }
        Ok(())
    }

    /// Put an active pool cut into the relaxation.
    pub(super) fn add_cut_row(&mut self, id: usize) -> CipResult<()> {
        let Some(pooled) = self.pool.get(id) else {
            return Err(CipError::InternalError(format!("cut {} is not in the pool", id)));
        };
        let key = RowKey::Cut(id);
        let row = pooled.cut.row.clone();
        self.stale_cut_rows.retain(|k| *k != key);
        self.oracle.add_rows(&[(key, row)])
    }

    /// Schedule rows of cuts the pool deactivated for removal.
    pub(super) fn retire_cut_rows(&mut self, ids: &[usize]) {
        self.stale_cut_rows.extend(ids.iter().map(|&id| RowKey::Cut(id)));
    }

    /// Remove scheduled cut rows.
    pub(super) fn flush_stale_rows(&mut self) -> CipResult<()> {
        if self.stale_cut_rows.is_empty() {
            return Ok(());
        }
        let keys = std::mem::take(&mut self.stale_cut_rows);
        self.oracle.remove_rows(&keys)
    }

    /// Turn a local cut into a linear constraint of `node`.
    pub(super) fn add_local_cut(&mut self, node: NodeId, cut: Cut) -> CipResult<ConsId> {
        let h = HandlerId::LINEAR;
        let local = self.handlers[h.0]
            .add_row(&cut.name, cut.row, false)
            .ok_or_else(|| CipError::InternalError("linear handler rejected a cut".into()))?;
        let id = self.conss.add(h, local, Scope::Local(node))?;
        let var_locks = self.handlers[h.0].lock_variables(local);
        self.locks.add(&var_locks)?;
        self.propagation.watch(h, &var_locks)?;
        self.add_cons_rows(id)?;
        Ok(id)
    }

    /// Add a priced column as a new variable everywhere: problem, domains,
    /// constraint handlers, locks and relaxation.
    pub(super) fn add_priced_column(&mut self, pricer: &str, col: PricedColumn) -> CipResult<VarId> {
        for &(cons, coef) in &col.coefs {
            if cons.0 >= self.conss.len() || self.conss.is_deleted(cons) || !coef.is_finite() {
                return Err(CipError::plugin(
                    pricer,
                    format!("column '{}' has invalid coefficient {} in {}", col.name, coef, cons),
                ));
            }
            let h = self.conss.handler(cons);
            if !self.handlers[h.0].is_modifiable(self.conss.local_index(cons)) {
                return Err(CipError::plugin(
                    pricer,
                    format!("column '{}' enters {}, which is not modifiable", col.name, cons),
                ));
            }
        }

        let var = self
            .problem
            .add_var(col.name.as_str(), col.var_type, col.lb, col.ub, col.obj)
            .map_err(|e| CipError::plugin(pricer, e.to_string()))?;
        let (lb, ub, integral) = {
            let v = self.problem.var(var);
            (v.lb, v.ub, v.var_type.is_integral())
        };
        let dvar = self.domains.add_variable(lb, ub, integral)?;
        if dvar != var {
            return Err(CipError::InternalError(format!(
                "domain store and problem disagree on column {}",
                var
            )));
        }

        let mut entries = Vec::with_capacity(col.coefs.len());
        for &(cons, coef) in &col.coefs {
            let h = self.conss.handler(cons);
            let local = self.conss.local_index(cons);
            self.handlers[h.0].add_coefficient(local, var, coef)?;

            let var_locks: Vec<_> = self.handlers[h.0]
                .lock_variables(local)
                .into_iter()
                .filter(|l| l.var == var)
                .collect();
            self.locks.add(&var_locks)?;
            self.propagation.watch(h, &var_locks)?;

            if self.lp_rows.contains_key(&cons) {
                entries.push((RowKey::Constraint(cons, 0), coef));
            }
        }
        self.oracle.add_columns(&[ColumnData {
            var,
            obj: self.problem.internal_obj(var),
            entries,
        }])?;
        self.stats.columns_added += 1;
        log::debug!("pricer '{}' added column '{}'", pricer, col.name);
        Ok(var)
    }

    // === Solutions ===

    /// Whether all branchable variables are integral in `x`.
    pub(super) fn is_integral(&self, x: &[f64]) -> bool {
        let tol = self.settings.int_feas_tol;
        self.problem
            .branchable_vars()
            .iter()
            .all(|v| (x[v.0] - x[v.0].round()).abs() <= tol)
    }

    /// Whether `x` satisfies the active constraints (only global ones if
    /// `global_only`).
    pub(super) fn satisfies_constraints(&self, x: &[f64], global_only: bool) -> bool {
        self.handlers.iter().enumerate().all(|(h, handler)| {
            let id = HandlerId(h);
            let result = if global_only {
                let locals: Vec<usize> = self
                    .conss
                    .active(id)
                    .iter()
                    .filter(|&&c| self.conss.scope(c) == Scope::Global)
                    .map(|&c| self.conss.local_index(c))
                    .collect();
                handler.check(&locals, x, self.settings.feas_tol)
            } else {
                handler.check(self.conss.active_locals(id), x, self.settings.feas_tol)
            };
            result.feasible
        })
    }

    /// Check a solution from a heuristic against global bounds,
    /// integrality and all global constraints, then offer it.
    pub(super) fn try_solution(&mut self, x: &[f64]) -> CipResult<bool> {
        if x.len() != self.problem.num_vars() {
            return Ok(false);
        }
        let tol = self.settings.feas_tol;
        let in_bounds = (0..x.len()).all(|j| {
            let v = VarId(j);
            x[j].is_finite()
                && x[j] >= self.domains.global_lb(v) - tol
                && x[j] <= self.domains.global_ub(v) + tol
                && (!self.problem.is_integral(v)
                    || (x[j] - x[j].round()).abs() <= self.settings.int_feas_tol)
        });
        if !in_bounds || !self.satisfies_constraints(x, true) {
            return Ok(false);
        }
        self.report_solution(x)
    }

    /// Offer a feasible solution to the bound manager. On improvement,
    /// dominated open nodes are pruned.
    pub(super) fn report_solution(&mut self, x: &[f64]) -> CipResult<bool> {
        let obj = self.problem.internal_value(x);
        if !self.bounds.report_feasible_solution(x, obj) {
            return Ok(false);
        }
        self.tree.set_has_incumbent(true);
        let bounds = &self.bounds;
        let pruned = self.tree.prune_dominated(|b| bounds.is_node_prunable(b))?;

        if self.settings.verbose {
            log::info!(
                "New incumbent: obj={:.6e}, pruned {} nodes",
                self.problem.external(obj),
                pruned
            );
        }
        Ok(true)
    }

    /// Free the local constraints of nodes removed from the tree.
    pub(super) fn release_nodes(&mut self) -> CipResult<()> {
        let released: Vec<NodeId> = self.tree.drain_released().collect();
        for node in released {
            for id in self.conss.release_node(node) {
                self.remove_cons_rows(id)?;
                let h = self.conss.handler(id);
                self.handlers[h.0].delete(self.conss.local_index(id));
            }
        }
        Ok(())
    }
}
