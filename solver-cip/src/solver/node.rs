//! Processing of one search node.

use super::context::SolverContext;
use crate::constraint::{HandlerId, SeparationContext};
use crate::cuts::{run_rounds, Cut, PricingRound, RoundDriver, RoundLimits, RoundOutcome, SeparationRound};
use crate::error::{CipError, CipResult};
use crate::heuristics::HeuristicContext;
use crate::model::VarId;
use crate::pricing::PricingContext;
use crate::relaxation::{RelaxationResult, RelaxationStatus, RowKey};
use crate::search::{BranchInfo, NodeId, PruneReason};

/// What the main loop does after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum NodeResult {
    /// Continue with the next node.
    Continue,
    /// The problem was proven unbounded.
    Unbounded,
}

impl SolverContext<'_> {
    /// Process the focus node: restore its domain, propagate, run the
    /// relaxation rounds, then prune it, record a solution or branch.
    pub(super) fn process_node(&mut self, id: NodeId) -> CipResult<NodeResult> {
        let path = self.tree.path_to(id)?;
        let depth = path.len() - 1;

        let tree = &self.tree;
        let replay_ok = self.domains.restore_to_node(&path, |n| tree.delta(n))?;
        let delta = self.conss.switch_path(&path)?;
        self.sync_rows(&delta)?;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        if !replay_ok {
            log::debug!("node {}: bound changes conflict on replay", id);
            return self.close(id, PruneReason::Infeasible);
        }
        let replayed = self.domains.focus_delta().len();

        let outcome = self.propagation.propagate_to_fixpoint(
            &mut self.handlers,
            &self.conss,
            &mut self.domains,
            &self.implications,
        )?;
        self.stats.domain_reductions += outcome.reductions as u64;
        if outcome.cutoff {
            log::debug!("node {}: propagation cutoff", id);
            return self.close(id, PruneReason::Infeasible);
        }
        if depth == 0 {
            self.compact_fixed_vars();
        }

        let (node_bound, parent, branch) = match self.tree.node(id) {
            Some(n) => (n.dual_bound, n.parent, n.branch),
            None => return Err(CipError::InternalError(format!("node {} vanished", id))),
        };
        if let Some(basis) = parent.and_then(|p| self.tree.node(p)).and_then(|p| p.basis.clone()) {
            self.oracle.restore_basis(&basis);
        }

        let limits = RoundLimits {
            max_rounds: if depth == 0 {
                self.settings.max_cut_rounds_root
            } else {
                self.settings.max_cut_rounds_per_node
            },
            max_pricing_rounds: self.settings.max_pricing_rounds,
            pricing: self.settings.pricing_enabled && !self.plugins.pricers.is_empty(),
        };
        let mut driver = NodeDriver {
            ctx: self,
            node: id,
            depth,
            node_bound,
            pricer_bound: f64::NEG_INFINITY,
            branch,
            lp: None,
        };
        let (outcome, round_stats) = run_rounds(&mut driver, &limits)?;
        let valid_lp = matches!(
            outcome,
            RoundOutcome::Feasible | RoundOutcome::Fractional | RoundOutcome::BoundExceeded
        );
        let bound = if valid_lp {
            driver.current_bound()
        } else {
            node_bound.max(driver.pricer_bound)
        };
        let lp = driver.lp.take();

        log::debug!(
            "node {} (depth {}): {:?}, bound {:.6e}, {} solves, {} rounds, {} cuts",
            id,
            depth,
            outcome,
            bound,
            round_stats.lp_solves,
            round_stats.rounds,
            round_stats.cuts_added
        );

        if let Some(node) = self.tree.node_mut(id) {
            node.raise_bound(bound);
        }
        let new_changes = self.domains.focus_delta()[replayed..].to_vec();
        self.tree.record_changes(id, &new_changes)?;

        match (outcome, lp) {
            (RoundOutcome::Unbounded, _) => {
                log::info!("relaxation at node {} is unbounded, problem is unbounded", id);
                Ok(NodeResult::Unbounded)
            }
            (RoundOutcome::Infeasible | RoundOutcome::Cutoff, _) => self.close(id, PruneReason::Infeasible),
            (RoundOutcome::BoundExceeded, _) => self.close(id, PruneReason::BoundExceeded),
            (RoundOutcome::Feasible, Some(lp)) => {
                self.report_solution(&lp.x)?;
                self.close(id, PruneReason::Solved)
            }
            (RoundOutcome::Fractional, Some(lp)) => self.branch(id, bound, &lp),
            (RoundOutcome::Unreliable, _) | (_, None) => self.branch_unreliable(id, bound),
        }
    }

    fn close(&mut self, id: NodeId, reason: PruneReason) -> CipResult<NodeResult> {
        self.stats.nodes_pruned += 1;
        self.tree.prune(id, reason)?;
        Ok(NodeResult::Continue)
    }

    /// Drop variables fixed by root propagation from the type partitions.
    fn compact_fixed_vars(&mut self) {
        let fixed: Vec<VarId> = self
            .problem
            .order()
            .iter()
            .copied()
            .filter(|&v| self.domains.is_globally_fixed(v))
            .collect();
        for v in fixed {
            self.problem.compact_fixed(v);
        }
    }

    /// Run primal heuristics on a relaxation solution.
    fn run_heuristics(&mut self, x: &[f64]) -> CipResult<()> {
        let ctx = HeuristicContext {
            x,
            domains: &self.domains,
            locks: &self.locks,
            int_tol: self.settings.int_feas_tol,
        };
        let mut proposals = Vec::new();
        let heuristics = self
            .builtin_heuristics
            .iter_mut()
            .chain(self.plugins.heuristics.iter_mut());
        for heur in heuristics {
            if let Some(sol) = heur.find(&ctx)? {
                if sol.len() != x.len() {
                    return Err(CipError::plugin(
                        heur.name(),
                        format!("solution has {} values for {} variables", sol.len(), x.len()),
                    ));
                }
                proposals.push((heur.name().to_string(), sol));
            }
        }

        for (name, sol) in proposals {
            if self.try_solution(&sol)? {
                self.stats.heuristic_solutions += 1;
                log::debug!("heuristic '{}' improved the incumbent", name);
            }
        }
        Ok(())
    }

    /// Branch on a fractional (or integral but infeasible) relaxation
    /// solution.
    fn branch(&mut self, id: NodeId, bound: f64, lp: &RelaxationResult) -> CipResult<NodeResult> {
        if !self.builtin_heuristics.is_empty() || !self.plugins.heuristics.is_empty() {
            self.run_heuristics(&lp.x)?;
            if self.bounds.is_node_prunable(bound) {
                return self.close(id, PruneReason::BoundExceeded);
            }
        }

        let vars = self.problem.branchable_vars().to_vec();
        let mut decision = self.branching.select_branching(
            bound,
            &vars,
            &lp.x,
            &self.domains,
            self.stats.nodes_processed,
        )?;
        if decision.is_none() {
            let mut options = Vec::new();
            for (h, handler) in self.handlers.iter().enumerate() {
                let active = self.conss.active_locals(HandlerId(h));
                if !active.is_empty() {
                    options.extend(handler.branching_candidates(active, &lp.x, &self.domains));
                }
            }
            decision = self
                .branching
                .handler_branching(bound, options)
                .or_else(|| self.branching.pseudo_branching(bound, &vars, Some(&lp.x), &self.domains));
        }

        let Some(decision) = decision else {
            log::warn!(
                "node {}: solution is integral but infeasible and no branching is possible",
                id
            );
            self.stats.unreliable_nodes += 1;
            self.tree.mark_unresolved(id)?;
            return Ok(NodeResult::Continue);
        };

        let basis = self.oracle.save_basis();
        self.tree.push_children(id, decision, lp.objective, basis)?;
        self.stats.nodes_branched += 1;
        Ok(NodeResult::Continue)
    }

    /// Branch on the pseudo solution of a node whose relaxation failed,
    /// keeping the node in the proof when that is impossible.
    fn branch_unreliable(&mut self, id: NodeId, bound: f64) -> CipResult<NodeResult> {
        self.stats.unreliable_nodes += 1;
        let vars = self.problem.branchable_vars().to_vec();
        match self.branching.pseudo_branching(bound, &vars, None, &self.domains) {
            Some(decision) => {
                log::warn!("node {}: relaxation unreliable, branching on pseudo solution", id);
                self.tree.push_children(id, decision, bound, None)?;
                self.stats.nodes_branched += 1;
            }
            None => {
                log::warn!("node {}: relaxation unreliable and no branching possible, node kept unresolved", id);
                self.tree.mark_unresolved(id)?;
            }
        }
        Ok(NodeResult::Continue)
    }
}

/// [`RoundDriver`] over the focus node.
struct NodeDriver<'a, 's> {
    ctx: &'a mut SolverContext<'s>,
    node: NodeId,
    depth: usize,

    /// Bound inherited by the node.
    node_bound: f64,

    /// Best relaxation bound reported by pricers at the current solution.
    pricer_bound: f64,

    /// Branching provenance; taken after the first solve for the
    /// pseudocost update.
    branch: Option<BranchInfo>,

    /// Last relaxation result.
    lp: Option<RelaxationResult>,
}

impl NodeDriver<'_, '_> {
    /// Node bound including the current relaxation value.
    fn current_bound(&self) -> f64 {
        let lp_bound = self
            .lp
            .as_ref()
            .filter(|r| r.status == RelaxationStatus::Optimal)
            .map_or(f64::NEG_INFINITY, |r| r.objective);
        self.node_bound.max(lp_bound).max(self.pricer_bound)
    }

    fn solve_once(&mut self) -> CipResult<RelaxationResult> {
        let ctx = &mut *self.ctx;
        let result = ctx.oracle.solve()?;
        ctx.stats.lp_solves += 1;
        ctx.stats.lp_iterations += result.iterations as u64;
        Ok(result)
    }
}

impl RoundDriver for NodeDriver<'_, '_> {
    fn solve_relaxation(&mut self) -> CipResult<RelaxationStatus> {
        {
            let ctx = &mut *self.ctx;
            ctx.flush_stale_rows()?;
            ctx.oracle.set_bounds(ctx.domains.lbs(), ctx.domains.ubs())?;
        }
        let mut result = self.solve_once()?;
        if matches!(
            result.status,
            RelaxationStatus::NumericalError | RelaxationStatus::LimitReached
        ) {
            log::warn!(
                "node {}: relaxation returned {:?}, retrying from scratch",
                self.node,
                result.status
            );
            self.ctx.oracle.clear_basis();
            self.ctx.stats.lp_retries += 1;
            result = self.solve_once()?;
        }

        let status = result.status;
        if status == RelaxationStatus::Optimal {
            let ctx = &mut *self.ctx;
            let duals: Vec<(usize, f64)> = ctx
                .pool
                .active_cuts()
                .map(|c| (c.id, result.dual(RowKey::Cut(c.id))))
                .collect();
            let retired = ctx.pool.update_activity(&duals);
            ctx.retire_cut_rows(&retired);

            if let Some(info) = self.branch.take() {
                let gain = result.objective - info.parent_lp;
                ctx.branching.update_pseudocosts(info.cand, info.dir, gain);
            }
            self.pricer_bound = f64::NEG_INFINITY;
        }
        self.lp = Some(result);
        Ok(status)
    }

    fn price(&mut self) -> CipResult<PricingRound> {
        let Some(lp) = self.lp.as_ref() else {
            return Ok(PricingRound::default());
        };
        let ctx = &mut *self.ctx;
        let pctx = PricingContext::new(
            &lp.x,
            lp.objective,
            ctx.problem.sense().sign(),
            &ctx.domains,
            self.depth,
            &lp.duals,
        );

        let mut columns = Vec::new();
        for pricer in ctx.plugins.pricers.iter_mut() {
            let result = pricer.generate_columns(&pctx)?;
            if let Some(lb) = result.lower_bound {
                if lb.is_nan() {
                    return Err(CipError::plugin(pricer.name(), "lower bound is NaN"));
                }
                self.pricer_bound = self.pricer_bound.max(lb);
            }
            let name = pricer.name().to_string();
            columns.extend(result.columns.into_iter().map(|c| (name.clone(), c)));
        }

        let columns_added = columns.len();
        for (pricer, col) in columns {
            ctx.add_priced_column(&pricer, col)?;
        }
        Ok(PricingRound { columns_added })
    }

    fn bound_exceeded(&self) -> bool {
        self.ctx.bounds.is_node_prunable(self.current_bound())
    }

    fn relaxation_feasible(&mut self) -> CipResult<bool> {
        let Some(lp) = self.lp.as_ref() else {
            return Ok(false);
        };
        Ok(self.ctx.is_integral(&lp.x) && self.ctx.satisfies_constraints(&lp.x, false))
    }

    fn separate(&mut self, enforce_only: bool) -> CipResult<SeparationRound> {
        let Some(lp) = self.lp.as_ref() else {
            return Ok(SeparationRound::default());
        };
        let x = lp.x.as_slice();
        let ctx = &mut *self.ctx;
        let sctx = SeparationContext {
            x,
            domains: &ctx.domains,
            depth: self.depth,
            feas_tol: ctx.settings.feas_tol,
        };

        let mut cuts: Vec<Cut> = Vec::new();
        for (h, handler) in ctx.handlers.iter_mut().enumerate() {
            let active = ctx.conss.active_locals(HandlerId(h));
            if !active.is_empty() {
                cuts.extend(handler.separate(active, &sctx)?);
            }
        }
        let mut reactivated = Vec::new();
        if !enforce_only {
            let separators = ctx
                .builtin_separators
                .iter_mut()
                .chain(ctx.plugins.separators.iter_mut());
            for sep in separators {
                cuts.extend(sep.separate(&sctx, ctx.oracle.as_ref())?);
            }
            reactivated = ctx.pool.separate_inactive(x, ctx.settings.cut_violation_tol);
        }

        let tol = ctx.settings.cut_violation_tol;
        let mut scored = Vec::with_capacity(cuts.len());
        for cut in cuts {
            if !cut.row.is_valid() {
                return Err(CipError::plugin(&cut.source, format!("cut '{}' is malformed", cut.name)));
            }
            let efficacy = cut.efficacy(x);
            if efficacy > tol {
                scored.push((efficacy, cut));
            }
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(ctx.settings.cuts_per_round);

        let mut round = SeparationRound::default();
        for id in reactivated {
            ctx.add_cut_row(id)?;
            round.cuts_added += 1;
        }
        for (_, cut) in scored {
            if cut.local && self.depth > 0 {
                ctx.add_local_cut(self.node, cut)?;
                round.local_added += 1;
            } else {
                let (id, duplicate) = ctx.pool.add(cut);
                if duplicate {
                    continue;
                }
                ctx.add_cut_row(id)?;
            }
            round.cuts_added += 1;
        }
        ctx.stats.cuts_added += round.cuts_added as u64;
        Ok(round)
    }

    fn propagate(&mut self) -> CipResult<bool> {
        let ctx = &mut *self.ctx;
        let outcome = ctx.propagation.propagate_to_fixpoint(
            &mut ctx.handlers,
            &ctx.conss,
            &mut ctx.domains,
            &ctx.implications,
        )?;
        ctx.stats.domain_reductions += outcome.reductions as u64;
        Ok(!outcome.cutoff)
    }
}
