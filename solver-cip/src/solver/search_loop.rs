//! Main loop: pop, process, update bounds, stop on exhaustion or limits.

use std::sync::atomic::Ordering;

use super::context::SolverContext;
use super::node::NodeResult;
use crate::error::CipResult;
use crate::model::{CipSolution, CipStatus, VarId};

impl SolverContext<'_> {
    /// Run the search to completion or to a limit.
    pub(super) fn run(&mut self) -> CipResult<CipSolution> {
        if self.domains.has_empty_domain() {
            log::info!("{}: a variable has an empty domain, problem is infeasible", self.problem.name);
            return Ok(self.finish(CipStatus::Infeasible));
        }
        self.tree.create_root(f64::NEG_INFINITY)?;

        let status = loop {
            if let Some(status) = self.check_limits() {
                break status;
            }

            let bounds = &self.bounds;
            let Some(node) = self.tree.pop_next(|b| bounds.is_node_prunable(b))? else {
                break self.exhausted_status();
            };
            self.stats.nodes_processed += 1;

            let result = self.process_node(node)?;
            self.release_nodes()?;
            if result == NodeResult::Unbounded {
                break CipStatus::Unbounded;
            }

            let lowest = self.tree.lowest_bound();
            self.bounds.update_dual_bound(lowest);
            debug_assert!(self.bounds.primal() >= self.bounds.dual());
            self.log_progress();
        };

        if self.settings.verbose {
            log::info!(
                "{} after {} nodes: primal {:.6e}, dual {:.6e}, {:.1}s",
                status,
                self.stats.nodes_processed,
                self.problem.external(self.bounds.primal()),
                self.problem.external(self.bounds.dual()),
                self.elapsed_ms() as f64 / 1000.0
            );
        }
        Ok(self.finish(status))
    }

    /// Status once no node is left.
    fn exhausted_status(&self) -> CipStatus {
        if self.tree.num_unresolved() > 0 {
            CipStatus::NumericalTrouble
        } else if self.bounds.has_incumbent() {
            CipStatus::Optimal
        } else {
            CipStatus::Infeasible
        }
    }

    /// Check stop signals. Checked once per node, before the pop.
    fn check_limits(&mut self) -> Option<CipStatus> {
        if self.tree.num_open() == 0 {
            return None;
        }
        if self.interrupt.load(Ordering::Relaxed) {
            return Some(CipStatus::Interrupted);
        }
        if let Some(limit) = self.settings.time_limit_ms {
            if self.elapsed_ms() >= limit {
                return Some(CipStatus::TimeLimit);
            }
        }
        if self.stats.nodes_processed >= self.settings.node_limit {
            return Some(CipStatus::NodeLimit);
        }
        if let Some(limit) = self.settings.max_open_nodes {
            if self.tree.num_open() > limit {
                return Some(CipStatus::OpenNodeLimit);
            }
        }
        if self
            .bounds
            .gap_closed(self.settings.gap_tol, self.settings.gap_abs_tol)
        {
            return Some(CipStatus::GapLimit);
        }
        None
    }

    /// Log progress (if verbose).
    fn log_progress(&mut self) {
        if !self.settings.verbose || self.stats.nodes_processed % self.settings.log_freq != 0 {
            return;
        }
        log::info!(
            "Nodes: {} ({} open) | Bound: {:.6e} | Incumbent: {:.6e} | Gap: {:.2}% | Cuts: {} | Time: {:.1}s",
            self.stats.nodes_processed,
            self.tree.num_open(),
            self.problem.external(self.bounds.dual()),
            self.problem.external(self.bounds.primal()),
            self.bounds.gap() * 100.0,
            self.stats.cuts_added,
            self.elapsed_ms() as f64 / 1000.0,
        );
    }

    /// Build the user-facing result.
    fn finish(&mut self, status: CipStatus) -> CipSolution {
        let problem = &self.problem;
        let x = self.bounds.solution().map(|x| {
            x.iter()
                .enumerate()
                .map(|(j, &v)| if problem.is_integral(VarId(j)) { v.round() } else { v })
                .collect()
        });

        let primal = self.bounds.primal();
        let dual = match status {
            CipStatus::Unbounded => f64::NEG_INFINITY,
            CipStatus::Infeasible => f64::INFINITY,
            _ => self.bounds.dual(),
        };
        let primal_bound = problem.external(primal);
        let dual_bound = problem.external(dual);

        let mut stats = self.stats.clone();
        stats.nodes_open = self.tree.num_open() as u64;
        stats.nodes_pruned += self.tree.pruned_by_bound();
        stats.incumbent_updates = self.bounds.updates();
        stats.solve_time_ms = self.elapsed_ms();

        CipSolution {
            status,
            x,
            primal_bound,
            dual_bound,
            gap: CipSolution::compute_gap(primal_bound, dual_bound),
            stats,
        }
    }
}
