//! Branching variable selection and child construction.

use super::pseudocost::{BranchDir, PseudocostTable};
use super::{BranchCandidate, BranchingDecision, BranchingRulePlugin, ChildSpec};
use crate::constraint::ConsBranching;
use crate::domain::{BoundChange, DomainStore};
use crate::error::{CipError, CipResult};
use crate::model::VarId;
use crate::settings::BranchingRule;

/// Branching engine.
///
/// Candidates are examined in increasing variable order and only a strictly
/// better score replaces the current choice, so ties go to the lowest
/// variable index.
pub struct BranchingEngine {
    /// Built-in scoring rule.
    rule: BranchingRule,

    /// User scoring rule (replaces the built-in one when set).
    plugin: Option<Box<dyn BranchingRulePlugin>>,

    /// Pseudocost statistics.
    pseudocosts: PseudocostTable,

    /// Integrality tolerance.
    int_tol: f64,
}

impl BranchingEngine {
    /// Create a new branching engine.
    pub fn new(rule: BranchingRule, num_vars: usize, int_tol: f64) -> Self {
        Self {
            rule,
            plugin: None,
            pseudocosts: PseudocostTable::new(num_vars),
            int_tol,
        }
    }

    /// Use a user scoring rule.
    pub fn set_plugin(&mut self, plugin: Box<dyn BranchingRulePlugin>) {
        self.plugin = Some(plugin);
    }

    /// Remove the user scoring rule.
    pub fn take_plugin(&mut self) -> Option<Box<dyn BranchingRulePlugin>> {
        self.plugin.take()
    }

    /// Pseudocost statistics.
    pub fn pseudocosts(&self) -> &PseudocostTable {
        &self.pseudocosts
    }

    /// Fractional candidates among `vars`, in increasing variable order.
    pub fn candidates(&self, vars: &[VarId], x: &[f64]) -> Vec<BranchCandidate> {
        let mut out: Vec<BranchCandidate> = vars
            .iter()
            .filter_map(|&var| {
                let value = x[var.0];
                let frac = value - value.floor();
                (frac > self.int_tol && frac < 1.0 - self.int_tol).then_some(BranchCandidate { var, value, frac })
            })
            .collect();
        out.sort_by_key(|c| c.var);
        out
    }

    /// Select a fractional variable and build floor/ceil children.
    ///
    /// Returns `None` if no candidate is fractional.
    pub fn select_branching(
        &mut self,
        node_bound: f64,
        vars: &[VarId],
        x: &[f64],
        domains: &DomainStore,
        nodes_processed: u64,
    ) -> CipResult<Option<BranchingDecision>> {
        let candidates = self.candidates(vars, x);
        if candidates.is_empty() {
            return Ok(None);
        }

        let scores = self.score(&candidates, nodes_processed)?;
        let mut best = 0;
        for k in 1..candidates.len() {
            if scores[k] > scores[best] {
                best = k;
            }
        }
        let cand = candidates[best];
        log::debug!(
            "branching on {} = {:.6} (score {:.3e}, {} candidates)",
            cand.var,
            cand.value,
            scores[best],
            candidates.len()
        );
        Ok(Some(self.variable_dichotomy(node_bound, cand, domains)))
    }

    fn score(&mut self, candidates: &[BranchCandidate], nodes_processed: u64) -> CipResult<Vec<f64>> {
        if let Some(plugin) = self.plugin.as_mut() {
            let scores = plugin.score(candidates, &self.pseudocosts);
            if scores.len() != candidates.len() || scores.iter().any(|s| s.is_nan()) {
                return Err(CipError::plugin(
                    plugin.name(),
                    format!("returned {} scores for {} candidates", scores.len(), candidates.len()),
                ));
            }
            return Ok(scores);
        }

        let use_pseudocost = match self.rule {
            BranchingRule::MostFractional => false,
            BranchingRule::Pseudocost => true,
            BranchingRule::Hybrid { switch_after_nodes } => nodes_processed >= switch_after_nodes,
        };
        Ok(candidates
            .iter()
            .map(|c| {
                if use_pseudocost {
                    self.pseudocosts.score(c.var, c.frac)
                } else {
                    c.frac.min(1.0 - c.frac)
                }
            })
            .collect())
    }

    /// Down child `x <= floor(v)`, up child `x >= ceil(v)`.
    fn variable_dichotomy(&self, node_bound: f64, cand: BranchCandidate, domains: &DomainStore) -> BranchingDecision {
        let var = cand.var;
        let down = BoundChange::down_branch(var, domains.ub(var), cand.value);
        let up = BoundChange::up_branch(var, domains.lb(var), cand.value);
        BranchingDecision {
            var: Some(cand),
            children: vec![
                ChildSpec {
                    changes: vec![down],
                    estimate: node_bound + self.pseudocosts.get(var, BranchDir::Down) * cand.frac,
                    dir: Some(BranchDir::Down),
                },
                ChildSpec {
                    changes: vec![up],
                    estimate: node_bound + self.pseudocosts.get(var, BranchDir::Up) * (1.0 - cand.frac),
                    dir: Some(BranchDir::Up),
                },
            ],
        }
    }

    /// Pick the best handler-provided branching.
    pub fn handler_branching(&self, node_bound: f64, options: Vec<ConsBranching>) -> Option<BranchingDecision> {
        let mut best: Option<ConsBranching> = None;
        for opt in options {
            if opt.children.len() < 2 {
                continue;
            }
            if best.as_ref().map_or(true, |b| opt.score > b.score) {
                best = Some(opt);
            }
        }
        best.map(|b| BranchingDecision {
            var: None,
            children: b
                .children
                .into_iter()
                .map(|changes| ChildSpec {
                    changes,
                    estimate: node_bound,
                    dir: None,
                })
                .collect(),
        })
    }

    /// Split the domain of the first unfixed integer variable.
    ///
    /// Used when no relaxation solution is available or when the solution is
    /// integral but infeasible and no handler offers a branching. The split
    /// point is the relaxation value if given, otherwise the domain midpoint.
    pub fn pseudo_branching(
        &self,
        node_bound: f64,
        vars: &[VarId],
        x: Option<&[f64]>,
        domains: &DomainStore,
    ) -> Option<BranchingDecision> {
        let mut sorted = vars.to_vec();
        sorted.sort();
        let var = sorted.into_iter().find(|&v| domains.ub(v) - domains.lb(v) >= 1.0 - self.int_tol)?;

        let (lb, ub) = (domains.lb(var), domains.ub(var));
        let guess = match x {
            Some(x) => x[var.0],
            None if lb.is_finite() && ub.is_finite() => 0.5 * (lb + ub),
            None if lb.is_finite() => lb,
            None if ub.is_finite() => ub,
            None => 0.0,
        };
        // Down child keeps [lb, s], up child [s + 1, ub]
        let s = guess.clamp(lb, ub - 1.0).floor();
        log::debug!("pseudo branching on {} at {}", var, s);

        Some(BranchingDecision {
            var: None,
            children: vec![
                ChildSpec {
                    changes: vec![BoundChange::upper(var, ub, s)],
                    estimate: node_bound,
                    dir: None,
                },
                ChildSpec {
                    changes: vec![BoundChange::lower(var, lb, s + 1.0)],
                    estimate: node_bound,
                    dir: None,
                },
            ],
        })
    }

    /// Record the objective gain observed in a child.
    pub fn update_pseudocosts(&mut self, cand: BranchCandidate, dir: BranchDir, gain: f64) {
        let distance = match dir {
            BranchDir::Down => cand.frac,
            BranchDir::Up => 1.0 - cand.frac,
        };
        self.pseudocosts.update(cand.var, dir, gain, distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoundKind;

    fn domains(n: usize) -> DomainStore {
        DomainStore::new(vec![0.0; n], vec![5.0; n], vec![true; n], 1e-6)
    }

    fn vars(n: usize) -> Vec<VarId> {
        (0..n).map(VarId).collect()
    }

    #[test]
    fn test_most_fractional() {
        let mut engine = BranchingEngine::new(BranchingRule::MostFractional, 4, 1e-6);
        let x = [1.0, 2.3, 0.5, 3.7];
        let d = engine
            .select_branching(0.0, &vars(4), &x, &domains(4), 0)
            .unwrap()
            .unwrap();
        assert_eq!(d.var.unwrap().var, VarId(2));
        assert_eq!(d.children.len(), 2);
        assert_eq!(d.children[0].changes[0].kind, BoundKind::Upper);
        assert_eq!(d.children[0].changes[0].new, 0.0);
        assert_eq!(d.children[1].changes[0].new, 1.0);
    }

    #[test]
    fn test_tie_goes_to_lower_index() {
        let mut engine = BranchingEngine::new(BranchingRule::MostFractional, 4, 1e-6);
        let x = [0.0, 1.5, 2.0, 0.5];
        let order = [VarId(3), VarId(1), VarId(0)];
        let d = engine.select_branching(0.0, &order, &x, &domains(4), 0).unwrap().unwrap();
        assert_eq!(d.var.unwrap().var, VarId(1));
    }

    #[test]
    fn test_integral_has_no_candidate() {
        let mut engine = BranchingEngine::new(BranchingRule::Pseudocost, 2, 1e-6);
        let x = [1.0, 2.0 + 1e-8];
        assert!(engine.select_branching(0.0, &vars(2), &x, &domains(2), 0).unwrap().is_none());
    }

    #[test]
    fn test_pseudocost_rule_uses_history() {
        let mut engine = BranchingEngine::new(BranchingRule::Pseudocost, 2, 1e-6);
        // x0 has no history and falls back to the average unit gain of 10
        let x = [0.05, 0.4];
        let c1 = BranchCandidate { var: VarId(1), value: 0.4, frac: 0.4 };
        engine.update_pseudocosts(c1, BranchDir::Down, 4.0);
        engine.update_pseudocosts(c1, BranchDir::Up, 6.0);
        let d = engine.select_branching(0.0, &vars(2), &x, &domains(2), 0).unwrap().unwrap();
        assert_eq!(d.var.unwrap().var, VarId(1));
        // Estimates: bound + pseudocost * distance
        assert!((d.children[0].estimate - 4.0).abs() < 1e-9);
        assert!((d.children[1].estimate - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_plugin_fault() {
        struct Broken;
        impl BranchingRulePlugin for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn score(&mut self, _: &[BranchCandidate], _: &PseudocostTable) -> Vec<f64> {
                vec![1.0]
            }
        }
        let mut engine = BranchingEngine::new(BranchingRule::MostFractional, 2, 1e-6);
        engine.set_plugin(Box::new(Broken));
        let err = engine.select_branching(0.0, &vars(2), &[0.5, 0.5], &domains(2), 0);
        assert!(matches!(err, Err(CipError::PluginFault { .. })));
    }

    #[test]
    fn test_pseudo_branching_splits_domain() {
        let engine = BranchingEngine::new(BranchingRule::MostFractional, 2, 1e-6);
        let mut d = domains(2);
        d.tighten(VarId(0), BoundKind::Lower, 5.0, crate::domain::Reason::Global).unwrap();

        let dec = engine.pseudo_branching(0.0, &vars(2), None, &d).unwrap();
        let down = dec.children[0].changes[0];
        let up = dec.children[1].changes[0];
        assert_eq!(down.var, VarId(1));
        assert_eq!((down.kind, down.new), (BoundKind::Upper, 2.0));
        assert_eq!((up.kind, up.new), (BoundKind::Lower, 3.0));

        d.tighten(VarId(1), BoundKind::Upper, 0.0, crate::domain::Reason::Global).unwrap();
        assert!(engine.pseudo_branching(0.0, &vars(2), None, &d).is_none());
    }
}
