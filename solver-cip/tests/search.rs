//! End-to-end tests of the branch-and-bound search.

use std::sync::atomic::Ordering;

use solver_cip::constraint::{CheckResult, ConsBranching, ConstraintHandler, PropagationResult, VarLock};
use solver_cip::domain::{BoundChange, DomainStore};
use solver_cip::propagation::PropagationContext;
use solver_cip::{
    solve, BranchingRule, CipError, CipResult, CipSettings, CipStatus, Heuristic, HeuristicContext, Model, NodeSelection,
    ObjSense, PricedColumn, Pricer, PricingContext, PricingResult, Solver, VarId, VarType,
};

fn plain() -> CipSettings {
    let mut settings = CipSettings::default().without_cuts();
    settings.heuristics = false;
    settings
}

/// min -x - y s.t. 2x + 2y <= 3, x, y binary. Root relaxation -1.5.
fn fractional_pair() -> Model {
    let mut model = Model::new("fractional_pair");
    let x = model.add_binary("x", -1.0).unwrap();
    let y = model.add_binary("y", -1.0).unwrap();
    model.add_linear("half", &[(x, 2.0), (y, 2.0)], f64::NEG_INFINITY, 3.0).unwrap();
    model
}

fn knapsack(weights: &[f64], values: &[f64], capacity: f64) -> Model {
    let mut model = Model::new("knapsack");
    model.set_sense(ObjSense::Maximize);
    let vars: Vec<VarId> = values
        .iter()
        .enumerate()
        .map(|(j, &v)| model.add_binary(format!("x{}", j), v).unwrap())
        .collect();
    let coefs: Vec<(VarId, f64)> = vars.iter().copied().zip(weights.iter().copied()).collect();
    model.add_linear("capacity", &coefs, f64::NEG_INFINITY, capacity).unwrap();
    model
}

fn knapsack_brute_force(weights: &[f64], values: &[f64], capacity: f64) -> f64 {
    let n = weights.len();
    let mut best = 0.0_f64;
    for mask in 0u32..(1 << n) {
        let (mut w, mut v) = (0.0, 0.0);
        for j in 0..n {
            if mask & (1 << j) != 0 {
                w += weights[j];
                v += values[j];
            }
        }
        if w <= capacity + 1e-9 {
            best = best.max(v);
        }
    }
    best
}

#[test]
fn test_single_binary_at_root() {
    let mut model = Model::new("single");
    model.add_binary("x", 1.0).unwrap();

    let sol = solve(model, &CipSettings::default()).unwrap();
    assert_eq!(sol.status, CipStatus::Optimal);
    assert!(sol.primal_bound.abs() < 1e-9);
    assert!(sol.dual_bound.abs() < 1e-9);
    assert_eq!(sol.stats.nodes_branched, 0);
    assert_eq!(sol.x.unwrap(), vec![0.0]);
}

#[test]
fn test_packing_pair() {
    let mut model = Model::new("pair");
    let x = model.add_binary("x", -1.0).unwrap();
    let y = model.add_binary("y", -1.0).unwrap();
    model.add_linear("pack", &[(x, 1.0), (y, 1.0)], f64::NEG_INFINITY, 1.0).unwrap();

    let sol = solve(model, &plain()).unwrap();
    assert_eq!(sol.status, CipStatus::Optimal);
    assert!((sol.primal_bound + 1.0).abs() < 1e-6);
    let x = sol.x.unwrap();
    assert!((x[0] + x[1] - 1.0).abs() < 1e-9);
}

#[test]
fn test_branching_required() {
    let sol = solve(fractional_pair(), &plain()).unwrap();
    assert_eq!(sol.status, CipStatus::Optimal);
    assert!((sol.primal_bound + 1.0).abs() < 1e-6);
    assert!((sol.dual_bound + 1.0).abs() < 1e-6);
    assert!(sol.stats.nodes_branched >= 1);
    assert!(sol.stats.nodes_processed >= 3);
    assert!(sol.gap < 1e-6);
}

#[test]
fn test_empty_domain_is_infeasible_without_lp() {
    let mut model = Model::new("empty");
    model.add_integer("x", 2.0, 1.0, 1.0).unwrap();

    let sol = solve(model, &CipSettings::default()).unwrap();
    assert_eq!(sol.status, CipStatus::Infeasible);
    assert_eq!(sol.stats.lp_solves, 0);
    assert!(sol.x.is_none());
    assert_eq!(sol.dual_bound, f64::INFINITY);
}

#[test]
fn test_infeasible_rows() {
    let mut model = Model::new("conflict");
    let x = model.add_binary("x", 1.0).unwrap();
    let y = model.add_binary("y", 1.0).unwrap();
    model.add_linear("at_least_three", &[(x, 1.0), (y, 1.0)], 3.0, f64::INFINITY).unwrap();

    let sol = solve(model, &CipSettings::default()).unwrap();
    assert_eq!(sol.status, CipStatus::Infeasible);
    assert!(!sol.has_solution());
}

#[test]
fn test_node_limit_keeps_root_bound() {
    let settings = plain().with_node_limit(1);
    let sol = solve(fractional_pair(), &settings).unwrap();
    assert_eq!(sol.status, CipStatus::NodeLimit);
    assert!(!sol.status.is_optimal());
    assert!(sol.status.is_limit());
    assert!((sol.dual_bound + 1.5).abs() < 1e-6);
    assert_eq!(sol.primal_bound, f64::INFINITY);
    assert_eq!(sol.stats.nodes_processed, 1);
}

#[test]
fn test_open_node_limit() {
    let settings = plain().with_max_open_nodes(1);
    let sol = solve(fractional_pair(), &settings).unwrap();
    assert_eq!(sol.status, CipStatus::OpenNodeLimit);
    assert!(sol.stats.nodes_open > 1);
}

#[test]
fn test_interrupt_before_solve() {
    let mut solver = Solver::new(plain());
    solver.interrupt_handle().store(true, Ordering::Relaxed);
    let sol = solver.solve(fractional_pair()).unwrap();
    assert_eq!(sol.status, CipStatus::Interrupted);
    assert_eq!(sol.stats.nodes_processed, 0);
    assert_eq!(sol.stats.nodes_open, 1);
}

#[test]
fn test_unbounded() {
    let mut model = Model::new("ray");
    let x = model.add_continuous("x", 0.0, f64::INFINITY, -1.0).unwrap();
    let y = model.add_integer("y", 0.0, 5.0, 0.0).unwrap();
    model.add_linear("link", &[(x, 1.0), (y, -1.0)], 1.0, f64::INFINITY).unwrap();

    let sol = solve(model, &CipSettings::default()).unwrap();
    assert_eq!(sol.status, CipStatus::Unbounded);
    assert_eq!(sol.dual_bound, f64::NEG_INFINITY);
}

#[test]
fn test_maximize_with_offset() {
    for settings in [CipSettings::default(), plain()] {
        let sol = solve(offset_model(), &settings).unwrap();
        assert_eq!(sol.status, CipStatus::Optimal);
        assert!((sol.primal_bound - 30.0).abs() < 1e-6);
        assert!(sol.dual_bound >= sol.primal_bound - 1e-6);
        assert_eq!(sol.x.unwrap(), vec![4.0, 0.0]);
    }
}

/// max 5x + 4y + 10 s.t. 6x + 4y <= 24, x + 2y <= 6, x, y integer
fn offset_model() -> Model {
    let mut model = Model::new("offset");
    model.set_sense(ObjSense::Maximize);
    model.set_offset(10.0);
    let x = model.add_integer("x", 0.0, 10.0, 5.0).unwrap();
    let y = model.add_integer("y", 0.0, 10.0, 4.0).unwrap();
    model.add_linear("c1", &[(x, 6.0), (y, 4.0)], f64::NEG_INFINITY, 24.0).unwrap();
    model.add_linear("c2", &[(x, 1.0), (y, 2.0)], f64::NEG_INFINITY, 6.0).unwrap();
    model
}

#[test]
fn test_objective_limit_cuts_off_everything() {
    let mut model = fractional_pair();
    model.set_obj_limit(Some(-2.0));
    let sol = solve(model, &CipSettings::default()).unwrap();
    assert_eq!(sol.status, CipStatus::Infeasible);
    assert!(sol.x.is_none());
}

#[test]
fn test_lazy_row_is_enforced() {
    let mut model = Model::new("lazy");
    let x = model.add_binary("x", -1.0).unwrap();
    let y = model.add_binary("y", -1.0).unwrap();
    model.add_linear_lazy("pack", &[(x, 1.0), (y, 1.0)], f64::NEG_INFINITY, 1.0).unwrap();

    let sol = solve(model, &plain()).unwrap();
    assert_eq!(sol.status, CipStatus::Optimal);
    assert!((sol.primal_bound + 1.0).abs() < 1e-6);
}

#[test]
fn test_sos1_branching() {
    // max x + 2y + 3z, at most one nonzero
    let mut model = Model::new("sos");
    model.set_sense(ObjSense::Maximize);
    let x = model.add_continuous("x", 0.0, 1.0, 1.0).unwrap();
    let y = model.add_continuous("y", 0.0, 1.0, 2.0).unwrap();
    let z = model.add_continuous("z", 0.0, 1.0, 3.0).unwrap();
    model.add_sos1("one", &[x, y, z]).unwrap();

    let sol = solve(model, &plain()).unwrap();
    assert_eq!(sol.status, CipStatus::Optimal);
    assert!((sol.primal_bound - 3.0).abs() < 1e-6);
    let x = sol.x.unwrap();
    assert!(x[0].abs() < 1e-9 && x[1].abs() < 1e-9);
    assert!(sol.stats.nodes_branched >= 1);
}

#[test]
fn test_clique_and_implication() {
    // Picking a forces b; a and c exclude each other
    let mut model = Model::new("implied");
    let a = model.add_binary("a", -3.0).unwrap();
    let b = model.add_binary("b", 2.0).unwrap();
    let c = model.add_binary("c", -2.0).unwrap();
    model.add_clique("ac", &[a, c]).unwrap();
    model.add_linear("a_needs_b", &[(a, 1.0), (b, -1.0)], f64::NEG_INFINITY, 0.0).unwrap();
    model
        .add_implication(a, true, b, solver_cip::domain::BoundKind::Lower, 1.0)
        .unwrap();

    let sol = solve(model, &CipSettings::default()).unwrap();
    assert_eq!(sol.status, CipStatus::Optimal);
    // a = 1 costs -3 + 2 = -1, c = 1 costs -2
    assert!((sol.primal_bound + 2.0).abs() < 1e-6);
}

#[test]
fn test_node_selection_policies_agree() {
    let weights = [12.0, 7.0, 11.0, 8.0, 9.0, 5.0];
    let values = [24.0, 13.0, 23.0, 15.0, 16.0, 9.0];
    let expected = knapsack_brute_force(&weights, &values, 26.0);

    let policies = [
        NodeSelection::BestBound,
        NodeSelection::DepthFirst,
        NodeSelection::BestEstimate,
        NodeSelection::Hybrid { dive_freq: 3 },
        NodeSelection::TwoPhase,
        NodeSelection::Plunging { max_plunge_depth: 4 },
    ];
    for policy in policies {
        let settings = plain().with_node_selection(policy);
        let sol = solve(knapsack(&weights, &values, 26.0), &settings).unwrap();
        assert_eq!(sol.status, CipStatus::Optimal, "{:?}", policy);
        assert!((sol.primal_bound - expected).abs() < 1e-6, "{:?}", policy);
    }
}

#[test]
fn test_branching_rules_agree() {
    let weights = [5.0, 4.0, 6.0, 3.0, 7.0];
    let values = [10.0, 7.0, 11.0, 5.0, 12.0];
    let expected = knapsack_brute_force(&weights, &values, 13.0);

    let rules = [
        BranchingRule::MostFractional,
        BranchingRule::Pseudocost,
        BranchingRule::Hybrid { switch_after_nodes: 2 },
    ];
    for rule in rules {
        let sol = solve(knapsack(&weights, &values, 13.0), &plain().with_branching_rule(rule)).unwrap();
        assert_eq!(sol.status, CipStatus::Optimal);
        assert!((sol.primal_bound - expected).abs() < 1e-6, "{:?}", rule);
    }
}

#[test]
fn test_cuts_and_heuristics_keep_optimum() {
    let weights = [12.0, 7.0, 11.0, 8.0, 9.0];
    let values = [24.0, 13.0, 23.0, 15.0, 16.0];
    let expected = knapsack_brute_force(&weights, &values, 26.0);

    let with = solve(knapsack(&weights, &values, 26.0), &CipSettings::default()).unwrap();
    let without = solve(knapsack(&weights, &values, 26.0), &plain()).unwrap();
    assert!((with.primal_bound - expected).abs() < 1e-6);
    assert!((without.primal_bound - expected).abs() < 1e-6);
    assert_eq!(without.stats.cuts_added, 0);
    assert_eq!(without.stats.heuristic_solutions, 0);
}

#[test]
fn test_default_settings_on_small_knapsacks() {
    // x = 0 is always feasible; cuts must never remove the optimum
    let weights = [4.0, 5.0, 10.0, 9.0];
    let values = [3.0, 1.0, 1.0, 1.0];
    for capacity in 5..=27 {
        let capacity = f64::from(capacity);
        let expected = knapsack_brute_force(&weights, &values, capacity);
        let sol = solve(knapsack(&weights, &values, capacity), &CipSettings::default()).unwrap();
        assert_eq!(sol.status, CipStatus::Optimal, "capacity {}", capacity);
        assert!(
            (sol.primal_bound - expected).abs() < 1e-6,
            "capacity {}: {} != {}",
            capacity,
            sol.primal_bound,
            expected
        );
    }
}

/// Offers a cheaper copy of the first column once its reduced cost is
/// negative.
struct CheaperCopy {
    demand: solver_cip::ConsId,
    added: bool,
}

impl Pricer for CheaperCopy {
    fn name(&self) -> &str {
        "cheaper_copy"
    }

    fn generate_columns(&mut self, ctx: &PricingContext<'_>) -> CipResult<PricingResult> {
        let reduced_cost = ctx.sign * 1.0 - ctx.dual(self.demand);
        if self.added || reduced_cost > -1e-9 {
            return Ok(PricingResult::default());
        }
        self.added = true;
        Ok(PricingResult {
            columns: vec![PricedColumn {
                name: "cheap".to_string(),
                var_type: VarType::Integer,
                lb: 0.0,
                ub: 10.0,
                obj: 1.0,
                coefs: vec![(self.demand, 1.0)],
            }],
            lower_bound: None,
        })
    }
}

#[test]
fn test_pricing_adds_column() {
    // min 2x s.t. x >= 3; the pricer adds y with cost 1
    let mut model = Model::new("priced");
    let x = model.add_integer("x", 0.0, 10.0, 2.0).unwrap();
    let demand = model
        .add_linear_modifiable("demand", &[(x, 1.0)], 3.0, f64::INFINITY)
        .unwrap();

    let mut solver = Solver::new(plain());
    solver.add_pricer(Box::new(CheaperCopy { demand, added: false }));
    let sol = solver.solve(model).unwrap();

    assert_eq!(sol.status, CipStatus::Optimal);
    assert!((sol.primal_bound - 3.0).abs() < 1e-6);
    assert_eq!(sol.stats.columns_added, 1);
    let x = sol.x.unwrap();
    assert_eq!(x.len(), 2);
    assert!((x[1] - 3.0).abs() < 1e-9);
}

#[test]
fn test_pricing_with_propagation_and_cuts_enabled() {
    // Propagating x >= 3 would fix x's lower bound and zero the row dual
    let mut model = Model::new("priced");
    let x = model.add_integer("x", 0.0, 10.0, 2.0).unwrap();
    let demand = model
        .add_linear_modifiable("demand", &[(x, 1.0)], 3.0, f64::INFINITY)
        .unwrap();
    model.add_linear("cap", &[(x, 1.0)], f64::NEG_INFINITY, 8.0).unwrap();

    let mut solver = Solver::new(CipSettings::default());
    solver.add_pricer(Box::new(CheaperCopy { demand, added: false }));
    let sol = solver.solve(model).unwrap();

    assert_eq!(sol.status, CipStatus::Optimal);
    assert!((sol.primal_bound - 3.0).abs() < 1e-6);
    assert_eq!(sol.stats.columns_added, 1);
    assert_eq!(sol.stats.cuts_added, 0);
}

/// Offers one column into `target` on its first call.
struct OfferOnce {
    target: solver_cip::ConsId,
    offered: bool,
}

impl Pricer for OfferOnce {
    fn name(&self) -> &str {
        "offer_once"
    }

    fn generate_columns(&mut self, _ctx: &PricingContext<'_>) -> CipResult<PricingResult> {
        if std::mem::replace(&mut self.offered, true) {
            return Ok(PricingResult::default());
        }
        Ok(PricingResult {
            columns: vec![PricedColumn {
                name: "extra".to_string(),
                var_type: VarType::Continuous,
                lb: 0.0,
                ub: 1.0,
                obj: -1.0,
                coefs: vec![(self.target, 1.0)],
            }],
            lower_bound: None,
        })
    }
}

#[test]
fn test_pricing_into_fixed_row_is_rejected() {
    let mut model = Model::new("priced");
    let x = model.add_integer("x", 0.0, 10.0, 2.0).unwrap();
    let demand = model.add_linear("demand", &[(x, 1.0)], 3.0, f64::INFINITY).unwrap();

    let mut solver = Solver::new(plain().with_node_limit(1));
    solver.add_pricer(Box::new(OfferOnce { target: demand, offered: false }));
    let err = solver.solve(model).unwrap_err();
    assert!(matches!(err, CipError::PluginFault { .. }), "{}", err);
}

/// Proposes a fixed assignment.
struct Fixed(Vec<f64>);

impl Heuristic for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    fn find(&mut self, _ctx: &HeuristicContext<'_>) -> CipResult<Option<Vec<f64>>> {
        Ok(Some(self.0.clone()))
    }
}

#[test]
fn test_user_heuristic() {
    let mut solver = Solver::new(CipSettings::default().without_cuts());
    solver.add_heuristic(Box::new(Fixed(vec![1.0, 0.0])));
    let sol = solver.solve(fractional_pair()).unwrap();
    assert_eq!(sol.status, CipStatus::Optimal);
    assert!((sol.primal_bound + 1.0).abs() < 1e-6);
    assert!(sol.stats.heuristic_solutions >= 1);
}

#[test]
fn test_infeasible_heuristic_proposal_is_rejected() {
    let mut solver = Solver::new(CipSettings::default().without_cuts());
    solver.add_heuristic(Box::new(Fixed(vec![1.0, 1.0])));
    let sol = solver.solve(fractional_pair()).unwrap();
    assert!((sol.primal_bound + 1.0).abs() < 1e-6);
}

/// x != y on two integer variables.
struct NotEqual {
    pairs: Vec<(VarId, VarId)>,
}

impl ConstraintHandler for NotEqual {
    fn name(&self) -> &str {
        "not_equal"
    }

    fn num_constraints(&self) -> usize {
        self.pairs.len()
    }

    fn propagate(&mut self, conss: &[usize], ctx: &mut PropagationContext<'_>) -> CipResult<PropagationResult> {
        let mut result = PropagationResult::DidNotFind;
        for &c in conss {
            let (x, y) = self.pairs[c];
            for (fixed, other) in [(x, y), (y, x)] {
                if ctx.lb(fixed) != ctx.ub(fixed) {
                    continue;
                }
                let v = ctx.lb(fixed);
                if ctx.lb(other) == v {
                    ctx.tighten_lb(other, v + 1.0)?;
                    result = PropagationResult::ReducedDomain;
                } else if ctx.ub(other) == v {
                    ctx.tighten_ub(other, v - 1.0)?;
                    result = PropagationResult::ReducedDomain;
                }
            }
            if ctx.is_infeasible() {
                return Ok(PropagationResult::Cutoff);
            }
        }
        Ok(result)
    }

    fn check(&self, conss: &[usize], x: &[f64], feas_tol: f64) -> CheckResult {
        let violated = conss
            .iter()
            .copied()
            .filter(|&c| {
                let (a, b) = self.pairs[c];
                (x[a.0] - x[b.0]).abs() <= feas_tol
            })
            .collect();
        CheckResult::from_violated(violated)
    }

    fn lock_variables(&self, cons: usize) -> Vec<VarLock> {
        let (a, b) = self.pairs[cons];
        vec![
            VarLock { var: a, down: true, up: true },
            VarLock { var: b, down: true, up: true },
        ]
    }

    fn branching_candidates(&self, conss: &[usize], x: &[f64], domains: &DomainStore) -> Vec<ConsBranching> {
        let mut out = Vec::new();
        for &c in conss {
            let (a, b) = self.pairs[c];
            if (x[a.0] - x[b.0]).abs() > 1e-6 {
                continue;
            }
            let v = x[a.0].round();
            let (lb, ub) = (domains.lb(a), domains.ub(a));
            let mut children = Vec::new();
            if v - 1.0 >= lb {
                children.push(vec![BoundChange::upper(a, ub, v - 1.0)]);
            }
            if v + 1.0 <= ub {
                children.push(vec![BoundChange::lower(a, lb, v + 1.0)]);
            }
            children.push(vec![BoundChange::lower(a, lb, v), BoundChange::upper(a, ub, v)]);
            out.push(ConsBranching { score: 1.0, children });
        }
        out
    }
}

#[test]
fn test_custom_handler() {
    let mut model = Model::new("distinct");
    let x = model.add_integer("x", 0.0, 3.0, -1.0).unwrap();
    let y = model.add_integer("y", 0.0, 3.0, -1.0).unwrap();
    let handler = model.include_handler(Box::new(NotEqual { pairs: vec![(x, y)] }));
    model.add_constraint(handler, 0).unwrap();

    let sol = solve(model, &plain()).unwrap();
    assert_eq!(sol.status, CipStatus::Optimal);
    assert!((sol.primal_bound + 5.0).abs() < 1e-6);
    let x = sol.x.unwrap();
    assert!((x[0] - x[1]).abs() > 0.5);
}

#[test]
fn test_solver_is_reusable() {
    let mut solver = Solver::new(plain());
    let first = solver.solve(fractional_pair()).unwrap();
    let second = solver.solve(fractional_pair()).unwrap();
    assert_eq!(first.status, second.status);
    assert!((first.primal_bound - second.primal_bound).abs() < 1e-9);
}

#[test]
fn test_invalid_settings() {
    let mut settings = CipSettings::default();
    settings.gap_tol = -1.0;
    assert!(solve(fractional_pair(), &settings).is_err());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn instance() -> impl Strategy<Value = (Vec<f64>, Vec<f64>, f64)> {
        (2usize..8).prop_flat_map(|n| {
            (
                proptest::collection::vec(1u32..20, n),
                proptest::collection::vec(1u32..30, n),
                5u32..40,
            )
                .prop_map(|(w, v, c)| {
                    (
                        w.into_iter().map(f64::from).collect(),
                        v.into_iter().map(f64::from).collect(),
                        f64::from(c),
                    )
                })
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn knapsack_matches_enumeration((weights, values, capacity) in instance()) {
            let expected = knapsack_brute_force(&weights, &values, capacity);
            let sol = solve(knapsack(&weights, &values, capacity), &CipSettings::default()).unwrap();
            prop_assert_eq!(sol.status, CipStatus::Optimal);
            prop_assert!((sol.primal_bound - expected).abs() < 1e-6);
            // Maximization: the dual bound is an upper bound
            prop_assert!(sol.dual_bound >= sol.primal_bound - 1e-6);
        }

        #[test]
        fn node_limit_bounds_bracket_optimum((weights, values, capacity) in instance(), limit in 1u64..6) {
            let expected = knapsack_brute_force(&weights, &values, capacity);
            let settings = plain().with_node_limit(limit);
            let sol = solve(knapsack(&weights, &values, capacity), &settings).unwrap();
            prop_assert!(sol.dual_bound >= expected - 1e-6);
            if sol.has_solution() {
                prop_assert!(sol.primal_bound <= expected + 1e-6);
            }
            prop_assert!(sol.stats.nodes_processed <= limit);
        }
    }
}
