//! Small models solved with progress logging.
//!
//! Run with: RUST_LOG=info cargo run --release -p solver-cip --example simple_solve

use solver_cip::{CipSettings, Model, ObjSense, Solver, VarId};
use std::time::Instant;

fn main() {
    env_logger::init();
    println!("=== Simple CIP Solver Test ===\n");

    // Test 1: binary packing, optimum needs no branching
    test_packing();

    // Test 2: knapsack that needs branching
    test_small_knapsack();
}

/// max x0 + x1 s.t. x0 + x1 <= 1, x binary
fn test_packing() {
    println!("--- Test 1: Packing ---");
    let mut model = Model::new("packing");
    model.set_sense(ObjSense::Maximize);
    let x0 = model.add_binary("x0", 1.0).unwrap();
    let x1 = model.add_binary("x1", 1.0).unwrap();
    model.add_linear("pack", &[(x0, 1.0), (x1, 1.0)], f64::NEG_INFINITY, 1.0).unwrap();
    run_solve(model);
}

/// max 3x0 + 2x1 + 4x2 + 3x3 s.t. 2x0 + x1 + 3x2 + 2x3 <= 4.5, x binary
fn test_small_knapsack() {
    println!("--- Test 2: Small Knapsack ---");
    let mut model = Model::new("knapsack");
    model.set_sense(ObjSense::Maximize);
    let values = [3.0, 2.0, 4.0, 3.0];
    let weights = [2.0, 1.0, 3.0, 2.0];
    let vars: Vec<VarId> = values
        .iter()
        .enumerate()
        .map(|(j, &v)| model.add_binary(format!("x{}", j), v).unwrap())
        .collect();
    let row: Vec<(VarId, f64)> = vars.iter().copied().zip(weights).collect();
    model.add_linear("capacity", &row, f64::NEG_INFINITY, 4.5).unwrap();
    run_solve(model);
}

fn run_solve(model: Model) {
    println!("Problem: n={}, m={}", model.num_vars(), model.num_constraints());

    let settings = CipSettings {
        node_limit: 1000,
        gap_tol: 1e-4,
        ..CipSettings::verbose()
    };
    let mut solver = Solver::new(settings);

    let start = Instant::now();
    let result = solver.solve(model);
    let elapsed = start.elapsed();

    match result {
        Ok(sol) => {
            println!("Status: {}", sol.status);
            if sol.has_solution() {
                println!("Objective: {:.6}", sol.primal_bound);
                println!("Solution: {:?}", sol.x);
                println!("Bound: {:.6}", sol.dual_bound);
                println!("Gap: {:.4}%", sol.gap * 100.0);
            }
            println!(
                "Nodes: {}, Cuts: {}, LP iterations: {}",
                sol.stats.nodes_processed, sol.stats.cuts_added, sol.stats.lp_iterations
            );
        }
        Err(e) => {
            println!("Error: {}", e);
        }
    }
    println!("Time: {:.3}s\n", elapsed.as_secs_f64());
}
