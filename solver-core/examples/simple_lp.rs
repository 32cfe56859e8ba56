//! Simple LP example for the simplex engine.
//!
//! Solves:
//!   maximize    3 x + 5 y
//!   subject to  x <= 4, 2 y <= 12, 3 x + 2 y <= 18
//!               x, y >= 0
//!
//! Optimal solution: x = 2, y = 6, objective = 36

use solver_core::linalg::sparse;
use solver_core::{solve, LpProblem, LpSettings};

fn main() {
    let prob = LpProblem {
        c: vec![-3.0, -5.0],
        a: sparse::from_triplets(
            3,
            2,
            vec![(0, 0, 1.0), (1, 1, 2.0), (2, 0, 3.0), (2, 1, 2.0)],
        ),
        row_lower: vec![f64::NEG_INFINITY; 3],
        row_upper: vec![4.0, 12.0, 18.0],
        col_lower: vec![0.0; 2],
        col_upper: vec![f64::INFINITY; 2],
    };

    match solve(&prob, &LpSettings::default()) {
        Ok(result) => {
            println!("Status: {}", result.status);
            println!("Objective: {}", -result.obj_val);
            println!("x = {:?}", result.x);
            println!("Iterations: {}", result.info.iters);
        }
        Err(e) => eprintln!("Solve failed: {}", e),
    }
}
