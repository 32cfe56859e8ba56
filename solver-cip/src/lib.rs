//! Constraint integer programming on top of the solver-core LP engine.
//!
//! This crate implements a branch-and-bound search whose nodes are solved by
//! an LP relaxation and strengthened by domain propagation, cutting planes
//! and column generation:
//!
//! - **Search tree** with per-node bound-change deltas, best-bound,
//!   depth-first and best-estimate node selection
//! - **Constraint handlers** for linear rows, SOS1 sets and user constraints,
//!   with global or node-local scope
//! - **Propagation** of activity bounds and implications to a fixpoint, with
//!   reasons recorded on a trail
//! - **Separation** of Gomory mixed-integer cuts and user cuts through an
//!   aging cut pool
//! - **Pricing** of new columns from user pricers, with Lagrangian bounds
//! - **Branching** by most fractional, pseudocost or hybrid scoring
//!
//! # Example
//!
//! ```
//! use solver_cip::{solve, CipSettings, CipStatus, Model, ObjSense};
//!
//! // max 5x + 4y s.t. 6x + 4y <= 24, x + 2y <= 6, x, y integer in [0, 10]
//! let mut model = Model::new("small");
//! model.set_sense(ObjSense::Maximize);
//! let x = model.add_integer("x", 0.0, 10.0, 5.0).unwrap();
//! let y = model.add_integer("y", 0.0, 10.0, 4.0).unwrap();
//! model.add_linear("c1", &[(x, 6.0), (y, 4.0)], f64::NEG_INFINITY, 24.0).unwrap();
//! model.add_linear("c2", &[(x, 1.0), (y, 2.0)], f64::NEG_INFINITY, 6.0).unwrap();
//!
//! let sol = solve(model, &CipSettings::default()).unwrap();
//! assert_eq!(sol.status, CipStatus::Optimal);
//! assert!((sol.primal_bound - 20.0).abs() < 1e-6);
//! ```

#![warn(missing_docs)]

pub mod branching;
pub mod constraint;
pub mod cuts;
pub mod domain;
pub mod error;
pub mod heuristics;
pub mod model;
pub mod pricing;
pub mod propagation;
pub mod relaxation;
pub mod search;
pub mod settings;
pub mod solver;

// Re-export main types
pub use branching::{BranchCandidate, BranchingRulePlugin, PseudocostTable};
pub use constraint::{ConsId, ConstraintHandler};
pub use cuts::{Cut, Separator};
pub use error::{CipError, CipResult};
pub use heuristics::{Heuristic, HeuristicContext};
pub use model::{CipSolution, CipStatus, Model, ObjSense, SolveStats, VarId, VarType};
pub use pricing::{PricedColumn, Pricer, PricingContext, PricingResult};
pub use settings::{BranchingRule, CipSettings, NodeSelection};
pub use solver::{solve, Solver};
