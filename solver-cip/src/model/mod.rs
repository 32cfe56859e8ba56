//! Problem, formulation and solution types.

mod formulation;
mod problem;
mod solution;
mod variable;

pub use formulation::Model;
pub use problem::{ObjSense, Problem};
pub use solution::{CipSolution, CipStatus, SolveStats};
pub use variable::{VarId, VarType, Variable};
