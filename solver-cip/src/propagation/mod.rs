//! Domain propagation.

mod context;
mod engine;
mod implications;

pub use context::PropagationContext;
pub use engine::{PropagationEngine, PropagationOutcome};
pub use implications::{Implication, ImplicationGraph};
