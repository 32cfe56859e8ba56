//! Separator plugin interface.

use super::Cut;
use crate::constraint::SeparationContext;
use crate::error::CipResult;
use crate::relaxation::RelaxationOracle;

/// Cut generator that is not tied to a constraint handler.
pub trait Separator {
    /// Separator name.
    fn name(&self) -> &str;

    /// Cuts separating the relaxation solution in `ctx`. The oracle holds
    /// the relaxation that produced it.
    fn separate(&mut self, ctx: &SeparationContext<'_>, oracle: &dyn RelaxationOracle) -> CipResult<Vec<Cut>>;
}
