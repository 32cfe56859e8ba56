//! Per-node relaxation loop: solve, price, check, separate, repeat.

use crate::error::CipResult;
use crate::relaxation::RelaxationStatus;

/// How the round loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Relaxation infeasible: prune the node.
    Infeasible,
    /// Relaxation unbounded after pricing: the problem is unbounded.
    Unbounded,
    /// Propagation after adding local constraints emptied a domain.
    Cutoff,
    /// The relaxation bound cannot beat the incumbent.
    BoundExceeded,
    /// The relaxation solution is feasible for the problem.
    Feasible,
    /// Rounds are exhausted with an infeasible solution: branch.
    Fractional,
    /// The relaxation could not be solved reliably.
    Unreliable,
}

/// Result of one pricing call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PricingRound {
    /// Columns added.
    pub columns_added: usize,
}

/// Result of one separation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeparationRound {
    /// Cuts added to the relaxation (global and local).
    pub cuts_added: usize,
    /// Local constraints added at the node.
    pub local_added: usize,
}

/// Counters of one [`run_rounds`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundStats {
    /// Relaxation solves.
    pub lp_solves: usize,
    /// Separation rounds run.
    pub rounds: usize,
    /// Cuts added.
    pub cuts_added: usize,
    /// Columns added.
    pub columns_added: usize,
}

/// Limits of one [`run_rounds`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundLimits {
    /// Separation rounds before branching.
    pub max_rounds: usize,
    /// Pricing calls per relaxation solve loop.
    pub max_pricing_rounds: usize,
    /// Whether pricers are called.
    pub pricing: bool,
}

/// Node operations used by [`run_rounds`].
pub trait RoundDriver {
    /// Push bounds and solve the relaxation.
    fn solve_relaxation(&mut self) -> CipResult<RelaxationStatus>;

    /// Call the pricers on the current solution.
    fn price(&mut self) -> CipResult<PricingRound>;

    /// Whether the relaxation bound reaches the cutoff bound.
    fn bound_exceeded(&self) -> bool;

    /// Whether the relaxation solution satisfies all constraints and
    /// integrality.
    fn relaxation_feasible(&mut self) -> CipResult<bool>;

    /// Run separation. With `enforce_only`, only constraint handlers are
    /// asked (cutting-plane separators are skipped).
    fn separate(&mut self, enforce_only: bool) -> CipResult<SeparationRound>;

    /// Propagate the node again. Returns `false` on cutoff.
    fn propagate(&mut self) -> CipResult<bool>;
}

/// Run solve/price/separate rounds at the focus node.
///
/// Each iteration solves the relaxation and prices to convergence, then
/// stops on infeasibility, unboundedness, an exceeded bound or a feasible
/// solution. Otherwise it separates; cutting-plane rounds are limited by
/// `max_rounds`, after which only constraint enforcement (e.g. lazy
/// constraints) may add rows. A round that adds nothing ends the loop.
pub fn run_rounds<D: RoundDriver>(driver: &mut D, limits: &RoundLimits) -> CipResult<(RoundOutcome, RoundStats)> {
    let mut stats = RoundStats::default();

    loop {
        let mut pricing_rounds = 0;
        loop {
            let status = driver.solve_relaxation()?;
            stats.lp_solves += 1;
            match status {
                RelaxationStatus::Optimal => {}
                RelaxationStatus::Infeasible => return Ok((RoundOutcome::Infeasible, stats)),
                RelaxationStatus::Unbounded => return Ok((RoundOutcome::Unbounded, stats)),
                RelaxationStatus::LimitReached | RelaxationStatus::NumericalError => {
                    return Ok((RoundOutcome::Unreliable, stats))
                }
            }
            if !limits.pricing {
                break;
            }
            let priced = driver.price()?;
            if priced.columns_added == 0 {
                break;
            }
            stats.columns_added += priced.columns_added;
            pricing_rounds += 1;
            if pricing_rounds > limits.max_pricing_rounds {
                log::warn!("pricing did not converge after {} rounds", limits.max_pricing_rounds);
                return Ok((RoundOutcome::Unreliable, stats));
            }
        }

        if driver.bound_exceeded() {
            return Ok((RoundOutcome::BoundExceeded, stats));
        }
        if driver.relaxation_feasible()? {
            return Ok((RoundOutcome::Feasible, stats));
        }

        let enforce_only = stats.rounds >= limits.max_rounds;
        let sep = driver.separate(enforce_only)?;
        if !enforce_only {
            stats.rounds += 1;
        }
        if sep.cuts_added == 0 && sep.local_added == 0 {
            return Ok((RoundOutcome::Fractional, stats));
        }
        stats.cuts_added += sep.cuts_added;

        if sep.local_added > 0 && !driver.propagate()? {
            return Ok((RoundOutcome::Cutoff, stats));
        }
    }
}
