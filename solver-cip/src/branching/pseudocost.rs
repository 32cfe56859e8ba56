//! Pseudocost bookkeeping.

use crate::model::VarId;

/// Branching direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchDir {
    /// Upper bound lowered.
    Down,
    /// Lower bound raised.
    Up,
}

/// Average objective gain per unit of fractionality, per variable and
/// direction.
///
/// Variables without observations use the average over all observed
/// variables (1.0 before any observation).
#[derive(Debug, Clone, Default)]
pub struct PseudocostTable {
    down_sum: Vec<f64>,
    down_count: Vec<u32>,
    up_sum: Vec<f64>,
    up_count: Vec<u32>,
    total_down: (f64, u32),
    total_up: (f64, u32),
}

impl PseudocostTable {
    /// Create for `num_vars` variables.
    pub fn new(num_vars: usize) -> Self {
        Self {
            down_sum: vec![0.0; num_vars],
            down_count: vec![0; num_vars],
            up_sum: vec![0.0; num_vars],
            up_count: vec![0; num_vars],
            ..Default::default()
        }
    }

    fn ensure(&mut self, var: VarId) {
        let n = var.0 + 1;
        if self.down_sum.len() < n {
            self.down_sum.resize(n, 0.0);
            self.down_count.resize(n, 0);
            self.up_sum.resize(n, 0.0);
            self.up_count.resize(n, 0);
        }
    }

    /// Record an objective `gain` after moving `var` by `distance` in `dir`.
    pub fn update(&mut self, var: VarId, dir: BranchDir, gain: f64, distance: f64) {
        if distance <= 1e-9 || !gain.is_finite() {
            return;
        }
        self.ensure(var);
        let unit = gain.max(0.0) / distance;
        let i = var.0;
        match dir {
            BranchDir::Down => {
                self.down_sum[i] += unit;
                self.down_count[i] += 1;
                self.total_down.0 += unit;
                self.total_down.1 += 1;
            }
            BranchDir::Up => {
                self.up_sum[i] += unit;
                self.up_count[i] += 1;
                self.total_up.0 += unit;
                self.total_up.1 += 1;
            }
        }
    }

    /// Pseudocost of a variable in a direction.
    pub fn get(&self, var: VarId, dir: BranchDir) -> f64 {
        let i = var.0;
        let (sum, count, total) = match dir {
            BranchDir::Down => (self.down_sum.get(i), self.down_count.get(i), self.total_down),
            BranchDir::Up => (self.up_sum.get(i), self.up_count.get(i), self.total_up),
        };
        match (sum, count) {
            (Some(&s), Some(&c)) if c > 0 => s / f64::from(c),
            _ if total.1 > 0 => total.0 / f64::from(total.1),
            _ => 1.0,
        }
    }

    /// Number of observations of a variable in a direction.
    pub fn count(&self, var: VarId, dir: BranchDir) -> u32 {
        let counts = match dir {
            BranchDir::Down => &self.down_count,
            BranchDir::Up => &self.up_count,
        };
        counts.get(var.0).copied().unwrap_or(0)
    }

    /// Product score of a candidate with fractional part `frac`.
    pub fn score(&self, var: VarId, frac: f64) -> f64 {
        let eps = 1e-6;
        let down = (self.get(var, BranchDir::Down) * frac).max(eps);
        let up = (self.get(var, BranchDir::Up) * (1.0 - frac)).max(eps);
        down * up
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_averages() {
        let mut pc = PseudocostTable::new(3);
        assert_eq!(pc.get(VarId(0), BranchDir::Down), 1.0);

        // gain 2 over distance 0.5: unit gain 4
        pc.update(VarId(0), BranchDir::Down, 2.0, 0.5);
        pc.update(VarId(0), BranchDir::Down, 1.0, 0.5);
        assert_eq!(pc.get(VarId(0), BranchDir::Down), 3.0);
        assert_eq!(pc.count(VarId(0), BranchDir::Down), 2);

        // Unobserved variable falls back to the average
        assert_eq!(pc.get(VarId(1), BranchDir::Down), 3.0);
        assert_eq!(pc.get(VarId(1), BranchDir::Up), 1.0);

        // Variables beyond the initial size are added on demand
        pc.update(VarId(7), BranchDir::Up, -1.0, 0.25);
        assert_eq!(pc.get(VarId(7), BranchDir::Up), 0.0);
    }

    #[test]
    fn test_product_score() {
        let mut pc = PseudocostTable::new(2);
        pc.update(VarId(0), BranchDir::Down, 1.0, 1.0);
        pc.update(VarId(0), BranchDir::Up, 4.0, 1.0);
        assert!((pc.score(VarId(0), 0.5) - 0.5 * 2.0).abs() < 1e-12);
        assert!(pc.score(VarId(0), 0.5) > pc.score(VarId(0), 0.1));
    }
}
