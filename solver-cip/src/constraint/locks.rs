//! Variable lock counts.

use super::handler::VarLock;
use crate::error::CipResult;
use crate::model::VarId;

/// Number of constraints that may be violated by moving each variable
/// down or up.
///
/// Counts only grow: constraints added during the search add their locks,
/// deleted ones keep them, so a zero count is always safe to rely on.
#[derive(Debug, Clone, Default)]
pub struct LockTable {
    down: Vec<u32>,
    up: Vec<u32>,
}

impl LockTable {
    /// Create for `num_vars` variables without locks.
    pub fn new(num_vars: usize) -> Self {
        Self {
            down: vec![0; num_vars],
            up: vec![0; num_vars],
        }
    }

    /// Add the locks of one constraint.
    pub fn add(&mut self, locks: &[VarLock]) -> CipResult<()> {
        for lock in locks {
            let i = lock.var.0;
            if i >= self.down.len() {
                self.down.try_reserve(i + 1 - self.down.len())?;
                self.up.try_reserve(i + 1 - self.up.len())?;
                self.down.resize(i + 1, 0);
                self.up.resize(i + 1, 0);
            }
            self.down[i] += u32::from(lock.down);
            self.up[i] += u32::from(lock.up);
        }
        Ok(())
    }

    /// Down-locks of a variable.
    pub fn down(&self, var: VarId) -> u32 {
        self.down.get(var.0).copied().unwrap_or(0)
    }

    /// Up-locks of a variable.
    pub fn up(&self, var: VarId) -> u32 {
        self.up.get(var.0).copied().unwrap_or(0)
    }

    /// Rounding down cannot violate any constraint.
    pub fn may_round_down(&self, var: VarId) -> bool {
        self.down(var) == 0
    }

    /// Rounding up cannot violate any constraint.
    pub fn may_round_up(&self, var: VarId) -> bool {
        self.up(var) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_counts() {
        let mut locks = LockTable::new(2);
        locks
            .add(&[
                VarLock { var: VarId(0), down: false, up: true },
                VarLock { var: VarId(1), down: true, up: true },
            ])
            .unwrap();
        locks.add(&[VarLock { var: VarId(3), down: true, up: false }]).unwrap();

        assert!(locks.may_round_down(VarId(0)));
        assert!(!locks.may_round_up(VarId(0)));
        assert_eq!((locks.down(VarId(1)), locks.up(VarId(1))), (1, 1));
        assert_eq!(locks.down(VarId(3)), 1);
        assert_eq!(locks.up(VarId(9)), 0);
    }
}
