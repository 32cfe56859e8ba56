//! Cut pool for global cuts.
//!
//! Manages the global cuts added during the search:
//! - Parallel duplicate detection
//! - Activity tracking from relaxation duals
//! - Periodic deactivation of cuts that stay slack
//! - Reactivation of pooled cuts that become violated again

use std::collections::HashSet;

use super::Cut;

/// Status of a cut in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutStatus {
    /// Cut is a row of the relaxation.
    Active,

    /// Cut is in the pool but not in the relaxation.
    Inactive,

    /// Cut has been permanently removed.
    Deleted,
}

/// A cut with pool metadata.
#[derive(Debug, Clone)]
pub struct PooledCut {
    /// The underlying cut.
    pub cut: Cut,

    /// Unique ID in the pool.
    pub id: usize,

    /// Current status.
    pub status: CutStatus,

    /// Number of rounds this cut was binding (dual > tol).
    pub times_binding: usize,

    /// Number of consecutive rounds where the cut was slack.
    pub slack_count: usize,

    /// Round when the cut was added.
    pub added_round: usize,

    /// Last round when the cut was binding.
    pub last_binding_round: usize,
}

/// Cut pool settings.
#[derive(Debug, Clone)]
pub struct CutPoolSettings {
    /// Maximum cuts to keep in pool.
    pub max_cuts: usize,

    /// Deactivate cuts after this many consecutive slack rounds.
    pub max_slack_count: usize,

    /// How often to run cleanup (in rounds).
    pub cleanup_freq: usize,

    /// Minimum activity ratio to keep a cut active.
    pub min_activity_ratio: f64,
}

impl Default for CutPoolSettings {
    fn default() -> Self {
        Self {
            max_cuts: 10000,
            max_slack_count: 50,
            cleanup_freq: 100,
            min_activity_ratio: 0.01,
        }
    }
}

/// Statistics for the cut pool.
#[derive(Debug, Default, Clone)]
pub struct CutPoolStats {
    /// Total cuts added.
    pub total_added: usize,

    /// Total cuts removed.
    pub total_removed: usize,

    /// Current active cuts.
    pub active_cuts: usize,

    /// Peak pool size.
    pub peak_size: usize,

    /// Cuts rejected as duplicates.
    pub duplicates: usize,
}

/// Cut pool.
#[derive(Debug, Clone)]
pub struct CutPool {
    /// All cuts in the pool.
    cuts: Vec<PooledCut>,

    /// Next cut ID.
    next_id: usize,

    /// Current round.
    round: usize,

    /// Settings.
    settings: CutPoolSettings,

    /// Statistics.
    stats: CutPoolStats,
}

impl CutPool {
    /// Create a new cut pool.
    pub fn new(settings: CutPoolSettings) -> Self {
        Self {
            cuts: Vec::new(),
            next_id: 0,
            round: 0,
            settings,
            stats: CutPoolStats::default(),
        }
    }

    /// Add a cut to the pool.
    ///
    /// Returns the cut ID and whether it's a duplicate. A duplicate of an
    /// inactive cut reactivates it (and is reported as new).
    pub fn add(&mut self, cut: Cut) -> (usize, bool) {
        let mut reactivate = None;
        for pooled in &self.cuts {
            if pooled.status != CutStatus::Deleted && is_duplicate(&cut, &pooled.cut) {
                if pooled.status == CutStatus::Active {
                    self.stats.duplicates += 1;
                    return (pooled.id, true);
                }
                reactivate = Some(pooled.id);
                break;
            }
        }
        if let Some(id) = reactivate {
            self.activate(id);
            return (id, false);
        }

        let id = self.next_id;
        self.next_id += 1;

        self.cuts.push(PooledCut {
            cut,
            id,
            status: CutStatus::Active,
            times_binding: 0,
            slack_count: 0,
            added_round: self.round,
            last_binding_round: self.round,
        });
        self.stats.total_added += 1;
        self.stats.active_cuts += 1;
        self.stats.peak_size = self.stats.peak_size.max(self.cuts.len());

        (id, false)
    }

    /// Update cut activity based on dual values.
    ///
    /// `dual_values` maps cut ID to its dual value in the relaxation
    /// solution. Returns the cuts deactivated by the periodic cleanup.
    pub fn update_activity(&mut self, dual_values: &[(usize, f64)]) -> Vec<usize> {
        self.round += 1;

        let binding: HashSet<usize> = dual_values
            .iter()
            .filter(|(_, dual)| dual.abs() > 1e-8)
            .map(|&(id, _)| id)
            .collect();

        for pooled in &mut self.cuts {
            if pooled.status == CutStatus::Deleted {
                continue;
            }

            if binding.contains(&pooled.id) {
                pooled.times_binding += 1;
                pooled.slack_count = 0;
                pooled.last_binding_round = self.round;
            } else if pooled.status == CutStatus::Active {
                pooled.slack_count += 1;
            }
        }

        if self.settings.cleanup_freq > 0 && self.round % self.settings.cleanup_freq == 0 {
            self.cleanup()
        } else {
            Vec::new()
        }
    }

    /// Deactivate cuts that stayed slack. Returns their ids.
    fn cleanup(&mut self) -> Vec<usize> {
        let mut removed = Vec::new();
        for pooled in &mut self.cuts {
            if pooled.status != CutStatus::Active {
                continue;
            }

            if pooled.slack_count >= self.settings.max_slack_count {
                pooled.status = CutStatus::Inactive;
                removed.push(pooled.id);
                continue;
            }

            let age = self.round - pooled.added_round + 1;
            let activity_ratio = pooled.times_binding as f64 / age as f64;

            if age > 10 && activity_ratio < self.settings.min_activity_ratio {
                pooled.status = CutStatus::Inactive;
                removed.push(pooled.id);
            }
        }
        self.stats.active_cuts -= removed.len();

        if self.cuts.len() > 2 * self.settings.max_cuts {
            self.compact();
        }
        removed
    }

    /// Remove deleted cuts from storage.
    fn compact(&mut self) {
        self.cuts.retain(|c| c.status != CutStatus::Deleted);
    }

    /// Reactivate inactive cuts violated by `x` by more than `min_efficacy`.
    pub fn separate_inactive(&mut self, x: &[f64], min_efficacy: f64) -> Vec<usize> {
        let ids: Vec<usize> = self
            .cuts
            .iter()
            .filter(|c| c.status == CutStatus::Inactive && c.cut.row.efficacy(x) > min_efficacy)
            .map(|c| c.id)
            .collect();
        for &id in &ids {
            self.activate(id);
        }
        ids
    }

    /// Get active cuts.
    pub fn active_cuts(&self) -> impl Iterator<Item = &PooledCut> {
        self.cuts.iter().filter(|c| c.status == CutStatus::Active)
    }

    /// Get a cut by ID.
    pub fn get(&self, id: usize) -> Option<&PooledCut> {
        self.cuts.iter().find(|c| c.id == id)
    }

    /// Mark a cut as deleted.
    pub fn delete(&mut self, id: usize) {
        let mut was_active = false;
        if let Some(pooled) = self.cuts.iter_mut().find(|c| c.id == id) {
            was_active = pooled.status == CutStatus::Active;
            pooled.status = CutStatus::Deleted;
        }
        if was_active {
            self.stats.active_cuts -= 1;
        }
        self.stats.total_removed += 1;
    }

    /// Reactivate an inactive cut.
    pub fn activate(&mut self, id: usize) -> bool {
        let mut activated = false;
        if let Some(pooled) = self.cuts.iter_mut().find(|c| c.id == id) {
            if pooled.status == CutStatus::Inactive {
                pooled.status = CutStatus::Active;
                pooled.slack_count = 0;
                activated = true;
            }
        }
        if activated {
            self.stats.active_cuts += 1;
        }
        activated
    }

    /// Get pool statistics.
    pub fn stats(&self) -> &CutPoolStats {
        &self.stats
    }

    /// Number of cuts in pool (including inactive).
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Check if pool is empty.
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Number of active cuts.
    pub fn num_active(&self) -> usize {
        self.stats.active_cuts
    }

    /// Current round.
    pub fn round(&self) -> usize {
        self.round
    }
}

/// Two cuts are duplicates if they have the same support, parallel
/// coefficients and the same normalized sides.
fn is_duplicate(a: &Cut, b: &Cut) -> bool {
    let (ra, rb) = (&a.row, &b.row);
    if ra.coefs.len() != rb.coefs.len() || ra.coefs.iter().zip(&rb.coefs).any(|(x, y)| x.0 != y.0) {
        return false;
    }

    let a_norm = ra.norm();
    let b_norm = rb.norm();
    if a_norm < 1e-10 || b_norm < 1e-10 {
        return a_norm < 1e-10 && b_norm < 1e-10;
    }

    let dot: f64 = ra.coefs.iter().zip(&rb.coefs).map(|(x, y)| x.1 * y.1).sum();
    let cos_angle = dot / (a_norm * b_norm);
    if cos_angle < 0.9999 {
        return false;
    }

    let same = |s: f64, t: f64| {
        if s.is_infinite() || t.is_infinite() {
            s == t
        } else {
            (s / a_norm - t / b_norm).abs() < 1e-8
        }
    };
    same(ra.lhs, rb.lhs) && same(ra.rhs, rb.rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarId;
    use crate::relaxation::Row;

    fn make_cut(coeffs: &[f64], rhs: f64) -> Cut {
        let coefs: Vec<(VarId, f64)> = coeffs.iter().enumerate().map(|(j, &a)| (VarId(j), a)).collect();
        Cut::new("test", Row::less_equal(&coefs, rhs), false, "test")
    }

    #[test]
    fn test_pool_add_and_get() {
        let mut pool = CutPool::new(CutPoolSettings::default());

        let (id1, dup1) = pool.add(make_cut(&[1.0, 2.0], 3.0));
        let (id2, dup2) = pool.add(make_cut(&[4.0, 5.0], 6.0));

        assert!(!dup1);
        assert!(!dup2);
        assert_ne!(id1, id2);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.num_active(), 2);
    }

    #[test]
    fn test_duplicate_detection() {
        let mut pool = CutPool::new(CutPoolSettings::default());

        let (id1, dup1) = pool.add(make_cut(&[1.0, 2.0], 3.0));
        let (id2, dup2) = pool.add(make_cut(&[1.0, 2.0], 3.0)); // Same cut
        let (id3, dup3) = pool.add(make_cut(&[2.0, 4.0], 6.0)); // Parallel cut (same after normalization)
        let (_, dup4) = pool.add(make_cut(&[2.0, 4.0], 7.0)); // Parallel, different side

        assert!(!dup1);
        assert!(dup2);
        assert!(dup3);
        assert!(!dup4);
        assert_eq!(id1, id2);
        assert_eq!(id1, id3);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_activity_tracking() {
        let mut pool = CutPool::new(CutPoolSettings {
            max_slack_count: 3,
            cleanup_freq: 1, // Run cleanup every round
            ..Default::default()
        });

        let (id, _) = pool.add(make_cut(&[1.0, 2.0], 3.0));

        for _ in 0..2 {
            assert!(pool.update_activity(&[]).is_empty());
        }
        assert_eq!(pool.get(id).unwrap().slack_count, 2);

        // Third slack round reaches the threshold
        assert_eq!(pool.update_activity(&[]), vec![id]);
        assert_eq!(pool.get(id).unwrap().status, CutStatus::Inactive);
        assert_eq!(pool.num_active(), 0);
    }

    #[test]
    fn test_cut_binding() {
        let mut pool = CutPool::new(CutPoolSettings::default());

        let (id, _) = pool.add(make_cut(&[1.0, 2.0], 3.0));

        // Cut is binding
        pool.update_activity(&[(id, 0.5)]);
        assert_eq!(pool.get(id).unwrap().times_binding, 1);
        assert_eq!(pool.get(id).unwrap().slack_count, 0);

        // Cut is slack
        pool.update_activity(&[]);
        assert_eq!(pool.get(id).unwrap().times_binding, 1);
        assert_eq!(pool.get(id).unwrap().slack_count, 1);

        // Cut is binding again (resets slack count)
        pool.update_activity(&[(id, 0.1)]);
        assert_eq!(pool.get(id).unwrap().times_binding, 2);
        assert_eq!(pool.get(id).unwrap().slack_count, 0);
    }

    #[test]
    fn test_reactivation() {
        let mut pool = CutPool::new(CutPoolSettings {
            max_slack_count: 1,
            cleanup_freq: 1,
            ..Default::default()
        });
        let (id, _) = pool.add(make_cut(&[1.0, 1.0], 1.0));
        assert_eq!(pool.update_activity(&[]), vec![id]);

        // Not violated: stays in the pool
        assert!(pool.separate_inactive(&[0.5, 0.5], 1e-6).is_empty());
        assert_eq!(pool.separate_inactive(&[1.0, 1.0], 1e-6), vec![id]);
        assert_eq!(pool.get(id).unwrap().status, CutStatus::Active);

        pool.delete(id);
        assert_eq!(pool.num_active(), 0);
    }
}
