//! Generated benchmark instances.
//!
//! All generators are deterministic in their seed so that runs with
//! different settings see the same models.

use clap::ValueEnum;
use solver_cip::{CipResult, Model, ObjSense, VarId};

/// Simple LCG random number generator.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.0 >> 33) as f64) / ((1u64 << 31) as f64)
    }

    /// Uniform integer in [lo, hi].
    pub fn range(&mut self, lo: u32, hi: u32) -> u32 {
        let span = f64::from(hi - lo + 1);
        lo + ((self.next_f64() * span) as u32).min(hi - lo)
    }
}

/// Instance family.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    /// 0/1 knapsack with correlated weights and values.
    Knapsack,
    /// Multi-dimensional knapsack.
    MultiKnapsack,
    /// Weighted set cover.
    SetCover,
    /// Capacitated facility location (binary open, continuous flow).
    Facility,
    /// Knapsack with SOS1 groups (at most one item per group).
    GroupedKnapsack,
}

impl Family {
    pub const ALL: [Family; 5] = [
        Family::Knapsack,
        Family::MultiKnapsack,
        Family::SetCover,
        Family::Facility,
        Family::GroupedKnapsack,
    ];

    /// Build an instance of roughly `size` variables.
    pub fn build(self, size: usize, seed: u64) -> CipResult<Model> {
        match self {
            Family::Knapsack => knapsack(size, seed),
            Family::MultiKnapsack => multi_knapsack(size, 5, seed),
            Family::SetCover => set_cover(size, size / 2 + 1, seed),
            Family::Facility => facility(size.clamp(3, 20), size.max(2), seed),
            Family::GroupedKnapsack => grouped_knapsack(size, seed),
        }
    }
}

/// Instance name used in reports.
pub fn instance_name(family: Family, size: usize, seed: u64) -> String {
    let family = match family {
        Family::Knapsack => "knap",
        Family::MultiKnapsack => "mknap",
        Family::SetCover => "scp",
        Family::Facility => "cfl",
        Family::GroupedKnapsack => "gknap",
    };
    format!("{}_{}_{}", family, size, seed)
}

/// max sum v x s.t. sum w x <= W/2, x binary
///
/// Values are correlated with weights, which makes the LP bound weak.
fn knapsack(n: usize, seed: u64) -> CipResult<Model> {
    let mut rng = Lcg::new(seed);
    let mut model = Model::new(instance_name(Family::Knapsack, n, seed));
    model.set_sense(ObjSense::Maximize);

    let weights: Vec<f64> = (0..n).map(|_| f64::from(rng.range(10, 100))).collect();
    let mut row = Vec::with_capacity(n);
    for (j, &w) in weights.iter().enumerate() {
        let v = w + f64::from(rng.range(0, 10));
        row.push((model.add_binary(format!("x{}", j), v)?, w));
    }
    let capacity = (weights.iter().sum::<f64>() / 2.0).floor();
    model.add_linear("capacity", &row, f64::NEG_INFINITY, capacity)?;
    Ok(model)
}

fn multi_knapsack(n: usize, m: usize, seed: u64) -> CipResult<Model> {
    let mut rng = Lcg::new(seed);
    let mut model = Model::new(instance_name(Family::MultiKnapsack, n, seed));
    model.set_sense(ObjSense::Maximize);

    let vars: Vec<VarId> = (0..n)
        .map(|j| model.add_binary(format!("x{}", j), f64::from(rng.range(1, 50))))
        .collect::<CipResult<_>>()?;
    for i in 0..m {
        let row: Vec<(VarId, f64)> = vars.iter().map(|&v| (v, f64::from(rng.range(5, 40)))).collect();
        let capacity = (0.3 * row.iter().map(|(_, w)| w).sum::<f64>()).floor();
        model.add_linear(&format!("dim{}", i), &row, f64::NEG_INFINITY, capacity)?;
    }
    Ok(model)
}

/// min sum c x s.t. every element is covered at least once.
fn set_cover(n_sets: usize, n_elements: usize, seed: u64) -> CipResult<Model> {
    let mut rng = Lcg::new(seed);
    let mut model = Model::new(instance_name(Family::SetCover, n_sets, seed));

    let sets: Vec<VarId> = (0..n_sets)
        .map(|j| model.add_binary(format!("s{}", j), f64::from(rng.range(1, 20))))
        .collect::<CipResult<_>>()?;
    for e in 0..n_elements {
        let mut row: Vec<(VarId, f64)> = sets
            .iter()
            .filter(|_| rng.next_f64() < 0.15)
            .map(|&s| (s, 1.0))
            .collect();
        // Ensure at least two covering sets per element
        while row.len() < n_sets.min(2) {
            let s = sets[rng.range(0, n_sets as u32 - 1) as usize];
            if row.iter().all(|&(t, _)| t != s) {
                row.push((s, 1.0));
            }
        }
        model.add_linear(&format!("cover{}", e), &row, 1.0, f64::INFINITY)?;
    }
    Ok(model)
}

/// Capacitated facility location.
///
/// min sum f y + sum c x s.t. sum_i x_ij = d_j, sum_j x_ij <= u_i y_i,
/// x_ij <= d_j y_i, y binary, x >= 0.
fn facility(n_facilities: usize, n_customers: usize, seed: u64) -> CipResult<Model> {
    let mut rng = Lcg::new(seed);
    let mut model = Model::new(instance_name(Family::Facility, n_customers, seed));

    let demand: Vec<f64> = (0..n_customers).map(|_| f64::from(rng.range(5, 35))).collect();
    let total: f64 = demand.iter().sum();
    let open: Vec<VarId> = (0..n_facilities)
        .map(|i| model.add_binary(format!("y{}", i), f64::from(rng.range(100, 400))))
        .collect::<CipResult<_>>()?;
    let capacity: Vec<f64> = (0..n_facilities)
        .map(|_| (total * (0.4 + 0.4 * rng.next_f64())).ceil())
        .collect();

    let mut flow = vec![Vec::with_capacity(n_customers); n_facilities];
    for (i, row) in flow.iter_mut().enumerate() {
        for (j, &d) in demand.iter().enumerate() {
            let cost = f64::from(rng.range(1, 30));
            let x = model.add_continuous(format!("x{}_{}", i, j), 0.0, d, cost)?;
            model.add_linear(&format!("link{}_{}", i, j), &[(x, 1.0), (open[i], -d)], f64::NEG_INFINITY, 0.0)?;
            row.push(x);
        }
    }
    for (j, &d) in demand.iter().enumerate() {
        let row: Vec<(VarId, f64)> = flow.iter().map(|xs| (xs[j], 1.0)).collect();
        model.add_linear(&format!("demand{}", j), &row, d, d)?;
    }
    for (i, xs) in flow.iter().enumerate() {
        let mut row: Vec<(VarId, f64)> = xs.iter().map(|&x| (x, 1.0)).collect();
        row.push((open[i], -capacity[i]));
        model.add_linear(&format!("capacity{}", i), &row, f64::NEG_INFINITY, 0.0)?;
    }
    Ok(model)
}

/// Knapsack over groups of four items where each group contributes at
/// most one item (SOS1 on the binaries).
fn grouped_knapsack(n: usize, seed: u64) -> CipResult<Model> {
    let mut rng = Lcg::new(seed);
    let mut model = Model::new(instance_name(Family::GroupedKnapsack, n, seed));
    model.set_sense(ObjSense::Maximize);

    let mut row = Vec::with_capacity(n);
    let mut group = Vec::new();
    for j in 0..n {
        let w = f64::from(rng.range(10, 60));
        let x = model.add_binary(format!("x{}", j), w + f64::from(rng.range(0, 15)))?;
        row.push((x, w));
        group.push(x);
        if group.len() == 4 || j + 1 == n {
            model.add_sos1(&format!("group{}", j / 4), &group)?;
            group.clear();
        }
    }
    let capacity = (0.15 * row.iter().map(|(_, w)| w).sum::<f64>()).floor();
    model.add_linear("capacity", &row, f64::NEG_INFINITY, capacity)?;
    Ok(model)
}
