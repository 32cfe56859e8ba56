//! Variable arena with type partitions and objective data.

use std::collections::HashMap;

use super::variable::{VarId, VarType, Variable};
use crate::error::{CipError, CipResult};

/// Objective sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjSense {
    /// Minimize the objective
    #[default]
    Minimize,
    /// Maximize the objective
    Maximize,
}

impl ObjSense {
    /// +1 for minimization, -1 for maximization.
    pub fn sign(self) -> f64 {
        match self {
            ObjSense::Minimize => 1.0,
            ObjSense::Maximize => -1.0,
        }
    }
}

/// Problem variables and objective.
///
/// Variables live in an arena indexed by [`VarId`]. Active variables are
/// additionally kept in an order array partitioned by type
/// (binary < integer < implicit integer < continuous); type changes and
/// removals move at most one element per partition.
#[derive(Debug, Clone, Default)]
pub struct Problem {
    /// Problem name.
    pub name: String,

    /// Variable arena.
    vars: Vec<Variable>,

    /// Type-partitioned order of active variables.
    order: Vec<VarId>,

    /// Partition sizes, indexed by [`VarType::partition`].
    counts: [usize; 4],

    /// Name lookup.
    names: HashMap<String, VarId>,

    /// Objective sense.
    sense: ObjSense,

    /// Constant added to the external objective.
    offset: f64,

    /// External objective limit: only strictly better solutions are accepted.
    obj_limit: Option<f64>,
}

impl Problem {
    /// Create an empty problem.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a variable. Integral bounds are rounded inward; binaries are
    /// clamped to [0, 1]. An empty domain (lb > ub) is accepted and
    /// detected when solving starts.
    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        var_type: VarType,
        lb: f64,
        ub: f64,
        obj: f64,
    ) -> CipResult<VarId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(CipError::InvalidProblem(format!("duplicate variable name '{}'", name)));
        }
        if lb.is_nan() || ub.is_nan() || lb == f64::INFINITY || ub == f64::NEG_INFINITY {
            return Err(CipError::InvalidProblem(format!(
                "variable '{}' has invalid bounds [{}, {}]",
                name, lb, ub
            )));
        }
        if !obj.is_finite() {
            return Err(CipError::InvalidProblem(format!(
                "variable '{}' has non-finite objective {}",
                name, obj
            )));
        }

        let (lb, ub) = normalize_bounds(var_type, lb, ub);
        self.vars.try_reserve(1)?;
        self.order.try_reserve(1)?;

        let id = VarId(self.vars.len());
        self.vars.push(Variable {
            name: name.clone(),
            var_type,
            obj,
            lb,
            ub,
            prob_index: None,
        });
        self.names.insert(name, id);
        self.insert_into_partition(id, var_type);
        Ok(id)
    }

    /// Number of variables in the arena (including compacted ones).
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Number of active variables of a type.
    pub fn num_of_type(&self, ty: VarType) -> usize {
        self.counts[ty.partition()]
    }

    /// Variable by id.
    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0]
    }

    /// All variables in arena order.
    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    /// Look up a variable by name.
    pub fn find_var(&self, name: &str) -> Option<VarId> {
        self.names.get(name).copied()
    }

    /// Active variables in partition order.
    pub fn order(&self) -> &[VarId] {
        &self.order
    }

    /// Active binary and general integer variables.
    pub fn branchable_vars(&self) -> &[VarId] {
        &self.order[..self.counts[0] + self.counts[1]]
    }

    /// Active variables of one type.
    pub fn vars_of_type(&self, ty: VarType) -> &[VarId] {
        let p = ty.partition();
        let start = self.partition_start(p);
        &self.order[start..start + self.counts[p]]
    }

    /// Whether a variable's values must be integral.
    pub fn is_integral(&self, id: VarId) -> bool {
        self.vars[id.0].var_type.is_integral()
    }

    /// Change the type of a variable in O(1), keeping partitions contiguous.
    ///
    /// Changing to [`VarType::Binary`] requires bounds within [0, 1] after
    /// rounding.
    pub fn change_var_type(&mut self, id: VarId, ty: VarType) -> CipResult<()> {
        let old = self.vars[id.0].var_type;
        if old == ty {
            return Ok(());
        }
        let (lb, ub) = normalize_bounds(ty, self.vars[id.0].lb, self.vars[id.0].ub);
        if ty == VarType::Binary && (self.vars[id.0].lb < -0.5 || self.vars[id.0].ub > 1.5) {
            return Err(CipError::InvalidProblem(format!(
                "variable '{}' with bounds [{}, {}] cannot become binary",
                self.vars[id.0].name, self.vars[id.0].lb, self.vars[id.0].ub
            )));
        }
        let active = self.vars[id.0].prob_index.is_some();
        if active {
            self.remove_from_partition(id);
        }
        let var = &mut self.vars[id.0];
        var.var_type = ty;
        var.lb = lb;
        var.ub = ub;
        if active {
            self.insert_into_partition(id, ty);
        }
        Ok(())
    }

    /// Remove a permanently fixed variable from the partition array.
    ///
    /// The arena entry (and its relaxation column) stays; only iteration over
    /// [`Problem::order`] no longer visits it.
    pub fn compact_fixed(&mut self, id: VarId) {
        if self.vars[id.0].prob_index.is_some() {
            self.remove_from_partition(id);
        }
    }

    /// Objective sense.
    pub fn sense(&self) -> ObjSense {
        self.sense
    }

    /// Set objective sense.
    pub fn set_sense(&mut self, sense: ObjSense) {
        self.sense = sense;
    }

    /// Objective offset.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Set the constant added to the objective.
    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
    }

    /// Set an external objective limit.
    pub fn set_obj_limit(&mut self, limit: Option<f64>) {
        self.obj_limit = limit;
    }

    /// External objective limit.
    pub fn obj_limit(&self) -> Option<f64> {
        self.obj_limit
    }

    /// Objective coefficient in the internal minimization sense.
    #[inline]
    pub fn internal_obj(&self, id: VarId) -> f64 {
        self.sense.sign() * self.vars[id.0].obj
    }

    /// Internal objective coefficients in arena order.
    pub fn internal_objective(&self) -> Vec<f64> {
        self.vars.iter().map(|v| self.sense.sign() * v.obj).collect()
    }

    /// Internal objective value of a full solution vector.
    pub fn internal_value(&self, x: &[f64]) -> f64 {
        self.vars
            .iter()
            .zip(x)
            .map(|(v, xi)| self.sense.sign() * v.obj * xi)
            .sum()
    }

    /// Map an internal (minimization) value to the user's objective.
    pub fn external(&self, internal: f64) -> f64 {
        self.sense.sign() * internal + self.offset
    }

    /// Map a user objective value to the internal minimization sense.
    pub fn internal(&self, external: f64) -> f64 {
        self.sense.sign() * (external - self.offset)
    }

    fn partition_start(&self, p: usize) -> usize {
        self.counts[..p].iter().sum()
    }

    fn place(&mut self, pos: usize, id: VarId) {
        self.order[pos] = id;
        self.vars[id.0].prob_index = Some(pos);
    }

    /// Insert at the end of partition `ty`, shifting the first element of
    /// each later partition to that partition's end.
    fn insert_into_partition(&mut self, id: VarId, ty: VarType) {
        let p = ty.partition();
        self.order.push(id);
        let mut hole = self.order.len() - 1;
        for t in (p + 1..4).rev() {
            let start = self.partition_start(t);
            if self.counts[t] > 0 {
                let moved = self.order[start];
                self.place(hole, moved);
            }
            hole = start;
        }
        self.place(hole, id);
        self.counts[p] += 1;
    }

    /// Remove from its partition by swapping with the partition's last
    /// element and closing the gap with the last element of each later
    /// partition.
    fn remove_from_partition(&mut self, id: VarId) {
        let Some(pos) = self.vars[id.0].prob_index else {
            return;
        };
        let p = self.vars[id.0].var_type.partition();
        let end = self.partition_start(p) + self.counts[p];
        let mut hole = pos;
        if end - 1 != hole {
            let moved = self.order[end - 1];
            self.place(hole, moved);
        }
        hole = end - 1;
        for t in p + 1..4 {
            if self.counts[t] == 0 {
                continue;
            }
            let last = self.partition_start(t) + self.counts[t] - 1;
            let moved = self.order[last];
            self.place(hole, moved);
            hole = last;
        }
        self.order.pop();
        self.counts[p] -= 1;
        self.vars[id.0].prob_index = None;
    }
}

fn normalize_bounds(ty: VarType, lb: f64, ub: f64) -> (f64, f64) {
    match ty {
        VarType::Binary => ((lb.ceil()).max(0.0), (ub.floor()).min(1.0)),
        VarType::Integer | VarType::ImplicitInteger => (lb.ceil(), ub.floor()),
        VarType::Continuous => (lb, ub),
    }
}
