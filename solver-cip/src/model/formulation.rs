//! Problem formulation: variables, constraints and structural information.

use std::collections::HashMap;

use super::problem::{ObjSense, Problem};
use super::variable::{VarId, VarType, Variable};
use crate::constraint::{ConsId, ConstraintHandler, ConstraintSet, HandlerId, LinearHandler, Scope, Sos1Handler};
use crate::domain::BoundKind;
use crate::error::{CipError, CipResult};
use crate::propagation::{Implication, ImplicationGraph};
use crate::relaxation::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinearKind {
    Plain,
    Lazy,
    Modifiable,
}

/// A constraint integer program.
///
/// Owns the variables, the built-in linear and SOS1 handlers, any custom
/// handlers and the problem-wide constraint list. Handed to
/// [`crate::solve`] or [`crate::Solver::solve`] by value.
pub struct Model {
    pub(crate) problem: Problem,
    pub(crate) linear: LinearHandler,
    pub(crate) sos1: Sos1Handler,
    pub(crate) custom: Vec<Box<dyn ConstraintHandler>>,
    pub(crate) conss: ConstraintSet,
    pub(crate) implications: ImplicationGraph,
    cons_names: HashMap<String, ConsId>,
}

impl Model {
    /// Create an empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            problem: Problem::new(name),
            linear: LinearHandler::new(),
            sos1: Sos1Handler::new(),
            custom: Vec::new(),
            conss: ConstraintSet::new(2),
            implications: ImplicationGraph::new(),
            cons_names: HashMap::new(),
        }
    }

    /// Add a variable.
    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        var_type: VarType,
        lb: f64,
        ub: f64,
        obj: f64,
    ) -> CipResult<VarId> {
        self.problem.add_var(name, var_type, lb, ub, obj)
    }

    /// Add a binary variable.
    pub fn add_binary(&mut self, name: impl Into<String>, obj: f64) -> CipResult<VarId> {
        self.add_var(name, VarType::Binary, 0.0, 1.0, obj)
    }

    /// Add a general integer variable.
    pub fn add_integer(&mut self, name: impl Into<String>, lb: f64, ub: f64, obj: f64) -> CipResult<VarId> {
        self.add_var(name, VarType::Integer, lb, ub, obj)
    }

    /// Add a continuous variable.
    pub fn add_continuous(&mut self, name: impl Into<String>, lb: f64, ub: f64, obj: f64) -> CipResult<VarId> {
        self.add_var(name, VarType::Continuous, lb, ub, obj)
    }

    /// Add `lhs <= sum coef * x <= rhs`.
    pub fn add_linear(&mut self, name: &str, coefs: &[(VarId, f64)], lhs: f64, rhs: f64) -> CipResult<ConsId> {
        self.add_linear_row(name, coefs, lhs, rhs, LinearKind::Plain)
    }

    /// Add a lazy linear constraint: it stays out of the relaxation and is
    /// only enforced once a solution violates it.
    pub fn add_linear_lazy(&mut self, name: &str, coefs: &[(VarId, f64)], lhs: f64, rhs: f64) -> CipResult<ConsId> {
        self.add_linear_row(name, coefs, lhs, rhs, LinearKind::Lazy)
    }

    /// Add a linear constraint that pricers may extend with new columns.
    ///
    /// Only modifiable constraints accept coefficients of priced columns.
    /// They are not used for bound propagation, and Gomory cuts are
    /// disabled for models that contain them.
    pub fn add_linear_modifiable(
        &mut self,
        name: &str,
        coefs: &[(VarId, f64)],
        lhs: f64,
        rhs: f64,
    ) -> CipResult<ConsId> {
        self.add_linear_row(name, coefs, lhs, rhs, LinearKind::Modifiable)
    }

    fn add_linear_row(
        &mut self,
        name: &str,
        coefs: &[(VarId, f64)],
        lhs: f64,
        rhs: f64,
        kind: LinearKind,
    ) -> CipResult<ConsId> {
        self.check_cons_name(name)?;
        for &(v, a) in coefs {
            self.check_var(v)?;
            if !a.is_finite() {
                return Err(CipError::InvalidProblem(format!(
                    "constraint '{}' has coefficient {} for {}",
                    name, a, v
                )));
            }
        }
        if lhs.is_nan() || rhs.is_nan() || lhs > rhs || lhs == f64::INFINITY || rhs == f64::NEG_INFINITY {
            return Err(CipError::InvalidProblem(format!(
                "constraint '{}' has invalid sides [{}, {}]",
                name, lhs, rhs
            )));
        }

        let local = self
            .linear
            .add_row(name, Row::new(coefs, lhs, rhs), kind == LinearKind::Lazy)
            .ok_or_else(|| CipError::InternalError("linear handler rejected a row".into()))?;
        if kind == LinearKind::Modifiable {
            self.linear.set_modifiable(local)?;
        }
        let id = self.conss.add(HandlerId::LINEAR, local, Scope::Global)?;
        self.cons_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Add a special ordered set of type 1: at most one member is nonzero.
    /// Members must have nonnegative lower bounds.
    pub fn add_sos1(&mut self, name: &str, vars: &[VarId]) -> CipResult<ConsId> {
        self.check_cons_name(name)?;
        for &v in vars {
            self.check_var(v)?;
            if self.problem.var(v).lb < 0.0 {
                return Err(CipError::InvalidProblem(format!(
                    "SOS1 '{}' member '{}' has a negative lower bound",
                    name,
                    self.problem.var(v).name
                )));
            }
        }
        let local = self.sos1.add_set(name, vars)?;
        let id = self.conss.add(HandlerId::SOS1, local, Scope::Global)?;
        self.cons_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Declare that at most one of the binary `vars` is 1.
    ///
    /// The clique is used for implication reasoning and added as the row
    /// `sum x <= 1`.
    pub fn add_clique(&mut self, name: &str, vars: &[VarId]) -> CipResult<ConsId> {
        for &v in vars {
            self.check_binary(v)?;
        }
        let coefs: Vec<(VarId, f64)> = vars.iter().map(|&v| (v, 1.0)).collect();
        let id = self.add_linear(name, &coefs, f64::NEG_INFINITY, 1.0)?;
        self.implications.add_clique(vars)?;
        Ok(id)
    }

    /// Declare that fixing binary `var` to `value` implies
    /// `implied_var >= bound` (Lower) or `implied_var <= bound` (Upper).
    ///
    /// Implications speed up propagation only. They must follow from the
    /// model's constraints; solutions are not checked against them.
    pub fn add_implication(
        &mut self,
        var: VarId,
        value: bool,
        implied_var: VarId,
        kind: BoundKind,
        bound: f64,
    ) -> CipResult<()> {
        self.check_binary(var)?;
        self.check_var(implied_var)?;
        if !bound.is_finite() {
            return Err(CipError::InvalidProblem(format!("implication bound {} is not finite", bound)));
        }
        self.implications.add_implication(
            var,
            value,
            Implication {
                var: implied_var,
                kind,
                value: bound,
            },
        )
    }

    /// Include a custom constraint handler. Its constraints are registered
    /// with [`Model::add_constraint`].
    pub fn include_handler(&mut self, handler: Box<dyn ConstraintHandler>) -> HandlerId {
        self.custom.push(handler);
        self.conss.add_handler()
    }

    /// Register constraint `local` of a custom handler as a global
    /// constraint.
    pub fn add_constraint(&mut self, handler: HandlerId, local: usize) -> CipResult<ConsId> {
        let Some(h) = handler.0.checked_sub(2).and_then(|i| self.custom.get(i)) else {
            return Err(CipError::InvalidProblem(format!("{} is not a custom handler", handler)));
        };
        if local >= h.num_constraints() {
            return Err(CipError::InvalidProblem(format!(
                "handler '{}' has no constraint {}",
                h.name(),
                local
            )));
        }
        self.conss.add(handler, local, Scope::Global)
    }

    fn check_var(&self, v: VarId) -> CipResult<()> {
        if v.0 >= self.problem.num_vars() {
            return Err(CipError::InvalidProblem(format!("unknown variable {}", v)));
        }
        Ok(())
    }

    fn check_binary(&self, v: VarId) -> CipResult<()> {
        self.check_var(v)?;
        let var = self.problem.var(v);
        if !var.var_type.is_integral() || var.lb < 0.0 || var.ub > 1.0 {
            return Err(CipError::InvalidProblem(format!("variable '{}' is not binary", var.name)));
        }
        Ok(())
    }

    fn check_cons_name(&self, name: &str) -> CipResult<()> {
        if self.cons_names.contains_key(name) {
            return Err(CipError::InvalidProblem(format!("duplicate constraint name '{}'", name)));
        }
        Ok(())
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.problem.num_vars()
    }

    /// Number of constraints.
    pub fn num_constraints(&self) -> usize {
        self.conss.len()
    }

    /// Variable by id.
    pub fn var(&self, id: VarId) -> &Variable {
        self.problem.var(id)
    }

    /// Look up a variable by name.
    pub fn find_var(&self, name: &str) -> Option<VarId> {
        self.problem.find_var(name)
    }

    /// Look up a constraint by name.
    pub fn find_cons(&self, name: &str) -> Option<ConsId> {
        self.cons_names.get(name).copied()
    }

    /// Variables and objective.
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Change a variable's type.
    pub fn change_var_type(&mut self, id: VarId, ty: VarType) -> CipResult<()> {
        self.check_var(id)?;
        self.problem.change_var_type(id, ty)
    }

    /// Set objective sense.
    pub fn set_sense(&mut self, sense: ObjSense) {
        self.problem.set_sense(sense);
    }

    /// Set the constant added to the objective.
    pub fn set_offset(&mut self, offset: f64) {
        self.problem.set_offset(offset);
    }

    /// Only accept solutions strictly better than `limit` (user sense).
    pub fn set_obj_limit(&mut self, limit: Option<f64>) {
        self.problem.set_obj_limit(limit);
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.problem.name)
            .field("vars", &self.problem.num_vars())
            .field("constraints", &self.conss.len())
            .field("custom_handlers", &self.custom.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_model() {
        let mut m = Model::new("m");
        let x = m.add_binary("x", 1.0).unwrap();
        let y = m.add_integer("y", 0.0, 5.0, 1.0).unwrap();
        let c = m.add_linear("c", &[(x, 1.0), (y, 2.0)], 1.0, 4.0).unwrap();
        assert_eq!(m.find_cons("c"), Some(c));
        assert_eq!(m.num_constraints(), 1);
        assert_eq!(m.linear.row(0).rhs, 4.0);

        assert!(m.add_linear("c", &[(x, 1.0)], 0.0, 1.0).is_err());
        assert!(m.add_linear("bad", &[(x, 1.0)], 2.0, 1.0).is_err());
        assert!(m.add_linear("nan", &[(x, f64::NAN)], 0.0, 1.0).is_err());
        assert!(m.add_linear("unknown", &[(VarId(9), 1.0)], 0.0, 1.0).is_err());
    }

    #[test]
    fn test_modifiable_constraint() {
        let mut m = Model::new("m");
        let x = m.add_integer("x", 0.0, 10.0, 2.0).unwrap();
        let c = m.add_linear_modifiable("demand", &[(x, 1.0)], 3.0, f64::INFINITY).unwrap();
        let d = m.add_linear("plain", &[(x, 1.0)], 0.0, 8.0).unwrap();
        assert!(m.linear.is_modifiable(m.conss.local_index(c)));
        assert!(!m.linear.is_modifiable(m.conss.local_index(d)));
    }

    #[test]
    fn test_structure() {
        let mut m = Model::new("m");
        let a = m.add_binary("a", 0.0).unwrap();
        let b = m.add_binary("b", 0.0).unwrap();
        let z = m.add_continuous("z", -1.0, 1.0, 0.0).unwrap();

        m.add_clique("ab", &[a, b]).unwrap();
        assert_eq!(m.implications.num_cliques(), 1);
        assert_eq!(m.num_constraints(), 1);

        assert!(m.add_clique("az", &[a, z]).is_err());
        // Duplicate name: neither row nor clique is recorded
        assert!(m.add_clique("ab", &[a, b]).is_err());
        assert_eq!(m.implications.num_cliques(), 1);
        assert_eq!(m.num_constraints(), 1);
        assert!(m.add_sos1("s", &[a, z]).is_err());
        m.add_sos1("s", &[a, b]).unwrap();

        m.add_implication(a, true, z, BoundKind::Upper, 0.0).unwrap();
        assert!(m.add_implication(z, true, a, BoundKind::Upper, 0.0).is_err());
        assert!(m.add_constraint(HandlerId(2), 0).is_err());
    }
}
