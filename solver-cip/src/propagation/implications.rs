//! Binary implications and cliques.

use std::collections::HashMap;

use crate::domain::BoundKind;
use crate::error::{CipError, CipResult};
use crate::model::VarId;

/// Bound implied by fixing a binary variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Implication {
    /// Implied variable.
    pub var: VarId,
    /// Bound affected.
    pub kind: BoundKind,
    /// Implied bound value.
    pub value: f64,
}

/// Implication graph over binary variables.
///
/// A clique is a set of binaries of which at most one can be 1; fixing one
/// member to 1 fixes all others to 0.
#[derive(Debug, Clone, Default)]
pub struct ImplicationGraph {
    implications: HashMap<(VarId, bool), Vec<Implication>>,
    cliques: Vec<Vec<VarId>>,
    var_cliques: HashMap<VarId, Vec<usize>>,
}

impl ImplicationGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `var = value => implied`.
    pub fn add_implication(&mut self, var: VarId, value: bool, implied: Implication) -> CipResult<()> {
        if implied.var == var {
            return Err(CipError::InvalidProblem(format!("{} cannot imply a bound on itself", var)));
        }
        let list = self.implications.entry((var, value)).or_default();
        list.try_reserve(1)?;
        list.push(implied);
        Ok(())
    }

    /// Record a clique. Returns its index.
    pub fn add_clique(&mut self, vars: &[VarId]) -> CipResult<usize> {
        let mut members = vars.to_vec();
        members.sort();
        members.dedup();
        if members.len() != vars.len() {
            return Err(CipError::InvalidProblem("clique contains a variable twice".into()));
        }
        self.cliques.try_reserve(1)?;
        let idx = self.cliques.len();
        for &v in &members {
            self.var_cliques.entry(v).or_default().push(idx);
        }
        self.cliques.push(members);
        Ok(idx)
    }

    /// Whether the graph holds no implications and no cliques.
    pub fn is_empty(&self) -> bool {
        self.implications.is_empty() && self.cliques.is_empty()
    }

    /// Number of cliques.
    pub fn num_cliques(&self) -> usize {
        self.cliques.len()
    }

    /// Members of a clique.
    pub fn clique(&self, idx: usize) -> &[VarId] {
        &self.cliques[idx]
    }

    /// Direct consequences of fixing `var` to `value`.
    pub fn implied(&self, var: VarId, value: bool) -> Vec<Implication> {
        let mut out: Vec<Implication> = self
            .implications
            .get(&(var, value))
            .cloned()
            .unwrap_or_default();
        if value {
            for &c in self.var_cliques.get(&var).map(Vec::as_slice).unwrap_or(&[]) {
                out.extend(self.cliques[c].iter().filter(|&&v| v != var).map(|&v| Implication {
                    var: v,
                    kind: BoundKind::Upper,
                    value: 0.0,
                }));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clique_consequences() {
        let mut g = ImplicationGraph::new();
        g.add_clique(&[VarId(0), VarId(1), VarId(2)]).unwrap();

        let imp = g.implied(VarId(1), true);
        assert_eq!(imp.len(), 2);
        assert!(imp.iter().all(|i| i.kind == BoundKind::Upper && i.value == 0.0));
        assert!(g.implied(VarId(1), false).is_empty());

        assert!(g.add_clique(&[VarId(3), VarId(3)]).is_err());
    }

    #[test]
    fn test_implications() {
        let mut g = ImplicationGraph::new();
        let imp = Implication {
            var: VarId(4),
            kind: BoundKind::Lower,
            value: 2.0,
        };
        g.add_implication(VarId(0), false, imp).unwrap();
        assert_eq!(g.implied(VarId(0), false), vec![imp]);
        assert!(g.implied(VarId(0), true).is_empty());
        assert!(g.add_implication(VarId(4), true, imp).is_err());
    }
}
