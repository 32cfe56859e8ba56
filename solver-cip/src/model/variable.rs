//! Decision variables.

use std::fmt;

/// Stable arena index of a variable.
///
/// Ids are never reused during a solve; they index every per-variable array
/// (domains, LP columns, solution vectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarId(pub usize);

impl VarId {
    /// Index into per-variable arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Variable type. The declaration order is the partition order of the
/// problem's variable array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarType {
    /// Integer variable with bounds within [0, 1]
    Binary,
    /// General integer variable
    Integer,
    /// Continuous variable that takes integral values in every optimal solution
    ImplicitInteger,
    /// Continuous variable
    Continuous,
}

impl VarType {
    /// All types in partition order.
    pub const ALL: [VarType; 4] = [
        VarType::Binary,
        VarType::Integer,
        VarType::ImplicitInteger,
        VarType::Continuous,
    ];

    /// Position of this type's partition.
    #[inline]
    pub fn partition(self) -> usize {
        match self {
            VarType::Binary => 0,
            VarType::Integer => 1,
            VarType::ImplicitInteger => 2,
            VarType::Continuous => 3,
        }
    }

    /// Whether bounds of this type are rounded to integers.
    pub fn is_integral(self) -> bool {
        !matches!(self, VarType::Continuous)
    }

    /// Whether the branching engine considers this type.
    pub fn is_branchable(self) -> bool {
        matches!(self, VarType::Binary | VarType::Integer)
    }
}

/// A decision variable of the problem.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Unique name.
    pub name: String,

    /// Type.
    pub var_type: VarType,

    /// Objective coefficient as given by the user.
    pub obj: f64,

    /// Lower bound at formulation time.
    pub lb: f64,

    /// Upper bound at formulation time.
    pub ub: f64,

    /// Position in the type-partitioned order array
    /// (None once compacted out).
    pub(crate) prob_index: Option<usize>,
}

impl Variable {
    /// Whether the variable is still part of the type-partitioned problem.
    pub fn is_active(&self) -> bool {
        self.prob_index.is_some()
    }
}
