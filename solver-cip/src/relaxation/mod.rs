//! Relaxation oracle adapter.
//!
//! The search talks to the LP solver only through [`RelaxationOracle`]:
//! - Columns are problem variables, rows are identified by [`RowKey`]
//! - Bounds are pushed from the domain store before every solve
//! - Warm starts use a [`SavedBasis`] keyed by row identity, so a child node
//!   can start from its parent's basis although its row set differs
//!
//! [`SimplexOracle`] is the default implementation over `solver-core`.

mod oracle;
mod row;
mod simplex_oracle;

pub use oracle::{
    BasisStatus, LpColumn, RelaxationOracle, RelaxationResult, RelaxationStatus, SavedBasis,
    TableauEntry, TableauRow,
};
pub use row::{ColumnData, Row, RowKey};
pub use simplex_oracle::SimplexOracle;
