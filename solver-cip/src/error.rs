//! Error types for the CIP solver.
//!
//! Infeasibility and unboundedness are solve outcomes reported through
//! [`crate::CipStatus`]; only conditions after which no solver state can be
//! trusted are errors.

use thiserror::Error;

/// Errors that can occur during CIP solving.
#[derive(Error, Debug)]
pub enum CipError {
    /// Problem validation failed
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Relaxation oracle failed outside of its status reporting
    #[error("Relaxation failed: {0}")]
    Relaxation(#[from] solver_core::LpError),

    /// A plugin callback violated its contract
    #[error("Plugin '{plugin}' failed: {message}")]
    PluginFault {
        /// Plugin name
        plugin: String,
        /// What went wrong
        message: String,
    },

    /// Allocation in the domain store, constraint set or search tree failed
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Internal solver error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CipError {
    /// Build a [`CipError::PluginFault`].
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        CipError::PluginFault {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

impl From<std::collections::TryReserveError> for CipError {
    fn from(e: std::collections::TryReserveError) -> Self {
        CipError::ResourceExhausted(e.to_string())
    }
}

/// Result type for CIP operations.
pub type CipResult<T> = Result<T, CipError>;
