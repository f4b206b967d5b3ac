//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PedraError {
    /// The size of the action space is not a perfect square.
    #[error("Invalid action space: {num_actions} is not a perfect square")]
    InvalidActionSpace { num_actions: usize },

    /// The action index is outside of the action space.
    #[error("Invalid action: {action} is not in [0, {num_actions})")]
    InvalidAction { action: usize, num_actions: usize },

    /// The shape of a state batch or a training batch does not match the configuration.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// A parameter vector does not match the architecture of the network.
    #[error("Parameter shape mismatch at {name}: expected {expected}, got {got}")]
    ParameterShapeMismatch {
        name: String,
        expected: String,
        got: String,
    },

    /// Members of an averaging cohort have different parameter layouts.
    #[error("Cohort mismatch: {0}")]
    CohortMismatch(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// A per-instance lock was poisoned by a panicking holder.
    #[error("Lock poisoned: {0}")]
    Lock(String),
}
