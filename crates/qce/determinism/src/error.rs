//! Error types for the determinism context.

use thiserror::Error;

/// Errors raised when entering a determinism scope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeterminismError {
    /// A scope is already active on this thread.
    #[error("determinism scope already active on this thread (policy unit {active_policy_unit})")]
    NestedScope { active_policy_unit: String },

    /// Seed material must not be empty.
    #[error("empty {0} is not valid seed material")]
    EmptyIdentifier(&'static str),
}

/// Result type for determinism operations.
pub type DeterminismResult<T> = Result<T, DeterminismError>;
