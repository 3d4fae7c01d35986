//! Error types for evidence validation.

use thiserror::Error;

/// Raised only when the rule set itself is unusable. Ordinary rule
/// violations are diagnostics, not errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed validation rules at {path}: {reason}")]
    Malformed { path: String, reason: String },
}
