//! Error types for contract loading.

use thiserror::Error;

/// Errors raised while loading or validating a contract.
///
/// All of them are configuration errors: a contract that fails here never
/// reaches execution.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The store has no contract for the question.
    #[error("no contract for question {question_id}")]
    NotFound { question_id: String },

    /// Required fields are missing or the contract is structurally invalid.
    #[error("contract {question_id} violates schema: {}", describe_schema(.missing, .violations))]
    Schema {
        question_id: String,
        missing: Vec<String>,
        violations: Vec<String>,
    },

    /// Two methods share a priority where order must be total.
    #[error("contract {question_id} has ambiguous ordering: priority {priority} shared by {}", .methods.join(", "))]
    Ordering {
        question_id: String,
        priority: i64,
        methods: Vec<String>,
    },

    /// The store could not read the contract.
    #[error("failed to read contract {question_id}")]
    Io {
        question_id: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored contract is not valid JSON.
    #[error("contract {question_id} is not valid JSON")]
    Parse {
        question_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ContractError {
    pub fn question_id(&self) -> &str {
        match self {
            Self::NotFound { question_id }
            | Self::Schema { question_id, .. }
            | Self::Ordering { question_id, .. }
            | Self::Io { question_id, .. }
            | Self::Parse { question_id, .. } => question_id,
        }
    }
}

fn describe_schema(missing: &[String], violations: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required fields [{}]", missing.join(", ")));
    }
    parts.extend(violations.iter().cloned());
    parts.join("; ")
}

/// Result type for contract operations.
pub type ContractResult<T> = Result<T, ContractError>;
