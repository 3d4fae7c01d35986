//! Error types for the engine.

use qce_contracts::ContractError;
use qce_determinism::DeterminismError;
use qce_evidence::ValidationError;
use qce_executor::{EnvironmentFatal, ExecutorFailure};
use qce_proof::ProofError;
use qce_types::{ConfigurationError, EventId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the engine's own configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything that surfaces to the caller of the engine.
///
/// Failures of non-essential methods never appear here; they are recorded
/// in the execution record and the question carries on.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Determinism(#[from] DeterminismError),

    /// An essential method failed, so the question failed.
    #[error("question {question_id} failed: {failure}")]
    MethodFailed {
        question_id: String,
        #[source]
        failure: ExecutorFailure,
    },

    /// The execution environment gave out; the run is aborted.
    #[error("question {question_id} aborted: {fatal}")]
    Fatal {
        question_id: String,
        #[source]
        fatal: EnvironmentFatal,
    },

    /// The run was aborted before this question started.
    #[error("run aborted before question {question_id} started")]
    Aborted { question_id: String },

    #[error("validation of question {question_id} failed: {source}")]
    Validation {
        question_id: String,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error("worker for question {question_id} did not complete: {reason}")]
    Worker { question_id: String, reason: String },
}

impl EngineError {
    /// Event id correlating this error with a method invocation, if any.
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            Self::MethodFailed { failure, .. } => Some(failure.event_id),
            Self::Fatal { fatal, .. } => Some(fatal.event_id),
            _ => None,
        }
    }

    /// Whether the error ends the whole run rather than one question.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Aborted { .. })
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
