//! Error types for proof generation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while sealing or verifying a proof.
///
/// Unmet success conditions are not errors: the generator simply stays
/// pending.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The run already has a proof.
    #[error("run {run_id} is already sealed")]
    AlreadySealed { run_id: String },

    /// A code artifact or input document named for hashing is missing.
    #[error("cannot hash missing file {}", .path.display())]
    MissingFile { path: PathBuf },

    #[error("i/o error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("proof serialization failed")]
    Serialization(#[from] serde_json::Error),
}

impl ProofError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for proof operations.
pub type ProofResult<T> = Result<T, ProofError>;
