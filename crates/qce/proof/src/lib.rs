//! Proof Generator for QCE
//!
//! A run is sealed at most once, and only when every success condition
//! holds at the same time:
//!
//! 1. the number of executed phases equals the number expected,
//! 2. no abort signal was raised,
//! 3. at least one output artifact exists on disk.
//!
//! Otherwise the [`ProofGenerator`] stays [`ProofState::Pending`] and emits
//! nothing. Sealing writes `proof.json`, the canonical JSON of the
//! [`ProofRecord`] (sorted keys, compact separators), and `proof.hash`, the
//! hex SHA-256 of those bytes. Both files are write-once.

#![deny(unsafe_code)]

pub mod canonical;
pub mod error;
pub mod generator;
pub mod manifest;
pub mod record;

pub use canonical::{canonical_json, hash_canonical, hash_file};
pub use error::{ProofError, ProofResult};
pub use generator::{ProofGenerator, ProofState, PROOF_HASH_FILE, PROOF_JSON_FILE};
pub use manifest::{collect_artifacts_manifest, verify_proof, verify_run_dir, ProofVerification};
pub use record::{ProofRecord, RunOutcome};
