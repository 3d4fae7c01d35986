//! One-way proof sealing.
//!
//! A [`ProofGenerator`] starts `Pending` and becomes `Sealed` exactly once,
//! and only when every success condition holds. Sealing writes
//! `proof.json` (canonical JSON) and `proof.hash` (its hex SHA-256) into
//! the run directory; neither file is ever overwritten.

use crate::canonical::{canonical_json, hash_file};
use crate::error::{ProofError, ProofResult};
use crate::manifest::relative_key;
use crate::record::{ProofRecord, RunOutcome};
use chrono::{DateTime, Utc};
use qce_determinism::SEED_VERSION;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PROOF_JSON_FILE: &str = "proof.json";
pub const PROOF_HASH_FILE: &str = "proof.hash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofState {
    Pending,
    Sealed { record_hash: String },
}

#[derive(Debug)]
pub struct ProofGenerator {
    run_id: String,
    run_dir: PathBuf,
    started_at: DateTime<Utc>,
    code_artifacts: Vec<(String, PathBuf)>,
    input_document: Option<PathBuf>,
    calibration_digest: Option<String>,
    state: ProofState,
}

impl ProofGenerator {
    pub fn new(run_id: impl Into<String>, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id: run_id.into(),
            run_dir: run_dir.into(),
            started_at: Utc::now(),
            code_artifacts: Vec::new(),
            input_document: None,
            calibration_digest: None,
            state: ProofState::Pending,
        }
    }

    /// Source file whose hash joins the code signature under `name`.
    pub fn with_code_artifact(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.code_artifacts.push((name.into(), path.into()));
        self
    }

    pub fn with_input_document(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_document = Some(path.into());
        self
    }

    /// Digest of the calibration data in effect for the run.
    pub fn with_calibration_digest(mut self, digest: impl Into<String>) -> Self {
        self.calibration_digest = Some(digest.into());
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn state(&self) -> &ProofState {
        &self.state
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self.state, ProofState::Sealed { .. })
    }

    /// Seal the run if every success condition holds.
    ///
    /// Returns `Ok(None)` and stays pending when any condition fails; the
    /// caller may retry with a later outcome. Once sealed, every further
    /// call is `AlreadySealed`.
    pub fn try_seal(&mut self, outcome: &RunOutcome) -> ProofResult<Option<ProofRecord>> {
        if self.is_sealed() {
            return Err(ProofError::AlreadySealed {
                run_id: self.run_id.clone(),
            });
        }

        let unmet = outcome.unmet_conditions();
        if !unmet.is_empty() {
            tracing::warn!(
                run_id = %self.run_id,
                unmet = ?unmet,
                "Proof not generated"
            );
            return Ok(None);
        }

        let record = self.build_record(outcome)?;
        let bytes = canonical_json(&record)?;
        let record_hash = hex::encode(Sha256::digest(&bytes));

        std::fs::create_dir_all(&self.run_dir).map_err(|e| ProofError::io(&self.run_dir, e))?;
        let json_path = self.run_dir.join(PROOF_JSON_FILE);
        write_once(&json_path, &bytes)?;
        if let Err(e) = write_once(&self.run_dir.join(PROOF_HASH_FILE), record_hash.as_bytes()) {
            // An unsealed proof.json would block every later attempt.
            if let Err(cleanup) = std::fs::remove_file(&json_path) {
                tracing::error!(
                    run_id = %self.run_id,
                    path = %json_path.display(),
                    error = %cleanup,
                    "Failed to remove orphaned proof file"
                );
            }
            return Err(e);
        }

        tracing::info!(
            run_id = %self.run_id,
            record_hash = %record_hash,
            artifacts = record.artifacts_manifest.len(),
            "Proof sealed"
        );
        self.state = ProofState::Sealed { record_hash };
        Ok(Some(record))
    }

    fn build_record(&self, outcome: &RunOutcome) -> ProofResult<ProofRecord> {
        let mut code_signature = BTreeMap::new();
        for (name, path) in &self.code_artifacts {
            code_signature.insert(name.clone(), hash_file(path)?);
        }

        let input_document_hash = match &self.input_document {
            Some(path) => Some(hash_file(path)?),
            None => None,
        };

        let mut artifacts_manifest = BTreeMap::new();
        for path in outcome.existing_artifacts() {
            artifacts_manifest.insert(relative_key(&self.run_dir, path), hash_file(path)?);
        }

        Ok(ProofRecord {
            run_id: self.run_id.clone(),
            started_at: self.started_at.to_rfc3339(),
            sealed_at: Utc::now().to_rfc3339(),
            phases_total: outcome.phases_total,
            phases_success: outcome.phases_success,
            questions_total: outcome.questions_total,
            questions_answered: outcome.questions_answered,
            evidence_records: outcome.evidence_records,
            code_signature,
            input_document_hash,
            artifacts_manifest,
            calibration_hash: self.calibration_digest.clone(),
            seed_version: SEED_VERSION.to_string(),
            execution_metadata: outcome.execution_metadata.clone(),
        })
    }
}

/// Create `path` and write `bytes`; fails if the file already exists.
/// A file this call created is removed again when the write fails.
fn write_once(path: &Path, bytes: &[u8]) -> ProofResult<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| ProofError::io(path, e))?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(ProofError::io(path, e));
    }
    Ok(())
}
