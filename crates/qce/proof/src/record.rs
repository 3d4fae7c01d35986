//! Proof record and the run outcome it is sealed from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What a run reports when asking to be sealed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub phases_total: usize,
    pub phases_success: usize,
    pub questions_total: usize,
    pub questions_answered: usize,
    pub evidence_records: usize,
    pub aborted: bool,
    /// Output artifacts of the run; those that exist are hashed.
    pub artifacts: Vec<PathBuf>,
    /// Extra facts recorded verbatim in the proof.
    pub execution_metadata: BTreeMap<String, Value>,
}

impl RunOutcome {
    /// Existing artifact files, in the order given.
    pub fn existing_artifacts(&self) -> Vec<&PathBuf> {
        self.artifacts.iter().filter(|p| p.is_file()).collect()
    }

    /// Human-readable list of the success conditions that do not hold.
    pub fn unmet_conditions(&self) -> Vec<String> {
        let mut unmet = Vec::new();
        if self.phases_total == 0 {
            unmet.push("no phases were expected".to_string());
        } else if self.phases_success != self.phases_total {
            unmet.push(format!(
                "{} of {} phases executed successfully",
                self.phases_success, self.phases_total
            ));
        }
        if self.aborted {
            unmet.push("abort signal raised".to_string());
        }
        if self.existing_artifacts().is_empty() {
            unmet.push("no output artifact exists on disk".to_string());
        }
        unmet
    }
}

/// Sealed, hash-verifiable summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub run_id: String,
    pub started_at: String,
    pub sealed_at: String,
    pub phases_total: usize,
    pub phases_success: usize,
    pub questions_total: usize,
    pub questions_answered: usize,
    pub evidence_records: usize,
    /// Code artifact name to SHA-256.
    pub code_signature: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_document_hash: Option<String>,
    /// Output artifact path to SHA-256.
    pub artifacts_manifest: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_hash: Option<String>,
    pub seed_version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub execution_metadata: BTreeMap<String, Value>,
}
