//! Contract stores: where raw contract JSON comes from.

use crate::error::{ContractError, ContractResult};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of raw contract JSON.
///
/// `Ok(None)` means the store has no contract for the question; `Err` is
/// reserved for stores that exist but cannot be read.
pub trait ContractStore: Send + Sync {
    fn load(&self, question_id: &str) -> ContractResult<Option<Value>>;

    /// Question ids the store can serve, when it can enumerate them.
    fn question_ids(&self) -> ContractResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Name of this store for logging.
    fn name(&self) -> &str;
}

// ── In-memory store ────────────────────────────────────────────────────

/// Contracts held in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContractStore {
    contracts: HashMap<String, Value>,
}

impl InMemoryContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, question_id: impl Into<String>, raw: Value) {
        self.contracts.insert(question_id.into(), raw);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_contract(mut self, question_id: impl Into<String>, raw: Value) -> Self {
        self.insert(question_id, raw);
        self
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl ContractStore for InMemoryContractStore {
    fn load(&self, question_id: &str) -> ContractResult<Option<Value>> {
        Ok(self.contracts.get(question_id).cloned())
    }

    fn question_ids(&self) -> ContractResult<Vec<String>> {
        let mut ids: Vec<String> = self.contracts.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

// ── Directory store ────────────────────────────────────────────────────

/// Contracts stored as `<dir>/<question_id>.json`.
#[derive(Debug, Clone)]
pub struct DirectoryContractStore {
    root: PathBuf,
}

impl DirectoryContractStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn contract_path(&self, question_id: &str) -> Option<PathBuf> {
        let safe = !question_id.is_empty()
            && question_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        safe.then(|| self.root.join(format!("{question_id}.json")))
    }
}

impl ContractStore for DirectoryContractStore {
    fn load(&self, question_id: &str) -> ContractResult<Option<Value>> {
        let Some(path) = self.contract_path(question_id) else {
            tracing::warn!(question_id, "Question id is not a valid contract file name");
            return Ok(None);
        };

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ContractError::Io {
                    question_id: question_id.to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| ContractError::Parse {
                question_id: question_id.to_string(),
                source,
            })
    }

    fn question_ids(&self) -> ContractResult<Vec<String>> {
        let io_error = |source| ContractError::Io {
            question_id: self.root.display().to_string(),
            source,
        };
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn name(&self) -> &str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_memory_store_serves_inserted_contracts() {
        let store = InMemoryContractStore::new().with_contract("D1Q1", json!({"question_id": "D1Q1"}));
        assert_eq!(store.len(), 1);
        assert!(store.load("D1Q1").unwrap().is_some());
        assert!(store.load("D1Q2").unwrap().is_none());
        assert_eq!(store.question_ids().unwrap(), ["D1Q1"]);
    }

    #[test]
    fn directory_store_reads_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("D1Q1.json"), r#"{"question_id": "D1Q1"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = DirectoryContractStore::new(dir.path());
        assert_eq!(store.load("D1Q1").unwrap().unwrap()["question_id"], "D1Q1");
        assert!(store.load("D2Q1").unwrap().is_none());
        assert_eq!(store.question_ids().unwrap(), ["D1Q1"]);
    }

    #[test]
    fn directory_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryContractStore::new(dir.path());
        assert!(store.load("../secret").unwrap().is_none());
        assert!(store.load("").unwrap().is_none());
    }

    #[test]
    fn directory_store_reports_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("D1Q1.json"), "{oops").unwrap();
        let store = DirectoryContractStore::new(dir.path());
        assert!(matches!(
            store.load("D1Q1"),
            Err(ContractError::Parse { .. })
        ));
    }
}
