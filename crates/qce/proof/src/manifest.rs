//! Artifact manifests and proof verification.

use crate::canonical::hash_file;
use crate::error::{ProofError, ProofResult};
use crate::generator::{PROOF_HASH_FILE, PROOF_JSON_FILE};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

const ARTIFACT_EXTENSIONS: [&str; 4] = ["json", "md", "log", "txt"];

/// Outcome of checking `proof.json` bytes against a recorded hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofVerification {
    pub valid: bool,
    pub expected: String,
    pub computed: String,
}

/// Recompute the SHA-256 of `proof_json` and compare it with `expected_hash`.
///
/// Surrounding whitespace in the hash file is ignored; comparison is
/// case-insensitive hex.
pub fn verify_proof(proof_json: &[u8], expected_hash: &str) -> ProofVerification {
    let computed = hex::encode(Sha256::digest(proof_json));
    let expected = expected_hash.trim().to_ascii_lowercase();
    ProofVerification {
        valid: computed == expected,
        expected,
        computed,
    }
}

/// Verify the proof files stored in a run directory.
pub fn verify_run_dir(run_dir: &Path) -> ProofResult<ProofVerification> {
    let json_path = run_dir.join(PROOF_JSON_FILE);
    let hash_path = run_dir.join(PROOF_HASH_FILE);
    let json = std::fs::read(&json_path).map_err(|e| ProofError::io(&json_path, e))?;
    let hash = std::fs::read_to_string(&hash_path).map_err(|e| ProofError::io(&hash_path, e))?;
    Ok(verify_proof(&json, &hash))
}

/// Hash every artifact file under `dir`, recursively.
///
/// Keys are paths relative to `dir` with `/` separators. The proof files
/// themselves are excluded so a sealed directory can be re-collected.
pub fn collect_artifacts_manifest(dir: &Path) -> ProofResult<BTreeMap<String, String>> {
    let mut manifest = BTreeMap::new();
    if dir.is_dir() {
        collect_into(dir, dir, &mut manifest)?;
    }
    Ok(manifest)
}

fn collect_into(root: &Path, dir: &Path, manifest: &mut BTreeMap<String, String>) -> ProofResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| ProofError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ProofError::io(dir, e))?.path();
        if path.is_dir() {
            collect_into(root, &path, manifest)?;
            continue;
        }
        if !is_artifact(&path) {
            continue;
        }
        manifest.insert(relative_key(root, &path), hash_file(&path)?);
    }
    Ok(())
}

fn is_artifact(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name == PROOF_JSON_FILE || name == PROOF_HASH_FILE {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARTIFACT_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Manifest key for `path`: relative to `root` when it lives inside it,
/// otherwise the path as given, with `/` separators either way.
pub(crate) fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
