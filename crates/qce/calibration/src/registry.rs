//! Registry of per-method base calibrations.

use qce_types::{CalibrationParameters, CalibrationParts, ConfigurationError, MethodKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// How a method's base calibration is known.
///
/// Keeping "no calibration" as its own variant lets tooling list methods
/// that silently run on defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MethodCalibration {
    NoCalibration,
    /// Registered in the central calibration registry.
    Centralized { params: CalibrationParameters },
    /// Carried alongside the method itself, pending migration to the registry.
    Embedded {
        params: CalibrationParameters,
        migration_note: String,
    },
}

impl MethodCalibration {
    /// Registered parameters, if any.
    pub fn params(&self) -> Option<&CalibrationParameters> {
        match self {
            Self::NoCalibration => None,
            Self::Centralized { params } | Self::Embedded { params, .. } => Some(params),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        !matches!(self, Self::NoCalibration)
    }
}

/// Central calibration registry keyed by `Class.method`.
#[derive(Debug, Clone, Default)]
pub struct CalibrationRegistry {
    entries: BTreeMap<MethodKey, MethodCalibration>,
}

impl CalibrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_centralized(&mut self, key: MethodKey, params: CalibrationParameters) {
        self.entries
            .insert(key, MethodCalibration::Centralized { params });
    }

    pub fn register_embedded(
        &mut self,
        key: MethodKey,
        params: CalibrationParameters,
        migration_note: impl Into<String>,
    ) {
        self.entries.insert(
            key,
            MethodCalibration::Embedded {
                params,
                migration_note: migration_note.into(),
            },
        );
    }

    pub fn lookup(&self, key: &MethodKey) -> MethodCalibration {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or(MethodCalibration::NoCalibration)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys from `keys` that have no registered calibration.
    pub fn uncalibrated<'a>(&self, keys: impl IntoIterator<Item = &'a MethodKey>) -> Vec<MethodKey> {
        let mut missing: Vec<MethodKey> = keys
            .into_iter()
            .filter(|k| !self.entries.contains_key(k))
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Parse a calibration file.
    ///
    /// The file is a JSON object keyed by `Class.method`. Keys starting with
    /// `_` are metadata and skipped. An entry with `"source": "embedded"`
    /// is registered as embedded with its `migration_note`. Any malformed
    /// key or out-of-range value is a configuration error.
    pub fn from_json_str(raw: &str, origin: &str) -> Result<Self, ConfigurationError> {
        let document: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(raw).map_err(|source| ConfigurationError::Parse {
                path: origin.to_string(),
                source,
            })?;

        let mut registry = Self::new();
        for (raw_key, entry) in document {
            if raw_key.starts_with('_') {
                continue;
            }
            let invalid = |reason: String| ConfigurationError::InvalidCalibrationEntry {
                key: raw_key.clone(),
                reason,
            };
            let key = MethodKey::parse(&raw_key)
                .ok_or_else(|| invalid("expected a Class.method key".into()))?;

            let embedded = entry.get("source").and_then(|s| s.as_str()) == Some("embedded");
            let migration_note = entry
                .get("migration_note")
                .and_then(|n| n.as_str())
                .unwrap_or_default()
                .to_string();

            let parts: CalibrationParts =
                serde_json::from_value(entry).map_err(|e| invalid(e.to_string()))?;
            let params = CalibrationParameters::try_new(parts).map_err(|e| invalid(e.to_string()))?;

            if embedded {
                registry.register_embedded(key, params, migration_note);
            } else {
                registry.register_centralized(key, params);
            }
        }

        tracing::info!(origin, entries = registry.len(), "Calibration registry loaded");
        Ok(registry)
    }

    /// Load a calibration file. A missing file yields an empty registry so
    /// every method falls back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        if !path.exists() {
            tracing::warn!(path = %origin, "Calibration file not found, using defaults");
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: origin.clone(),
            source,
        })?;
        Self::from_json_str(&raw, &origin)
    }

    /// SHA-256 over the canonical JSON of all entries, for the proof record.
    pub fn digest(&self) -> String {
        let canonical: BTreeMap<String, &MethodCalibration> = self
            .entries
            .iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}
