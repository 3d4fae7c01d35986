//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! [contracts]
//! dir = "contracts"
//!
//! [calibration]
//! registry_file = "calibration/method_parameters.json"
//!
//! [executor]
//! max_input_bytes = 8388608
//!
//! [runtime]
//! max_concurrency = 4
//! expected_questions = 300
//!
//! [proof]
//! run_dir = "runs/latest"
//! input_document = "plan.pdf"
//!
//! [proof.code_artifacts]
//! engine = "bin/qce"
//! ```

use crate::error::ConfigError;
use qce_executor::DEFAULT_MAX_INPUT_BYTES;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub contracts: ContractsConfig,
    pub calibration: CalibrationConfig,
    pub executor: ExecutorConfig,
    pub runtime: RuntimeConfig,
    pub proof: ProofConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// Directory of `<question_id>.json` contracts.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// JSON registry keyed by `Class.method`. Absent means defaults only.
    pub registry_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_input_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Questions executed at once by `execute_batch`.
    pub max_concurrency: usize,
    /// Phases a run must complete before it can be sealed. When unset, the
    /// number of records handed to `seal_run` is used.
    pub expected_questions: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            expected_questions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofConfig {
    pub run_dir: PathBuf,
    /// Name to path of the code artifacts whose hashes sign the run.
    pub code_artifacts: BTreeMap<String, PathBuf>,
    pub input_document: Option<PathBuf>,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from("runs/latest"),
            code_artifacts: BTreeMap::new(),
            input_document: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `path`, or defaults when the file does not
    /// exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No engine config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), "Engine config loaded");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "runtime.max_concurrency must be at least 1".into(),
            ));
        }
        if self.executor.max_input_bytes == 0 {
            return Err(ConfigError::Invalid(
                "executor.max_input_bytes must be at least 1".into(),
            ));
        }
        if self.runtime.expected_questions == Some(0) {
            return Err(ConfigError::Invalid(
                "runtime.expected_questions must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}
