use thiserror::Error;

/// Malformed configuration: contracts, calibration, registries.
///
/// Raised at load time and fatal for startup; never produced while a
/// question is executing.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("invalid calibration entry '{key}': {reason}")]
    InvalidCalibrationEntry { key: String, reason: String },

    #[error("unknown methods referenced by contracts: {}", .0.join(", "))]
    UnknownMethods(Vec<String>),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
