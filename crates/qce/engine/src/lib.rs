//! QCE Engine
//!
//! Ties the components together. Per question:
//!
//! ```text
//! ContractResolver ─┬─> CalibrationResolver (per method)
//!                   └─> DeterminismScope (per question)
//!                          │
//!                          v
//!                   ExecutorAdapter (N invocations, priority order)
//!                          │
//!                          v
//!                   assemble ─> validate ─> ExecutionRecord ─> RunLedger
//! ```
//!
//! After the run, [`Engine::seal_run`] hands the records to the proof
//! generator, which seals only a complete, unaborted run with artifacts on
//! disk.
//!
//! Failure handling follows the contract's failure policy: a non-essential
//! method that fails is skipped and recorded, an essential one fails the
//! question, and an environment-fatal condition aborts the whole run.

#![deny(unsafe_code)]

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod metrics;

pub use config::{
    CalibrationConfig, ContractsConfig, EngineConfig, ExecutorConfig, ProofConfig, RuntimeConfig,
};
pub use document::DocumentContext;
pub use engine::{Engine, QuestionOutcome, QuestionRequest};
pub use error::{ConfigError, EngineError, EngineResult};
pub use ledger::RunLedger;
pub use metrics::{ExecutionMetrics, MetricsSnapshot};
