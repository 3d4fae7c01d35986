use crate::{EventId, MethodKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one method invocation within a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodStatus {
    Succeeded,
    /// Failed but the failure policy marks the method non-essential.
    SkippedNonEssential { event_id: EventId, reason: String },
    /// Failed and the question could not continue.
    Failed { event_id: EventId, reason: String },
}

impl MethodStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Ledger line for one method invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodExecution {
    pub method: MethodKey,
    pub priority: i64,
    pub provides: String,
    #[serde(flatten)]
    pub status: MethodStatus,
    pub latency_ms: u64,
    /// SHA-256 of the method's canonical JSON output, when it produced one.
    pub output_digest: Option<String>,
}

/// Per-question execution record, appended to the run ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub question_id: String,
    pub event_id: EventId,
    pub success: bool,
    pub methods: Vec<MethodExecution>,
    /// Number of evidence paths present in the assembled bundle.
    pub evidence_paths: usize,
    /// Seeds consumed by the determinism scope, by component name.
    pub seeds: BTreeMap<String, u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Start an empty record; `success` flips once the question completes.
    pub fn begin(question_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            question_id: question_id.into(),
            event_id: EventId::generate(),
            success: false,
            methods: Vec::new(),
            evidence_paths: 0,
            seeds: BTreeMap::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn push(&mut self, execution: MethodExecution) {
        self.methods.push(execution);
    }

    pub fn finish(&mut self, success: bool) {
        self.success = success;
        self.finished_at = Utc::now();
    }

    pub fn succeeded_methods(&self) -> usize {
        self.methods.iter().filter(|m| m.status.is_success()).count()
    }

    pub fn failed_methods(&self) -> usize {
        self.methods.len() - self.succeeded_methods()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
