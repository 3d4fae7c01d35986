//! Calibration context: where in the questionnaire a method is running.

use qce_types::{PolicyArea, UnitOfAnalysis};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Immutable context of one method invocation.
///
/// `with_*` builders return a new value, so a cached base context can be
/// shared between concurrent resolutions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalibrationContext {
    pub question_id: String,
    /// Dimension number parsed from the question id; 0 when unknown.
    pub dimension: u32,
    /// Question number within the dimension; 0 when unknown.
    pub question: u32,
    pub policy_area: Option<PolicyArea>,
    pub unit_of_analysis: Option<UnitOfAnalysis>,
    /// Zero-based position in the method sequence.
    pub method_position: Option<usize>,
    pub total_methods: usize,
}

impl CalibrationContext {
    /// A context that matches no modifier at all.
    pub fn unknown(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            dimension: 0,
            question: 0,
            policy_area: None,
            unit_of_analysis: None,
            method_position: None,
            total_methods: 0,
        }
    }

    pub fn with_policy_area(&self, policy_area: PolicyArea) -> Self {
        Self {
            policy_area: Some(policy_area),
            ..self.clone()
        }
    }

    pub fn with_unit_of_analysis(&self, unit: UnitOfAnalysis) -> Self {
        Self {
            unit_of_analysis: Some(unit),
            ..self.clone()
        }
    }

    pub fn with_method_position(&self, position: usize, total: usize) -> Self {
        Self {
            method_position: Some(position),
            total_methods: total,
            ..self.clone()
        }
    }

    /// Whether [`infer_context`] recognised the question id.
    pub fn is_recognised(&self) -> bool {
        self.dimension > 0
    }

    /// SHA-256 over the fields that affect calibration semantics.
    ///
    /// Method position is execution metadata and is excluded, so every
    /// method of a question shares one cache key.
    pub fn stable_hash(&self) -> String {
        let material = format!(
            "qid={}|dim={}|q={}|policy={}|unit={}",
            self.question_id,
            self.dimension,
            self.question,
            self.policy_area.map(|p| p.as_str()).unwrap_or("none"),
            self.unit_of_analysis.map(|u| u.as_str()).unwrap_or("none"),
        );
        hex::encode(Sha256::digest(material.as_bytes()))
    }
}

fn question_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^D(\d+)Q(\d+)").expect("static pattern is valid"))
}

/// Parse a `D{dimension}Q{question}` identifier (case-insensitive).
///
/// Malformed identifiers degrade to dimension 0 / question 0 instead of
/// failing, so calibration always yields a usable (unmodified) result.
/// The degrade path is logged so upstream data-quality issues stay visible.
pub fn infer_context(question_id: &str) -> CalibrationContext {
    let parsed = question_id_pattern().captures(question_id).and_then(|caps| {
        let dimension = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let question = caps.get(2)?.as_str().parse::<u32>().ok()?;
        Some((dimension, question))
    });

    match parsed {
        Some((dimension, question)) => CalibrationContext {
            dimension,
            question,
            ..CalibrationContext::unknown(question_id)
        },
        None => {
            tracing::warn!(question_id, "Malformed question id, calibration context degraded");
            CalibrationContext::unknown(question_id)
        }
    }
}
