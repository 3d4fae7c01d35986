//! Evidence validation.

use crate::bundle::EvidenceBundle;
use crate::error::ValidationError;
use qce_contracts::{Contract, ExpectedEvidence, NaPolicy, ValidationRule};
use qce_types::CalibrationParameters;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `missing_optional_field`.
    pub code: String,
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(code: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            path: path.to_string(),
            message: message.into(),
        }
    }

    fn warning(code: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, path, message)
        }
    }
}

/// Structured pass/fail outcome of validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    /// Errors were downgraded to warnings under [`NaPolicy::Degrade`].
    pub degraded: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}

/// Validate with the rules and policy carried by `contract`.
pub fn validate_contract(
    bundle: &EvidenceBundle,
    contract: &Contract,
    calibration: &CalibrationParameters,
) -> Result<ValidationResult, ValidationError> {
    validate(
        bundle,
        &contract.expected_evidence,
        &contract.validation_rules,
        calibration,
        contract.failure_policy.na_policy,
    )
}

/// Validate a bundle.
///
/// Produces one diagnostic per violated rule. Fails only when a rule
/// references a path the contract never declares, or a rule cannot be
/// evaluated at all (an invalid pattern).
pub fn validate(
    bundle: &EvidenceBundle,
    expected: &ExpectedEvidence,
    rules: &[ValidationRule],
    calibration: &CalibrationParameters,
    na_policy: NaPolicy,
) -> Result<ValidationResult, ValidationError> {
    let declared: BTreeSet<&str> = expected.declared_paths().collect();
    for path in rules.iter().map(|r| r.field.as_str()).chain(declared.iter().copied()) {
        if !bundle.is_declared(path) {
            return Err(ValidationError::Malformed {
                path: path.to_string(),
                reason: "path is not declared by the contract".into(),
            });
        }
    }

    let mut diagnostics = Vec::new();
    check_presence(bundle, expected, &mut diagnostics);
    check_snippets(bundle, expected, calibration, &mut diagnostics);
    check_support(bundle, expected, calibration, &mut diagnostics);
    for rule in rules {
        check_rule(bundle, rule, &mut diagnostics)?;
    }

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let degraded = has_errors && na_policy == NaPolicy::Degrade;
    if degraded {
        for diagnostic in &mut diagnostics {
            diagnostic.severity = Severity::Warning;
        }
    }

    let result = ValidationResult {
        passed: !has_errors || degraded,
        degraded,
        diagnostics,
    };
    tracing::debug!(
        question_id = bundle.question_id(),
        passed = result.passed,
        degraded,
        diagnostics = result.diagnostics.len(),
        "Evidence validated"
    );
    Ok(result)
}

fn check_presence(bundle: &EvidenceBundle, expected: &ExpectedEvidence, out: &mut Vec<Diagnostic>) {
    for path in &expected.required {
        if !bundle.contains(path) {
            out.push(Diagnostic::error(
                "missing_required_field",
                path,
                format!("required evidence {path} is missing"),
            ));
        }
    }
    for path in &expected.optional {
        if !bundle.contains(path) {
            out.push(Diagnostic::warning(
                "missing_optional_field",
                path,
                format!("optional evidence {path} is missing"),
            ));
        }
    }
}

fn snippet_count(bundle: &EvidenceBundle, path: &str) -> usize {
    count_of(bundle.get(path))
}

/// Arrays count their items, numbers count as themselves, anything else is
/// zero.
fn count_of(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Number(n)) => n.as_f64().map_or(0, |x| x.max(0.0) as usize),
        _ => 0,
    }
}

fn check_snippets(
    bundle: &EvidenceBundle,
    expected: &ExpectedEvidence,
    calibration: &CalibrationParameters,
    out: &mut Vec<Diagnostic>,
) {
    let Some(path) = expected.snippets_path.as_deref() else {
        return;
    };
    let count = snippet_count(bundle, path);
    let (min, max) = (
        calibration.min_evidence_snippets() as usize,
        calibration.max_evidence_snippets() as usize,
    );
    if count < min {
        out.push(Diagnostic::error(
            "insufficient_evidence",
            path,
            format!("{count} evidence snippets, at least {min} required"),
        ));
    } else if count > max {
        out.push(Diagnostic::warning(
            "excess_evidence",
            path,
            format!("{count} evidence snippets, at most {max} expected"),
        ));
    }

    if let Some(contradictions_path) = expected.contradictions_path.as_deref() {
        let contradictions = count_of(bundle.get(contradictions_path));
        let ratio = contradictions as f64 / count.max(1) as f64;
        if ratio > calibration.contradiction_tolerance() {
            out.push(Diagnostic::error(
                "contradiction_tolerance_exceeded",
                contradictions_path,
                format!(
                    "contradiction ratio {ratio:.3} exceeds tolerance {:.3}",
                    calibration.contradiction_tolerance()
                ),
            ));
        }
    }
}

fn is_substantive(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn check_support(
    bundle: &EvidenceBundle,
    expected: &ExpectedEvidence,
    calibration: &CalibrationParameters,
    out: &mut Vec<Diagnostic>,
) {
    let requirements = [
        (
            calibration.requires_numeric_support(),
            expected.numeric_path.as_deref(),
            "numeric",
            "missing_numeric_support",
        ),
        (
            calibration.requires_temporal_support(),
            expected.temporal_path.as_deref(),
            "temporal",
            "missing_temporal_support",
        ),
        (
            calibration.requires_source_provenance(),
            expected.provenance_path.as_deref(),
            "provenance",
            "missing_source_provenance",
        ),
    ];

    for (required, path, kind, code) in requirements {
        if !required {
            continue;
        }
        match path {
            Some(path) if !is_substantive(bundle.get(path)) => out.push(Diagnostic::error(
                code,
                path,
                format!("{kind} support required but {path} is empty"),
            )),
            Some(_) => {}
            None => out.push(Diagnostic::warning(
                "unchecked_support_requirement",
                kind,
                format!("{kind} support required but the contract declares no {kind} path"),
            )),
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(items.len()),
        Value::String(s) => Some(s.chars().count()),
        Value::Object(fields) => Some(fields.len()),
        _ => None,
    }
}

fn check_rule(
    bundle: &EvidenceBundle,
    rule: &ValidationRule,
    out: &mut Vec<Diagnostic>,
) -> Result<(), ValidationError> {
    let path = rule.field.as_str();
    let value = match bundle.get(path) {
        Some(value) if !value.is_null() => value,
        _ => {
            if rule.required {
                out.push(Diagnostic::error(
                    "missing_required_field",
                    path,
                    format!("required field {path} is missing"),
                ));
            }
            return Ok(());
        }
    };

    if !rule.field_type.matches(value) {
        out.push(Diagnostic::error(
            "type_mismatch",
            path,
            format!(
                "{path} is not of type {}",
                format!("{:?}", rule.field_type).to_lowercase()
            ),
        ));
        return Ok(());
    }

    if let (Some(min), Some(len)) = (rule.min_length, length_of(value)) {
        if len < min {
            out.push(Diagnostic::error(
                "min_length",
                path,
                format!("{path} has length {len}, below {min}"),
            ));
        }
    }
    if let (Some(max), Some(len)) = (rule.max_length, length_of(value)) {
        if len > max {
            out.push(Diagnostic::error(
                "max_length",
                path,
                format!("{path} has length {len}, above {max}"),
            ));
        }
    }

    if let Some(range) = &rule.range {
        match value.as_f64() {
            Some(x) if !range.contains(x) => out.push(Diagnostic::error(
                "out_of_range",
                path,
                format!("{path} = {x} is outside [{:?}, {:?}]", range.min, range.max),
            )),
            Some(_) => {}
            None => out.push(Diagnostic::error(
                "type_mismatch",
                path,
                format!("{path} must be numeric for a range check"),
            )),
        }
    }

    if let Some(allowed) = &rule.allowed_values {
        if !allowed.contains(value) {
            out.push(Diagnostic::error(
                "value_not_allowed",
                path,
                format!("{path} = {value} is not an allowed value"),
            ));
        }
    }

    if let Some(pattern) = &rule.pattern {
        let regex = Regex::new(pattern).map_err(|e| ValidationError::Malformed {
            path: path.to_string(),
            reason: format!("invalid pattern: {e}"),
        })?;
        if let Some(text) = value.as_str() {
            if !regex.is_match(text) {
                out.push(Diagnostic::error(
                    "pattern_mismatch",
                    path,
                    format!("{path} does not match {pattern}"),
                ));
            }
        }
    }

    let present: BTreeSet<&str> = value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if let Some(must) = &rule.must_contain {
        let missing: Vec<&str> = must
            .elements
            .iter()
            .map(String::as_str)
            .filter(|e| !present.contains(e))
            .collect();
        let found = must.elements.len() - missing.len();
        let needed = must.count.unwrap_or(must.elements.len());
        if found < needed {
            out.push(Diagnostic::error(
                "missing_elements",
                path,
                format!("{path} is missing required elements: {}", missing.join(", ")),
            ));
        }
    }

    for should in &rule.should_contain {
        let found = should
            .elements
            .iter()
            .filter(|e| present.contains(e.as_str()))
            .count();
        if found < should.minimum {
            out.push(Diagnostic::warning(
                "recommended_elements",
                path,
                format!(
                    "{path} has {found}/{} of recommended elements: {}",
                    should.minimum,
                    should.elements.join(", ")
                ),
            ));
        }
    }

    Ok(())
}
