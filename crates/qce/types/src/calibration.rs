//! Calibration parameters and their value-range invariants.
//!
//! [`CalibrationParameters`] can only be obtained through
//! [`CalibrationParameters::try_new`] (rejects out-of-range values, used when
//! loading configuration) or [`CalibrationParameters::clamped`] (forces values
//! into range, used between modifier applications).

use crate::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Lowest allowed evidence-snippet bound.
pub const MIN_EVIDENCE_FLOOR: u32 = 1;
/// Highest allowed evidence-snippet bound.
pub const MAX_EVIDENCE_CEILING: u32 = 100;
/// Highest allowed aggregation weight.
pub const MAX_AGGREGATION_WEIGHT: f64 = 10.0;

/// Unvalidated calibration values, as they appear in files and modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParts {
    pub score_min: f64,
    pub score_max: f64,
    pub min_evidence_snippets: u32,
    pub max_evidence_snippets: u32,
    pub contradiction_tolerance: f64,
    pub uncertainty_penalty: f64,
    pub aggregation_weight: f64,
    pub sensitivity: f64,
    pub requires_numeric_support: bool,
    pub requires_temporal_support: bool,
    pub requires_source_provenance: bool,
}

impl Default for CalibrationParts {
    /// Conservative defaults applied to uncalibrated methods.
    fn default() -> Self {
        Self {
            score_min: 0.0,
            score_max: 1.0,
            min_evidence_snippets: 3,
            max_evidence_snippets: 15,
            contradiction_tolerance: 0.1,
            uncertainty_penalty: 0.3,
            aggregation_weight: 1.0,
            sensitivity: 0.75,
            requires_numeric_support: false,
            requires_temporal_support: false,
            requires_source_provenance: true,
        }
    }
}

/// Validated operating parameters for one method invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CalibrationParts", into = "CalibrationParts")]
pub struct CalibrationParameters {
    parts: CalibrationParts,
}

impl CalibrationParameters {
    /// Validate raw values. Any range violation is a configuration error.
    pub fn try_new(parts: CalibrationParts) -> Result<Self, ConfigurationError> {
        let mut violations = Vec::new();

        for (name, value) in [
            ("score_min", parts.score_min),
            ("score_max", parts.score_max),
            ("contradiction_tolerance", parts.contradiction_tolerance),
            ("uncertainty_penalty", parts.uncertainty_penalty),
            ("sensitivity", parts.sensitivity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                violations.push(format!("{name}={value} outside [0, 1]"));
            }
        }
        if parts.score_min > parts.score_max {
            violations.push(format!(
                "score_min={} exceeds score_max={}",
                parts.score_min, parts.score_max
            ));
        }
        if !(0.0..=MAX_AGGREGATION_WEIGHT).contains(&parts.aggregation_weight) {
            violations.push(format!(
                "aggregation_weight={} outside [0, {MAX_AGGREGATION_WEIGHT}]",
                parts.aggregation_weight
            ));
        }
        if parts.min_evidence_snippets < MIN_EVIDENCE_FLOOR {
            violations.push(format!(
                "min_evidence_snippets={} below {MIN_EVIDENCE_FLOOR}",
                parts.min_evidence_snippets
            ));
        }
        if parts.max_evidence_snippets > MAX_EVIDENCE_CEILING {
            violations.push(format!(
                "max_evidence_snippets={} above {MAX_EVIDENCE_CEILING}",
                parts.max_evidence_snippets
            ));
        }
        if parts.min_evidence_snippets > parts.max_evidence_snippets {
            violations.push(format!(
                "min_evidence_snippets={} exceeds max_evidence_snippets={}",
                parts.min_evidence_snippets, parts.max_evidence_snippets
            ));
        }

        if violations.is_empty() {
            Ok(Self { parts })
        } else {
            Err(ConfigurationError::InvalidCalibration(violations.join("; ")))
        }
    }

    /// Force raw values into their valid ranges.
    ///
    /// Evidence bounds are swapped when inverted, then `min` is raised to the
    /// floor and `max` is kept within `[min, ceiling]`. Score bounds are not
    /// touched by modifiers, but are clamped here as well so the result is
    /// always valid. NaN collapses to the lower bound.
    pub fn clamped(parts: CalibrationParts) -> Self {
        let mut min_evidence = parts.min_evidence_snippets;
        let mut max_evidence = parts.max_evidence_snippets;
        if min_evidence > max_evidence {
            std::mem::swap(&mut min_evidence, &mut max_evidence);
        }
        let min_evidence = min_evidence.clamp(MIN_EVIDENCE_FLOOR, MAX_EVIDENCE_CEILING);
        let max_evidence = max_evidence.clamp(min_evidence, MAX_EVIDENCE_CEILING);

        let score_min = unit(parts.score_min);
        let score_max = unit(parts.score_max).max(score_min);

        Self {
            parts: CalibrationParts {
                score_min,
                score_max,
                min_evidence_snippets: min_evidence,
                max_evidence_snippets: max_evidence,
                contradiction_tolerance: unit(parts.contradiction_tolerance),
                uncertainty_penalty: unit(parts.uncertainty_penalty),
                aggregation_weight: bounded(parts.aggregation_weight, MAX_AGGREGATION_WEIGHT),
                sensitivity: unit(parts.sensitivity),
                ..parts
            },
        }
    }

    /// Raw values, e.g. as the starting point for a modifier.
    pub fn parts(&self) -> CalibrationParts {
        self.parts
    }

    pub fn score_min(&self) -> f64 {
        self.parts.score_min
    }

    pub fn score_max(&self) -> f64 {
        self.parts.score_max
    }

    pub fn min_evidence_snippets(&self) -> u32 {
        self.parts.min_evidence_snippets
    }

    pub fn max_evidence_snippets(&self) -> u32 {
        self.parts.max_evidence_snippets
    }

    pub fn contradiction_tolerance(&self) -> f64 {
        self.parts.contradiction_tolerance
    }

    pub fn uncertainty_penalty(&self) -> f64 {
        self.parts.uncertainty_penalty
    }

    pub fn aggregation_weight(&self) -> f64 {
        self.parts.aggregation_weight
    }

    pub fn sensitivity(&self) -> f64 {
        self.parts.sensitivity
    }

    pub fn requires_numeric_support(&self) -> bool {
        self.parts.requires_numeric_support
    }

    pub fn requires_temporal_support(&self) -> bool {
        self.parts.requires_temporal_support
    }

    pub fn requires_source_provenance(&self) -> bool {
        self.parts.requires_source_provenance
    }

    /// True when every bounded field lies within its declared range.
    pub fn is_within_bounds(&self) -> bool {
        Self::try_new(self.parts).is_ok()
    }
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self {
            parts: CalibrationParts::default(),
        }
    }
}

impl TryFrom<CalibrationParts> for CalibrationParameters {
    type Error = ConfigurationError;

    fn try_from(parts: CalibrationParts) -> Result<Self, Self::Error> {
        Self::try_new(parts)
    }
}

impl From<CalibrationParameters> for CalibrationParts {
    fn from(params: CalibrationParameters) -> Self {
        params.parts
    }
}

fn unit(value: f64) -> f64 {
    bounded(value, 1.0)
}

fn bounded(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}
