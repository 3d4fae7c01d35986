//! Multiplicative calibration modifiers and the built-in modifier tables.

use qce_types::{CalibrationParameters, CalibrationParts, PolicyArea, UnitOfAnalysis};
use serde::{Deserialize, Serialize};

/// A set of multipliers applied to a calibration. `1.0` means no change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationModifier {
    pub min_evidence_multiplier: f64,
    pub max_evidence_multiplier: f64,
    pub contradiction_tolerance_multiplier: f64,
    pub uncertainty_penalty_multiplier: f64,
    pub aggregation_weight_multiplier: f64,
    pub sensitivity_multiplier: f64,
}

impl Default for CalibrationModifier {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl CalibrationModifier {
    pub const IDENTITY: Self = Self {
        min_evidence_multiplier: 1.0,
        max_evidence_multiplier: 1.0,
        contradiction_tolerance_multiplier: 1.0,
        uncertainty_penalty_multiplier: 1.0,
        aggregation_weight_multiplier: 1.0,
        sensitivity_multiplier: 1.0,
    };

    /// Apply the multipliers and clamp the result back into range.
    ///
    /// Evidence counts are truncated toward zero before clamping. Score
    /// bounds and support flags pass through unchanged.
    pub fn apply(&self, calibration: &CalibrationParameters) -> CalibrationParameters {
        let p = calibration.parts();
        CalibrationParameters::clamped(CalibrationParts {
            min_evidence_snippets: scale_count(p.min_evidence_snippets, self.min_evidence_multiplier),
            max_evidence_snippets: scale_count(p.max_evidence_snippets, self.max_evidence_multiplier),
            contradiction_tolerance: p.contradiction_tolerance
                * self.contradiction_tolerance_multiplier,
            uncertainty_penalty: p.uncertainty_penalty * self.uncertainty_penalty_multiplier,
            aggregation_weight: p.aggregation_weight * self.aggregation_weight_multiplier,
            sensitivity: p.sensitivity * self.sensitivity_multiplier,
            ..p
        })
    }

    /// Modifier for a question dimension (1-10).
    pub fn for_dimension(dimension: u32) -> Option<Self> {
        let m = Self::IDENTITY;
        let modifier = match dimension {
            1 => Self { min_evidence_multiplier: 1.3, sensitivity_multiplier: 1.1, ..m },
            2 => Self { max_evidence_multiplier: 1.2, contradiction_tolerance_multiplier: 0.8, ..m },
            3 => Self { min_evidence_multiplier: 1.2, uncertainty_penalty_multiplier: 0.9, ..m },
            4 => Self { sensitivity_multiplier: 1.2, ..m },
            5 => Self { min_evidence_multiplier: 1.1, max_evidence_multiplier: 1.1, ..m },
            6 => Self { contradiction_tolerance_multiplier: 0.9, ..m },
            7 => Self { uncertainty_penalty_multiplier: 0.85, ..m },
            8 => Self { aggregation_weight_multiplier: 1.15, ..m },
            9 => Self { sensitivity_multiplier: 1.15, ..m },
            10 => Self { min_evidence_multiplier: 1.4, sensitivity_multiplier: 1.2, ..m },
            _ => return None,
        };
        Some(modifier)
    }

    /// Modifier for a policy area; areas without a tuned profile get none.
    pub fn for_policy_area(area: PolicyArea) -> Option<Self> {
        let m = Self::IDENTITY;
        match area {
            PolicyArea::Fiscal => Some(Self { min_evidence_multiplier: 1.3, sensitivity_multiplier: 1.1, ..m }),
            PolicyArea::Social => Some(Self { max_evidence_multiplier: 1.2, uncertainty_penalty_multiplier: 0.9, ..m }),
            PolicyArea::Infrastructure => Some(Self { contradiction_tolerance_multiplier: 0.8, sensitivity_multiplier: 1.1, ..m }),
            PolicyArea::Environmental => Some(Self { min_evidence_multiplier: 1.2, uncertainty_penalty_multiplier: 0.85, ..m }),
            _ => None,
        }
    }

    /// Modifier for a unit of analysis; units without a tuned profile get none.
    pub fn for_unit_of_analysis(unit: UnitOfAnalysis) -> Option<Self> {
        let m = Self::IDENTITY;
        match unit {
            UnitOfAnalysis::BaselineGap => Some(Self { min_evidence_multiplier: 1.4, sensitivity_multiplier: 1.2, ..m }),
            UnitOfAnalysis::Intervention => Some(Self { contradiction_tolerance_multiplier: 0.9, sensitivity_multiplier: 1.1, ..m }),
            UnitOfAnalysis::Outcome => Some(Self { min_evidence_multiplier: 1.3, uncertainty_penalty_multiplier: 0.8, ..m }),
            UnitOfAnalysis::Mechanism => Some(Self { max_evidence_multiplier: 1.2, sensitivity_multiplier: 1.15, ..m }),
            _ => None,
        }
    }

    /// Modifier for a method's position in a multi-method sequence.
    ///
    /// Later methods weigh less in aggregation and react more strongly,
    /// since they refine evidence earlier methods already gathered. Single
    /// method sequences get no modifier.
    pub fn for_method_position(position: usize, total: usize) -> Option<Self> {
        if total < 2 {
            return None;
        }
        let relative = position.min(total - 1) as f64 / (total - 1) as f64;
        Some(Self {
            aggregation_weight_multiplier: 1.0 - 0.2 * relative,
            sensitivity_multiplier: 1.0 + 0.1 * relative,
            ..Self::IDENTITY
        })
    }
}

fn scale_count(count: u32, multiplier: f64) -> u32 {
    // `as` saturates: negatives and NaN become 0, overflow becomes u32::MAX.
    (count as f64 * multiplier) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use qce_types::MAX_EVIDENCE_CEILING;

    #[test]
    fn identity_is_a_no_op() {
        let base = CalibrationParameters::default();
        assert_eq!(CalibrationModifier::IDENTITY.apply(&base), base);
    }

    #[test]
    fn dimension_one_raises_min_evidence_and_sensitivity() {
        let base = CalibrationParameters::clamped(CalibrationParts {
            min_evidence_snippets: 10,
            max_evidence_snippets: 20,
            ..CalibrationParts::default()
        });
        let adjusted = CalibrationModifier::for_dimension(1).unwrap().apply(&base);
        assert_eq!(adjusted.min_evidence_snippets(), 13);
        assert!((adjusted.sensitivity() - 0.825).abs() < 1e-9);
    }

    #[test]
    fn unknown_dimension_has_no_modifier() {
        assert!(CalibrationModifier::for_dimension(0).is_none());
        assert!(CalibrationModifier::for_dimension(11).is_none());
    }

    #[test]
    fn untuned_policy_area_and_unit_have_no_modifier() {
        assert!(CalibrationModifier::for_policy_area(PolicyArea::Culture).is_none());
        assert!(CalibrationModifier::for_unit_of_analysis(UnitOfAnalysis::Risk).is_none());
    }

    #[test]
    fn extreme_multipliers_are_clamped() {
        let wild = CalibrationModifier {
            min_evidence_multiplier: 1000.0,
            max_evidence_multiplier: 1000.0,
            contradiction_tolerance_multiplier: 50.0,
            uncertainty_penalty_multiplier: -3.0,
            aggregation_weight_multiplier: 1e9,
            sensitivity_multiplier: f64::NAN,
        };
        let out = wild.apply(&CalibrationParameters::default());
        assert!(out.is_within_bounds());
        assert_eq!(out.max_evidence_snippets(), MAX_EVIDENCE_CEILING);
        assert_eq!(out.contradiction_tolerance(), 1.0);
        assert_eq!(out.uncertainty_penalty(), 0.0);
        assert_eq!(out.sensitivity(), 0.0);
    }

    #[test]
    fn position_modifier_scales_with_relative_position() {
        assert!(CalibrationModifier::for_method_position(0, 1).is_none());
        let first = CalibrationModifier::for_method_position(0, 3).unwrap();
        let last = CalibrationModifier::for_method_position(2, 3).unwrap();
        assert_eq!(first, CalibrationModifier::IDENTITY);
        assert!((last.aggregation_weight_multiplier - 0.8).abs() < 1e-9);
        assert!((last.sensitivity_multiplier - 1.1).abs() < 1e-9);
    }
}
