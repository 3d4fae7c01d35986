//! Calibration resolution: base lookup plus contextual modifiers.

use crate::context::{infer_context, CalibrationContext};
use crate::modifier::CalibrationModifier;
use crate::registry::{CalibrationRegistry, MethodCalibration};
use qce_types::{CalibrationParameters, MethodKey};

/// Resolves effective calibration parameters for method invocations.
///
/// Resolution is a pure function of `(registry, base, context)`, so the
/// resolver can be shared freely across worker threads.
#[derive(Debug, Clone, Default)]
pub struct CalibrationResolver {
    registry: CalibrationRegistry,
}

impl CalibrationResolver {
    pub fn new(registry: CalibrationRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CalibrationRegistry {
        &self.registry
    }

    /// How the method's calibration is known, including "not at all".
    pub fn lookup(&self, class_name: &str, method_name: &str) -> MethodCalibration {
        self.registry.lookup(&MethodKey::new(class_name, method_name))
    }

    /// Registered base calibration, or the documented defaults when the
    /// method has none. Absence is not an error.
    pub fn resolve_base(&self, class_name: &str, method_name: &str) -> CalibrationParameters {
        match self.lookup(class_name, method_name) {
            MethodCalibration::NoCalibration => {
                tracing::debug!(class_name, method_name, "No calibration registered, using defaults");
                CalibrationParameters::default()
            }
            MethodCalibration::Centralized { params } => params,
            MethodCalibration::Embedded {
                params,
                migration_note,
            } => {
                tracing::debug!(
                    class_name,
                    method_name,
                    migration_note = %migration_note,
                    "Using embedded calibration"
                );
                params
            }
        }
    }

    /// Apply context modifiers in fixed order: dimension, policy area,
    /// unit of analysis, method position. Every step clamps its output,
    /// so compounding multipliers never leave the valid range.
    pub fn resolve_contextual(
        &self,
        base: &CalibrationParameters,
        context: &CalibrationContext,
    ) -> CalibrationParameters {
        let steps = [
            ("dimension", CalibrationModifier::for_dimension(context.dimension)),
            (
                "policy_area",
                context.policy_area.and_then(CalibrationModifier::for_policy_area),
            ),
            (
                "unit_of_analysis",
                context
                    .unit_of_analysis
                    .and_then(CalibrationModifier::for_unit_of_analysis),
            ),
            (
                "method_position",
                context.method_position.and_then(|position| {
                    CalibrationModifier::for_method_position(position, context.total_methods)
                }),
            ),
        ];

        steps
            .into_iter()
            .fold(*base, |current, (step, modifier)| match modifier {
                Some(modifier) => {
                    tracing::debug!(question_id = %context.question_id, step, "Applied calibration modifier");
                    modifier.apply(&current)
                }
                None => current,
            })
    }

    /// Infer a context from a question id (degrades to `(0, 0)`).
    pub fn infer_context(&self, question_id: &str) -> CalibrationContext {
        infer_context(question_id)
    }

    /// Convenience: base lookup followed by contextual resolution.
    pub fn resolve(
        &self,
        class_name: &str,
        method_name: &str,
        context: &CalibrationContext,
    ) -> CalibrationParameters {
        let base = self.resolve_base(class_name, method_name);
        self.resolve_contextual(&base, context)
    }
}
