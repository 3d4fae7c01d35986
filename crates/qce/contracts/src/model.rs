//! Contract data model and load-time validation.

use crate::error::{ContractError, ContractResult};
use qce_types::{MethodKey, PolicyArea, UnitOfAnalysis};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Fields every raw contract must carry.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "question_id",
    "dimension_id",
    "policy_area_id",
    "methods",
    "expected_evidence",
    "validation_rules",
    "failure_policy",
];

// ── Methods ────────────────────────────────────────────────────────────

/// How the methods of a contract relate to one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orchestration {
    /// Exactly one method.
    Single,
    /// Strictly ordered methods; priorities must be unique.
    #[default]
    Pipeline,
    /// Independent methods; equal priorities run in declaration order.
    Ensemble,
}

/// One analysis method invocation declared by a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub class_name: String,
    pub method_name: String,
    /// Lower runs first.
    pub priority: i64,
    /// Dot path in the evidence bundle the output is stored under.
    pub provides: String,
    /// Static keyword arguments merged into every invocation.
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl MethodSpec {
    pub fn key(&self) -> MethodKey {
        MethodKey::new(&self.class_name, &self.method_name)
    }
}

// ── Evidence & validation ──────────────────────────────────────────────

/// Shape of the evidence a contract expects its methods to produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedEvidence {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    /// Array of evidence snippets, counted against calibration bounds.
    pub snippets_path: Option<String>,
    pub numeric_path: Option<String>,
    pub temporal_path: Option<String>,
    pub provenance_path: Option<String>,
    /// Number (or array) of contradictions found among the snippets.
    pub contradictions_path: Option<String>,
}

impl ExpectedEvidence {
    /// Every path this block declares.
    pub fn declared_paths(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .map(String::as_str)
            .chain(
                [
                    &self.snippets_path,
                    &self.numeric_path,
                    &self.temporal_path,
                    &self.provenance_path,
                    &self.contradictions_path,
                ]
                .into_iter()
                .flatten()
                .map(String::as_str),
            )
    }
}

/// JSON type a validated field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Array,
    Integer,
    Float,
    String,
    Boolean,
    Object,
    #[default]
    Any,
}

impl FieldType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Array => value.is_array(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn contains(&self, x: f64) -> bool {
        self.min.map_or(true, |min| x >= min) && self.max.map_or(true, |max| x <= max)
    }
}

/// Elements an array field must contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MustContain {
    pub elements: Vec<String>,
    /// Minimum number of `elements` present; all of them when absent.
    pub count: Option<usize>,
}

/// Elements an array field should contain; shortfalls are warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShouldContain {
    pub elements: Vec<String>,
    #[serde(default = "default_minimum")]
    pub minimum: usize,
}

fn default_minimum() -> usize {
    1
}

/// A per-field validation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub field: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub range: Option<NumericRange>,
    pub allowed_values: Option<Vec<Value>>,
    pub pattern: Option<String>,
    pub must_contain: Option<MustContain>,
    #[serde(default)]
    pub should_contain: Vec<ShouldContain>,
}

impl ValidationRule {
    /// A rule that only checks presence.
    pub fn required(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            required: true,
            field_type: FieldType::Any,
            min_length: None,
            max_length: None,
            range: None,
            allowed_values: None,
            pattern: None,
            must_contain: None,
            should_contain: Vec::new(),
        }
    }
}

/// What validation errors mean for the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NaPolicy {
    /// Errors fail the question.
    #[default]
    Abort,
    /// Errors are downgraded to warnings and the question passes.
    Degrade,
}

/// Which method failures a question may survive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    /// `Class.method` keys whose failure skips rather than fails.
    pub non_essential: Vec<String>,
    pub na_policy: NaPolicy,
}

impl FailurePolicy {
    pub fn is_essential(&self, key: &MethodKey) -> bool {
        let rendered = key.to_string();
        !self.non_essential.iter().any(|k| *k == rendered)
    }
}

// ── Assembly ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Concat,
    #[default]
    First,
    Last,
    Mean,
    Max,
    Min,
    WeightedMean,
    Majority,
}

/// Derives one bundle field from several method outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyRule {
    pub target: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
    pub weights: Option<Vec<f64>>,
    pub default: Option<Value>,
}

// ── Contract ───────────────────────────────────────────────────────────

/// A validated question contract.
///
/// Every way of building one from raw input goes through
/// [`Contract::from_value`], deserialization included, so a `Contract` in
/// hand has passed every load-time check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Contract {
    pub question_id: String,
    pub dimension_id: String,
    pub policy_area_id: String,
    pub policy_area: Option<PolicyArea>,
    pub unit_of_analysis: Option<UnitOfAnalysis>,
    pub orchestration: Orchestration,
    /// In declaration order.
    pub methods: Vec<MethodSpec>,
    pub expected_evidence: ExpectedEvidence,
    pub validation_rules: Vec<ValidationRule>,
    pub failure_policy: FailurePolicy,
    pub assembly_rules: Vec<AssemblyRule>,
    pub overwritable_paths: BTreeSet<String>,
}

/// Wire shape of a contract before validation.
#[derive(Deserialize)]
struct RawContract {
    question_id: String,
    dimension_id: String,
    policy_area_id: String,
    #[serde(default)]
    policy_area: Option<PolicyArea>,
    #[serde(default)]
    unit_of_analysis: Option<UnitOfAnalysis>,
    #[serde(default)]
    orchestration: Orchestration,
    methods: Vec<MethodSpec>,
    expected_evidence: ExpectedEvidence,
    validation_rules: Vec<ValidationRule>,
    failure_policy: FailurePolicy,
    #[serde(default)]
    assembly_rules: Vec<AssemblyRule>,
    #[serde(default)]
    overwritable_paths: BTreeSet<String>,
}

impl From<RawContract> for Contract {
    fn from(raw: RawContract) -> Self {
        Self {
            question_id: raw.question_id,
            dimension_id: raw.dimension_id,
            policy_area_id: raw.policy_area_id,
            policy_area: raw.policy_area,
            unit_of_analysis: raw.unit_of_analysis,
            orchestration: raw.orchestration,
            methods: raw.methods,
            expected_evidence: raw.expected_evidence,
            validation_rules: raw.validation_rules,
            failure_policy: raw.failure_policy,
            assembly_rules: raw.assembly_rules,
            overwritable_paths: raw.overwritable_paths,
        }
    }
}

impl TryFrom<Value> for Contract {
    type Error = ContractError;

    /// Validate a contract against the `question_id` it declares.
    fn try_from(raw: Value) -> ContractResult<Self> {
        let question_id = raw
            .get("question_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self::from_value(&question_id, raw)
    }
}

impl Contract {
    /// Validate raw contract JSON loaded for `question_id`.
    pub fn from_value(question_id: &str, raw: Value) -> ContractResult<Self> {
        let schema_error = |missing: Vec<String>, violations: Vec<String>| ContractError::Schema {
            question_id: question_id.to_string(),
            missing,
            violations,
        };

        let Some(object) = raw.as_object() else {
            return Err(schema_error(
                Vec::new(),
                vec!["contract must be a JSON object".into()],
            ));
        };
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| object.get(**field).map_or(true, Value::is_null))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(schema_error(missing, Vec::new()));
        }

        let contract: Contract = serde_json::from_value::<RawContract>(raw)
            .map_err(|e| schema_error(Vec::new(), vec![e.to_string()]))?
            .into();

        let violations = contract.structural_violations(question_id);
        if !violations.is_empty() {
            return Err(schema_error(Vec::new(), violations));
        }
        contract.check_ordering()?;
        Ok(contract)
    }

    pub fn from_json_str(question_id: &str, raw: &str) -> ContractResult<Self> {
        let value = serde_json::from_str(raw).map_err(|source| ContractError::Parse {
            question_id: question_id.to_string(),
            source,
        })?;
        Self::from_value(question_id, value)
    }

    fn structural_violations(&self, requested_id: &str) -> Vec<String> {
        let mut violations = Vec::new();

        if self.question_id != requested_id {
            violations.push(format!(
                "question_id {} does not match requested {}",
                self.question_id, requested_id
            ));
        }
        if self.methods.is_empty() {
            violations.push("methods must not be empty".into());
        }
        if self.orchestration == Orchestration::Single && self.methods.len() != 1 {
            violations.push(format!(
                "orchestration single requires exactly one method, found {}",
                self.methods.len()
            ));
        }
        for method in &self.methods {
            if method.class_name.is_empty() || method.method_name.is_empty() {
                violations.push("method class_name and method_name must not be empty".into());
            }
            if method.provides.is_empty() {
                violations.push(format!("method {} has an empty provides path", method.key()));
            }
        }

        let declared: BTreeSet<String> = self.methods.iter().map(|m| m.key().to_string()).collect();
        for key in &self.failure_policy.non_essential {
            if MethodKey::parse(key).is_none() || !declared.contains(key) {
                violations.push(format!("failure policy references unknown method {key}"));
            }
        }

        for rule in &self.assembly_rules {
            if rule.target.is_empty() {
                violations.push("assembly rule target must not be empty".into());
            }
            if rule.weights.as_ref().is_some_and(|w| w.iter().any(|x| !x.is_finite() || *x < 0.0)) {
                violations.push(format!(
                    "assembly rule {} has negative or non-finite weights",
                    rule.target
                ));
            }
        }

        violations
    }

    fn check_ordering(&self) -> ContractResult<()> {
        if self.orchestration != Orchestration::Pipeline {
            return Ok(());
        }
        let mut by_priority: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for method in &self.methods {
            by_priority
                .entry(method.priority)
                .or_default()
                .push(method.key().to_string());
        }
        match by_priority.into_iter().find(|(_, methods)| methods.len() > 1) {
            Some((priority, methods)) => Err(ContractError::Ordering {
                question_id: self.question_id.clone(),
                priority,
                methods,
            }),
            None => Ok(()),
        }
    }

    /// Declaration indices in execution order: by priority, ties by
    /// declaration order.
    pub fn execution_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.methods.len()).collect();
        order.sort_by_key(|&i| (self.methods[i].priority, i));
        order
    }

    /// Methods in execution order.
    pub fn ordered_methods(&self) -> Vec<&MethodSpec> {
        self.execution_order()
            .into_iter()
            .map(|i| &self.methods[i])
            .collect()
    }

    pub fn method_keys(&self) -> BTreeSet<MethodKey> {
        self.methods.iter().map(MethodSpec::key).collect()
    }

    pub fn is_overwritable(&self, path: &str) -> bool {
        self.overwritable_paths.contains(path)
    }

    /// Every bundle path this contract declares: method outputs, assembly
    /// targets and expected evidence.
    pub fn declared_paths(&self) -> BTreeSet<String> {
        self.methods
            .iter()
            .map(|m| m.provides.clone())
            .chain(self.assembly_rules.iter().map(|r| r.target.clone()))
            .chain(self.expected_evidence.declared_paths().map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw() -> Value {
        json!({
            "question_id": "D1Q1",
            "dimension_id": "DIM01",
            "policy_area_id": "PA01",
            "policy_area": "fiscal",
            "unit_of_analysis": "baseline_gap",
            "orchestration": "pipeline",
            "methods": [
                {"class_name": "TextMiner", "method_name": "extract", "priority": 2, "provides": "text.snippets"},
                {"class_name": "Indicators", "method_name": "parse", "priority": 1, "provides": "numbers", "args": {"unit": "COP"}},
                {"class_name": "Bayes", "method_name": "infer", "priority": 3, "provides": "posterior"}
            ],
            "expected_evidence": {"required": ["text.snippets"], "optional": ["posterior"], "snippets_path": "text.snippets"},
            "validation_rules": [{"field": "text.snippets", "type": "array", "min_length": 1}],
            "failure_policy": {"non_essential": ["Bayes.infer"], "na_policy": "degrade"},
            "assembly_rules": [{"target": "score", "sources": ["posterior.mean"], "merge_strategy": "mean"}]
        })
    }

    #[test]
    fn parses_valid_contract() {
        let contract = Contract::from_value("D1Q1", raw()).unwrap();
        assert_eq!(contract.policy_area, Some(PolicyArea::Fiscal));
        assert_eq!(contract.methods[1].args["unit"], "COP");
        assert_eq!(contract.failure_policy.na_policy, NaPolicy::Degrade);
        assert!(!contract.failure_policy.is_essential(&MethodKey::new("Bayes", "infer")));
        assert!(contract.failure_policy.is_essential(&MethodKey::new("TextMiner", "extract")));
        assert_eq!(contract.assembly_rules[0].merge_strategy, MergeStrategy::Mean);
    }

    #[test]
    fn execution_order_follows_priority() {
        let contract = Contract::from_value("D1Q1", raw()).unwrap();
        let order: Vec<String> = contract
            .ordered_methods()
            .iter()
            .map(|m| m.key().to_string())
            .collect();
        assert_eq!(order, ["Indicators.parse", "TextMiner.extract", "Bayes.infer"]);
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let mut value = raw();
        let object = value.as_object_mut().unwrap();
        object.remove("methods");
        object.remove("failure_policy");
        object.insert("dimension_id".into(), Value::Null);

        match Contract::from_value("D1Q1", value).unwrap_err() {
            ContractError::Schema { missing, .. } => {
                assert_eq!(missing, ["dimension_id", "methods", "failure_policy"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn pipeline_rejects_priority_ties() {
        let mut value = raw();
        value["methods"][2]["priority"] = json!(2);
        match Contract::from_value("D1Q1", value).unwrap_err() {
            ContractError::Ordering { priority, methods, .. } => {
                assert_eq!(priority, 2);
                assert_eq!(methods, ["TextMiner.extract", "Bayes.infer"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn ensemble_breaks_ties_by_declaration_order() {
        let mut value = raw();
        value["orchestration"] = json!("ensemble");
        for method in value["methods"].as_array_mut().unwrap() {
            method["priority"] = json!(1);
        }
        let contract = Contract::from_value("D1Q1", value).unwrap();
        assert_eq!(contract.execution_order(), vec![0, 1, 2]);
    }

    #[test]
    fn single_requires_one_method() {
        let mut value = raw();
        value["orchestration"] = json!("single");
        assert!(matches!(
            Contract::from_value("D1Q1", value),
            Err(ContractError::Schema { .. })
        ));
    }

    #[test]
    fn unknown_non_essential_method_is_rejected() {
        let mut value = raw();
        value["failure_policy"]["non_essential"] = json!(["Ghost.method"]);
        match Contract::from_value("D1Q1", value).unwrap_err() {
            ContractError::Schema { violations, .. } => {
                assert_eq!(violations, ["failure policy references unknown method Ghost.method"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_merge_strategy_is_rejected() {
        let mut value = raw();
        value["assembly_rules"][0]["merge_strategy"] = json!("median");
        assert!(matches!(
            Contract::from_value("D1Q1", value),
            Err(ContractError::Schema { .. })
        ));
    }

    #[test]
    fn question_id_must_match_request() {
        assert!(Contract::from_value("D9Q9", raw()).is_err());
    }

    #[test]
    fn deserializing_a_contract_runs_load_checks() {
        let contract: Contract = serde_json::from_value(raw()).unwrap();
        assert_eq!(contract, Contract::from_value("D1Q1", raw()).unwrap());

        let mut value = raw();
        value["methods"] = json!([]);
        let err = serde_json::from_value::<Contract>(value).unwrap_err();
        assert!(err.to_string().contains("methods must not be empty"));

        let mut value = raw();
        value.as_object_mut().unwrap().remove("failure_policy");
        assert!(serde_json::from_value::<Contract>(value).is_err());
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(
            Contract::from_json_str("D1Q1", "{not json"),
            Err(ContractError::Parse { .. })
        ));
    }

    #[test]
    fn declared_paths_cover_outputs_targets_and_evidence() {
        let contract = Contract::from_value("D1Q1", raw()).unwrap();
        let declared = contract.declared_paths();
        for path in ["text.snippets", "numbers", "posterior", "score"] {
            assert!(declared.contains(path), "{path}");
        }
    }

    #[test]
    fn field_types_match_json_values() {
        assert!(FieldType::Integer.matches(&json!(3)));
        assert!(!FieldType::Integer.matches(&json!(3.5)));
        assert!(FieldType::Float.matches(&json!(3)));
        assert!(FieldType::Array.matches(&json!([])));
        assert!(FieldType::Any.matches(&Value::Null));
    }
}
