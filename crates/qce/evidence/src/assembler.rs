//! Priority-ordered evidence assembly.

use crate::bundle::{
    resolve_in, AssemblyTrace, CollisionResolution, Conflict, Derivation, EvidenceBundle, Insertion,
};
use crate::merge::merge_values;
use qce_contracts::Contract;
use serde_json::Value;
use std::collections::BTreeMap;

/// Output of one declared method, identified by its declaration index in
/// the contract.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutput {
    pub declaration_index: usize,
    pub value: Value,
}

impl MethodOutput {
    pub fn new(declaration_index: usize, value: Value) -> Self {
        Self {
            declaration_index,
            value,
        }
    }
}

/// Assemble method outputs into a bundle.
///
/// Outputs are inserted by `(priority, declaration_index)` regardless of the
/// order they arrive in. Outputs of methods that failed are simply absent.
/// Assembly rules run afterwards, over the inserted outputs.
pub fn assemble(contract: &Contract, outputs: Vec<MethodOutput>) -> EvidenceBundle {
    let mut outputs: Vec<MethodOutput> = outputs
        .into_iter()
        .filter(|output| {
            let known = output.declaration_index < contract.methods.len();
            if !known {
                tracing::warn!(
                    question_id = %contract.question_id,
                    declaration_index = output.declaration_index,
                    "Dropping output of undeclared method"
                );
            }
            known
        })
        .collect();
    outputs.sort_by_key(|o| (contract.methods[o.declaration_index].priority, o.declaration_index));

    let mut values: BTreeMap<String, Value> = BTreeMap::new();
    let mut trace = AssemblyTrace::default();

    for output in outputs {
        let spec = &contract.methods[output.declaration_index];
        let path = spec.provides.clone();
        let method = spec.key();

        let collision = match values.get_mut(&path) {
            None => {
                values.insert(path.clone(), output.value);
                None
            }
            Some(existing) => {
                let (resolution, conflicting_keys) = if contract.is_overwritable(&path) {
                    *existing = output.value;
                    (CollisionResolution::Replaced, Vec::new())
                } else {
                    merge_into(existing, output.value)
                };
                if resolution != CollisionResolution::Replaced {
                    tracing::debug!(
                        question_id = %contract.question_id,
                        path = %path,
                        method = %method,
                        ?resolution,
                        "Evidence path collision"
                    );
                    trace.conflicts.push(Conflict {
                        path: path.clone(),
                        method: method.clone(),
                        resolution,
                        conflicting_keys,
                    });
                }
                Some(resolution)
            }
        };

        trace.insertions.push(Insertion {
            path,
            method,
            priority: spec.priority,
            collision,
        });
    }

    let mut derived = BTreeMap::new();
    for rule in &contract.assembly_rules {
        let resolved: Vec<Value> = rule
            .sources
            .iter()
            .filter_map(|source| resolve_in(&values, source))
            .filter(|v| !v.is_null())
            .cloned()
            .collect();
        if let Some(merged) = merge_values(
            &resolved,
            rule.merge_strategy,
            rule.weights.as_deref(),
            rule.default.as_ref(),
        ) {
            derived.insert(rule.target.clone(), merged);
        }
        trace.derivations.insert(
            rule.target.clone(),
            Derivation {
                sources: rule.sources.clone(),
                strategy: rule.merge_strategy,
                values: resolved,
            },
        );
    }

    tracing::debug!(
        question_id = %contract.question_id,
        paths = values.len(),
        derived = derived.len(),
        conflicts = trace.conflicts.len(),
        "Evidence assembled"
    );
    EvidenceBundle::new(
        contract.question_id.clone(),
        values,
        derived,
        contract.declared_paths(),
        trace,
    )
}

/// Augment `existing` with a later value without overwriting it.
fn merge_into(existing: &mut Value, incoming: Value) -> (CollisionResolution, Vec<String>) {
    match (existing, incoming) {
        (Value::Array(items), Value::Array(more)) => {
            items.extend(more);
            (CollisionResolution::Appended, Vec::new())
        }
        (Value::Object(fields), Value::Object(more)) => {
            let mut conflicting = Vec::new();
            for (key, value) in more {
                if fields.contains_key(&key) {
                    conflicting.push(key);
                } else {
                    fields.insert(key, value);
                }
            }
            (CollisionResolution::Merged, conflicting)
        }
        _ => (CollisionResolution::KeptEarlier, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn contract(methods: Value, extra: Value) -> Contract {
        let mut raw = json!({
            "question_id": "D1Q1",
            "dimension_id": "DIM01",
            "policy_area_id": "PA01",
            "orchestration": "ensemble",
            "methods": methods,
            "expected_evidence": {},
            "validation_rules": [],
            "failure_policy": {}
        });
        if let (Some(object), Some(extra)) = (raw.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                object.insert(k.clone(), v.clone());
            }
        }
        Contract::from_value("D1Q1", raw).unwrap()
    }

    fn three_methods_one_path() -> Contract {
        contract(
            json!([
                {"class_name": "A", "method_name": "run", "priority": 3, "provides": "items"},
                {"class_name": "B", "method_name": "run", "priority": 1, "provides": "items"},
                {"class_name": "C", "method_name": "run", "priority": 2, "provides": "items"}
            ]),
            json!({}),
        )
    }

    #[test]
    fn inserts_in_priority_order_regardless_of_arrival() {
        let contract = three_methods_one_path();
        let outputs = vec![
            MethodOutput::new(0, json!(["a"])),
            MethodOutput::new(2, json!(["c"])),
            MethodOutput::new(1, json!(["b"])),
        ];
        let bundle = assemble(&contract, outputs);
        assert_eq!(bundle.get("items"), Some(&json!(["b", "c", "a"])));
        let order: Vec<String> = bundle
            .trace()
            .insertions
            .iter()
            .map(|i| i.method.class_name.clone())
            .collect();
        assert_eq!(order, ["B", "C", "A"]);
        assert_eq!(bundle.trace().conflicts.len(), 2);
    }

    #[test]
    fn scalars_keep_earlier_value_unless_overwritable() {
        let methods = json!([
            {"class_name": "A", "method_name": "run", "priority": 1, "provides": "score"},
            {"class_name": "B", "method_name": "run", "priority": 2, "provides": "score"}
        ]);
        let outputs = || vec![MethodOutput::new(1, json!(0.9)), MethodOutput::new(0, json!(0.2))];

        let kept = assemble(&contract(methods.clone(), json!({})), outputs());
        assert_eq!(kept.get("score"), Some(&json!(0.2)));
        assert_eq!(kept.trace().conflicts[0].resolution, CollisionResolution::KeptEarlier);

        let replaced = assemble(
            &contract(methods, json!({"overwritable_paths": ["score"]})),
            outputs(),
        );
        assert_eq!(replaced.get("score"), Some(&json!(0.9)));
        assert!(replaced.trace().conflicts.is_empty());
        assert_eq!(
            replaced.trace().insertions[1].collision,
            Some(CollisionResolution::Replaced)
        );
    }

    #[test]
    fn objects_gain_only_new_keys() {
        let methods = json!([
            {"class_name": "A", "method_name": "run", "priority": 1, "provides": "meta"},
            {"class_name": "B", "method_name": "run", "priority": 2, "provides": "meta"}
        ]);
        let bundle = assemble(
            &contract(methods, json!({})),
            vec![
                MethodOutput::new(0, json!({"lang": "es", "pages": 3})),
                MethodOutput::new(1, json!({"lang": "en", "tables": 2})),
            ],
        );
        assert_eq!(bundle.get("meta"), Some(&json!({"lang": "es", "pages": 3, "tables": 2})));
        assert_eq!(bundle.trace().conflicts[0].conflicting_keys, ["lang"]);
    }

    #[test]
    fn assembly_rules_derive_fields() {
        let methods = json!([
            {"class_name": "A", "method_name": "run", "priority": 1, "provides": "a"},
            {"class_name": "B", "method_name": "run", "priority": 2, "provides": "b"}
        ]);
        let rules = json!({"assembly_rules": [
            {"target": "confidence", "sources": ["a.score", "b.score", "c.score"], "merge_strategy": "mean"},
            {"target": "labels", "sources": ["a.labels", "b.labels"], "merge_strategy": "concat"},
            {"target": "fallback", "sources": ["missing"], "default": "n/a"}
        ]});
        let bundle = assemble(
            &contract(methods, rules),
            vec![
                MethodOutput::new(0, json!({"score": 0.4, "labels": ["x"]})),
                MethodOutput::new(1, json!({"score": 0.8, "labels": ["y", "z"]})),
            ],
        );
        let confidence = bundle.get("confidence").and_then(Value::as_f64).unwrap();
        assert!((confidence - 0.6).abs() < 1e-9);
        assert_eq!(bundle.get("labels"), Some(&json!(["x", "y", "z"])));
        assert_eq!(bundle.get("fallback"), Some(&json!("n/a")));
        assert_eq!(bundle.trace().derivations["confidence"].values.len(), 2);
    }

    #[test]
    fn unknown_declaration_index_is_dropped() {
        let bundle = assemble(&three_methods_one_path(), vec![MethodOutput::new(7, json!(1))]);
        assert!(bundle.is_empty());
    }

    proptest! {
        #[test]
        fn arrival_order_never_changes_the_bundle(
            order in Just(vec![0usize, 1, 2]).prop_shuffle()
        ) {
            let contract = three_methods_one_path();
            let labels = ["a", "b", "c"];
            let outputs = order
                .iter()
                .map(|&i| MethodOutput::new(i, json!([labels[i]])))
                .collect();
            let bundle = assemble(&contract, outputs);
            prop_assert_eq!(bundle.get("items"), Some(&json!(["b", "c", "a"])));
        }
    }
}
