//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use qce_calibration::CalibrationResolver;
use qce_contracts::{ContractResolver, InMemoryContractStore};
use qce_engine::{DocumentContext, Engine, EngineConfig};
use qce_executor::{MethodError, MethodRegistry};
use rand::Rng;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Raw contract JSON with no validation rules.
pub fn contract(
    question_id: &str,
    orchestration: &str,
    methods: Value,
    expected_evidence: Value,
    failure_policy: Value,
) -> Value {
    json!({
        "question_id": question_id,
        "dimension_id": "DIM01",
        "policy_area_id": "PA01",
        "orchestration": orchestration,
        "methods": methods,
        "expected_evidence": expected_evidence,
        "validation_rules": [],
        "failure_policy": failure_policy
    })
}

pub fn method(class_name: &str, method_name: &str, priority: i64, provides: &str) -> Value {
    json!({
        "class_name": class_name,
        "method_name": method_name,
        "priority": priority,
        "provides": provides
    })
}

/// A single-method contract answered by `Echo.run`.
pub fn simple_contract(question_id: &str) -> Value {
    contract(
        question_id,
        "single",
        json!([method("Echo", "run", 1, "answer")]),
        json!({"required": ["answer"]}),
        json!({}),
    )
}

/// Registry with a few well-behaved methods:
///
/// - `Echo.run` returns its `question_id` argument wrapped in an object.
/// - `Sampler.draw` returns four draws from its seeded generator.
/// - `Tagger.tag` returns a one-element array holding its `tag` argument.
pub fn base_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    registry.inject_fn("Echo", "run", |kwargs| {
        Ok(json!({"question": kwargs.get("question_id").cloned().unwrap_or(Value::Null)}))
    });
    registry.inject_fn("Sampler", "draw", |kwargs| {
        let mut rng = kwargs
            .rng()
            .ok_or_else(|| MethodError::failed("no seed supplied"))?;
        let draws: Vec<u32> = (0..4).map(|_| rng.gen()).collect();
        Ok(json!(draws))
    });
    registry.inject_fn("Tagger", "tag", |kwargs| {
        Ok(json!([kwargs.get("tag").cloned().unwrap_or(Value::Null)]))
    });
    registry
}

pub fn engine_with(store: InMemoryContractStore, registry: MethodRegistry, config: EngineConfig) -> Engine {
    init_tracing();
    Engine::new(
        config,
        ContractResolver::new(store),
        CalibrationResolver::default(),
        Arc::new(registry),
    )
}

pub fn engine(store: InMemoryContractStore, registry: MethodRegistry) -> Engine {
    engine_with(store, registry, EngineConfig::default())
}

pub fn document() -> DocumentContext {
    DocumentContext::new("Plan de desarrollo municipal 2024-2027").with_chunks(["c-001", "c-002"])
}
