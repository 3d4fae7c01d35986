//! Concurrent execution with `Engine::execute_batch`.

mod common;

use common::*;
use qce_contracts::InMemoryContractStore;
use qce_engine::{EngineConfig, EngineError, QuestionRequest, RuntimeConfig};
use qce_executor::MethodError;
use serde_json::json;
use std::sync::Arc;

fn store_with(question_ids: &[&str]) -> InMemoryContractStore {
    question_ids
        .iter()
        .fold(InMemoryContractStore::new(), |store, id| {
            store.with_contract(*id, simple_contract(id))
        })
}

fn requests(question_ids: &[&str]) -> Vec<QuestionRequest> {
    let document = Arc::new(document());
    question_ids
        .iter()
        .map(|id| QuestionRequest::new(*id, Arc::clone(&document), "pu_001", format!("corr-{id}")))
        .collect()
}

fn limited(max_concurrency: usize) -> EngineConfig {
    EngineConfig {
        runtime: RuntimeConfig {
            max_concurrency,
            expected_questions: None,
        },
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn batch_results_follow_request_order() {
    let ids = ["D1Q1", "D1Q2", "D1Q3", "D2Q1", "D2Q2", "D2Q3"];
    let engine = Arc::new(engine_with(store_with(&ids), base_registry(), limited(2)));

    let results = engine.execute_batch(requests(&ids)).await;

    assert_eq!(results.len(), ids.len());
    for (id, result) in ids.iter().zip(&results) {
        let outcome = result.as_ref().unwrap();
        assert_eq!(outcome.record.question_id, *id);
        assert_eq!(outcome.bundle.get("answer"), Some(&json!({"question": id})));
    }
    assert_eq!(engine.ledger().len(), ids.len());
    assert_eq!(engine.metrics().questions_completed, ids.len() as u64);
}

#[tokio::test]
async fn one_failing_question_does_not_stop_the_others() {
    let mut registry = base_registry();
    registry.inject_fn("Broken", "run", |_| Err(MethodError::failed("no data")));
    let broken = contract(
        "D3Q1",
        "single",
        json!([method("Broken", "run", 1, "answer")]),
        json!({"required": ["answer"]}),
        json!({}),
    );
    let store = store_with(&["D1Q1", "D2Q1"]).with_contract("D3Q1", broken);
    let engine = Arc::new(engine_with(store, registry, limited(3)));

    let results = engine
        .execute_batch(requests(&["D1Q1", "D3Q1", "D2Q1"]))
        .await;

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(EngineError::MethodFailed { .. })));
    assert!(results[2].is_ok());
    assert_eq!(engine.ledger().len(), 3);
    assert_eq!(engine.ledger().successful(), 2);
}

#[tokio::test]
async fn concurrent_questions_keep_their_own_seeds() {
    let raw = |id: &str| {
        contract(
            id,
            "single",
            json!([method("Sampler", "draw", 1, "draws")]),
            json!({"required": ["draws"]}),
            json!({}),
        )
    };
    let ids = ["D1Q1", "D1Q2", "D1Q3", "D1Q4"];
    let store = ids
        .iter()
        .fold(InMemoryContractStore::new(), |s, id| s.with_contract(*id, raw(*id)));
    let engine = Arc::new(engine_with(store, base_registry(), limited(4)));

    // Same identifiers for every question: the draws must agree, whatever
    // worker thread each question lands on.
    let document = Arc::new(document());
    let batch = ids
        .iter()
        .map(|id| QuestionRequest::new(*id, Arc::clone(&document), "pu_001", "corr-shared"))
        .collect();
    let results = engine.execute_batch(batch).await;

    let draws: Vec<_> = results
        .iter()
        .map(|r| r.as_ref().unwrap().bundle.get("draws").cloned())
        .collect();
    assert!(draws.windows(2).all(|w| w[0] == w[1]));
}
