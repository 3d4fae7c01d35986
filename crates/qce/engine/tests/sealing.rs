//! Run sealing through `Engine::seal_run`.

mod common;

use common::*;
use qce_contracts::InMemoryContractStore;
use qce_engine::{Engine, EngineConfig, EngineError, ProofConfig, RuntimeConfig};
use qce_executor::MethodError;
use qce_proof::{verify_run_dir, ProofState, PROOF_HASH_FILE, PROOF_JSON_FILE};
use qce_types::ExecutionRecord;
use serde_json::json;
use std::path::{Path, PathBuf};

const QUESTIONS: [&str; 5] = ["D1Q1", "D1Q2", "D1Q3", "D1Q4", "D1Q5"];

fn sealing_engine(run_dir: &Path, expected_questions: usize) -> Engine {
    let store = QUESTIONS
        .iter()
        .fold(InMemoryContractStore::new(), |s, id| s.with_contract(*id, simple_contract(id)));
    let config = EngineConfig {
        runtime: RuntimeConfig {
            max_concurrency: 1,
            expected_questions: Some(expected_questions),
        },
        proof: ProofConfig {
            run_dir: run_dir.to_path_buf(),
            ..ProofConfig::default()
        },
        ..EngineConfig::default()
    };
    engine_with(store, base_registry(), config)
}

fn run_all(engine: &Engine) -> Vec<ExecutionRecord> {
    QUESTIONS
        .iter()
        .map(|id| {
            engine
                .execute_question(id, &document(), "pu_001", "corr-1")
                .unwrap()
                .record
        })
        .collect()
}

fn write_artifact(dir: &Path) -> PathBuf {
    let path = dir.join("answers.json");
    std::fs::write(&path, r#"{"answers": 5}"#).unwrap();
    path
}

#[test]
fn four_of_five_phases_is_not_sealed_five_of_five_is() {
    let dir = tempfile::tempdir().unwrap();
    let engine = sealing_engine(dir.path(), 5);
    let mut records = run_all(&engine);
    let artifacts = vec![write_artifact(dir.path())];

    records[4].success = false;
    assert!(engine.seal_run(&records, &artifacts).unwrap().is_none());
    assert_eq!(engine.proof_state(), ProofState::Pending);
    assert!(!dir.path().join(PROOF_JSON_FILE).exists());

    records[4].success = true;
    let proof = engine.seal_run(&records, &artifacts).unwrap().unwrap();
    assert_eq!(proof.phases_total, 5);
    assert_eq!(proof.phases_success, 5);
    assert_eq!(proof.run_id, engine.run_id().as_str());
    assert!(proof.artifacts_manifest.contains_key("answers.json"));
    assert!(proof.calibration_hash.is_some());
    assert!(proof.execution_metadata["run_dir_manifest"]
        .get("answers.json")
        .is_some());

    assert!(dir.path().join(PROOF_HASH_FILE).is_file());
    assert!(verify_run_dir(dir.path()).unwrap().valid);
    assert!(matches!(engine.proof_state(), ProofState::Sealed { .. }));
}

#[test]
fn sealing_is_one_way() {
    let dir = tempfile::tempdir().unwrap();
    let engine = sealing_engine(dir.path(), 5);
    run_all(&engine);
    let artifacts = vec![write_artifact(dir.path())];

    assert!(engine.seal_ledger(&artifacts).unwrap().is_some());
    assert!(engine.seal_ledger(&artifacts).is_err());
}

#[test]
fn missing_artifacts_prevent_sealing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = sealing_engine(dir.path(), 5);
    run_all(&engine);

    assert!(engine.seal_ledger(&[]).unwrap().is_none());
    assert!(engine
        .seal_ledger(&[dir.path().join("never-written.json")])
        .unwrap()
        .is_none());
}

#[test]
fn abort_prevents_sealing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = sealing_engine(dir.path(), 5);
    run_all(&engine);
    let artifacts = vec![write_artifact(dir.path())];

    engine.abort();
    assert!(engine.seal_ledger(&artifacts).unwrap().is_none());
    assert_eq!(engine.proof_state(), ProofState::Pending);
}

#[test]
fn fatal_method_leaves_the_run_unsealable() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = base_registry();
    registry.inject_fn("Model", "embed", |_| Err(MethodError::Interrupted));
    let store = InMemoryContractStore::new().with_contract(
        "D1Q1",
        contract(
            "D1Q1",
            "single",
            json!([method("Model", "embed", 1, "answer")]),
            json!({"required": ["answer"]}),
            json!({}),
        ),
    );
    let config = EngineConfig {
        proof: ProofConfig {
            run_dir: dir.path().to_path_buf(),
            ..ProofConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = engine_with(store, registry, config);
    let artifacts = vec![write_artifact(dir.path())];

    assert!(engine
        .execute_question("D1Q1", &document(), "pu_001", "corr-1")
        .is_err());
    assert!(engine.seal_ledger(&artifacts).unwrap().is_none());
}

#[test]
fn repeated_successes_do_not_cover_a_failed_question() {
    let dir = tempfile::tempdir().unwrap();
    let engine = sealing_engine(dir.path(), 5);
    let mut records = run_all(&engine);
    let artifacts = vec![write_artifact(dir.path())];

    records[4].success = false;
    records.push(records[0].clone());
    assert!(engine.seal_run(&records, &artifacts).unwrap().is_none());

    let mut failed_retry = records[1].clone();
    failed_retry.success = false;
    let mut retried = records.clone();
    retried[4].success = true;
    retried.push(failed_retry);
    assert!(engine.seal_run(&retried, &artifacts).unwrap().is_none());
    assert_eq!(engine.proof_state(), ProofState::Pending);

    let mut recovered = records.clone();
    let mut d1q5 = recovered[4].clone();
    d1q5.success = true;
    recovered.push(d1q5);
    let proof = engine.seal_run(&recovered, &artifacts).unwrap().unwrap();
    assert_eq!(proof.phases_success, 5);
    assert_eq!(proof.questions_answered, 5);
}

#[test]
fn rerun_question_in_ledger_does_not_seal_over_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = base_registry();
    registry.inject_fn("Parser", "parse", |_| Err(MethodError::failed("no table found")));
    let store = QUESTIONS
        .iter()
        .take(4)
        .fold(InMemoryContractStore::new(), |s, id| s.with_contract(*id, simple_contract(id)))
        .with_contract(
            "D1Q5",
            contract(
                "D1Q5",
                "single",
                json!([method("Parser", "parse", 1, "answer")]),
                json!({"required": ["answer"]}),
                json!({}),
            ),
        );
    let config = EngineConfig {
        runtime: RuntimeConfig {
            max_concurrency: 1,
            expected_questions: Some(5),
        },
        proof: ProofConfig {
            run_dir: dir.path().to_path_buf(),
            ..ProofConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = engine_with(store, registry, config);

    for id in &QUESTIONS[..4] {
        engine
            .execute_question(id, &document(), "pu_001", "corr-1")
            .unwrap();
    }
    assert!(engine
        .execute_question("D1Q5", &document(), "pu_001", "corr-1")
        .is_err());
    engine
        .execute_question("D1Q1", &document(), "pu_001", "corr-1")
        .unwrap();
    assert_eq!(engine.ledger().len(), 6);

    let artifacts = vec![write_artifact(dir.path())];
    assert!(engine.seal_ledger(&artifacts).unwrap().is_none());
    assert!(!dir.path().join(PROOF_JSON_FILE).exists());
}

#[test]
fn failed_proof_write_can_be_retried() {
    let dir = tempfile::tempdir().unwrap();
    let engine = sealing_engine(dir.path(), 5);
    run_all(&engine);
    let artifacts = vec![write_artifact(dir.path())];
    let hash_path = dir.path().join(PROOF_HASH_FILE);
    std::fs::write(&hash_path, "left over").unwrap();

    assert!(matches!(
        engine.seal_ledger(&artifacts),
        Err(EngineError::Proof(_))
    ));
    assert!(!dir.path().join(PROOF_JSON_FILE).exists());
    assert_eq!(engine.proof_state(), ProofState::Pending);

    std::fs::remove_file(&hash_path).unwrap();
    assert!(engine.seal_ledger(&artifacts).unwrap().is_some());
    assert!(verify_run_dir(dir.path()).unwrap().valid);
}
