//! Startup validation through `Engine::from_config`.

mod common;

use common::*;
use qce_contracts::ContractError;
use qce_engine::{ConfigError, Engine, EngineConfig, EngineError};
use qce_types::ConfigurationError;
use serde_json::json;
use std::path::Path;

fn write_contract(dir: &Path, question_id: &str, raw: serde_json::Value) {
    std::fs::write(
        dir.join(format!("{question_id}.json")),
        serde_json::to_vec_pretty(&raw).unwrap(),
    )
    .unwrap();
}

fn config_for(contracts: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.contracts.dir = Some(contracts.to_path_buf());
    config
}

#[test]
fn loads_contracts_and_calibration_from_disk() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_contract(dir.path(), "D1Q1", simple_contract("D1Q1"));
    write_contract(dir.path(), "D1Q2", simple_contract("D1Q2"));
    let calibration_dir = tempfile::tempdir().unwrap();
    let calibration = calibration_dir.path().join("calibration.json");
    std::fs::write(
        &calibration,
        json!({"Echo.run": {"min_evidence_snippets": 2, "max_evidence_snippets": 20}}).to_string(),
    )
    .unwrap();

    let mut config = config_for(dir.path());
    config.calibration.registry_file = Some(calibration);
    let engine = Engine::from_config(config, base_registry()).unwrap();

    assert_eq!(engine.contracts().cached_count(), 2);
    assert!(engine.calibration().lookup("Echo", "run").is_calibrated());
    assert!(engine
        .execute_question("D1Q2", &document(), "pu_001", "corr-1")
        .unwrap()
        .record
        .success);
}

#[test]
fn unknown_method_fails_at_startup() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_contract(
        dir.path(),
        "D1Q1",
        contract(
            "D1Q1",
            "single",
            json!([method("Ghost", "haunt", 1, "answer")]),
            json!({"required": ["answer"]}),
            json!({}),
        ),
    );

    match Engine::from_config(config_for(dir.path()), base_registry()) {
        Err(EngineError::Configuration(ConfigurationError::UnknownMethods(keys))) => {
            assert_eq!(keys, ["Ghost.haunt"])
        }
        other => panic!("expected UnknownMethods, got {other:?}"),
    }
}

#[test]
fn invalid_contract_fails_at_startup() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    write_contract(
        dir.path(),
        "D1Q1",
        json!({"question_id": "D1Q1", "methods": []}),
    );

    match Engine::from_config(config_for(dir.path()), base_registry()) {
        Err(EngineError::Contract(ContractError::Schema { missing, .. })) => {
            assert!(missing.contains(&"expected_evidence".to_string()))
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn contracts_dir_is_required() {
    let err = Engine::from_config(EngineConfig::default(), base_registry()).unwrap_err();
    assert!(matches!(err, EngineError::Config(ConfigError::Invalid(_))));
}
