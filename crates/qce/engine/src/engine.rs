//! Question execution and run sealing.

use crate::config::EngineConfig;
use crate::document::DocumentContext;
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::ledger::RunLedger;
use crate::metrics::{ExecutionMetrics, MetricsSnapshot};
use parking_lot::Mutex;
use qce_calibration::{CalibrationContext, CalibrationParameters, CalibrationRegistry, CalibrationResolver};
use qce_contracts::{Contract, ContractResolver, DirectoryContractStore, Orchestration};
use qce_determinism::{DeterminismContext, DeterminismScope};
use qce_evidence::{assemble, validate_contract, EvidenceBundle, MethodOutput, ValidationResult};
use qce_executor::{ExecuteError, ExecutorAdapter, Kwargs, MethodLookup, MethodRegistry};
use qce_proof::{
    collect_artifacts_manifest, hash_canonical, ProofGenerator, ProofRecord, ProofState, RunOutcome,
};
use qce_types::{ExecutionRecord, MethodExecution, MethodStatus, RunId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Everything `execute_question` produces for one question.
#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    pub bundle: EvidenceBundle,
    pub validation: ValidationResult,
    pub record: ExecutionRecord,
}

/// One question of a batch.
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub question_id: String,
    pub document: Arc<DocumentContext>,
    pub policy_unit_id: String,
    pub correlation_id: String,
}

impl QuestionRequest {
    pub fn new(
        question_id: impl Into<String>,
        document: Arc<DocumentContext>,
        policy_unit_id: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            document,
            policy_unit_id: policy_unit_id.into(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// The contract-driven execution engine.
///
/// Shared across workers behind an `Arc`; each question gets its own
/// bundle and its own determinism scope on whichever thread runs it.
pub struct Engine {
    run_id: RunId,
    config: EngineConfig,
    contracts: ContractResolver,
    calibration: CalibrationResolver,
    executor: ExecutorAdapter,
    ledger: RunLedger,
    metrics: ExecutionMetrics,
    proof: Mutex<ProofGenerator>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        contracts: ContractResolver,
        calibration: CalibrationResolver,
        lookup: Arc<dyn MethodLookup>,
    ) -> Self {
        let run_id = RunId::generate();
        let executor = ExecutorAdapter::new(lookup).with_max_input_bytes(config.executor.max_input_bytes);

        let mut proof = ProofGenerator::new(run_id.as_str(), config.proof.run_dir.clone())
            .with_calibration_digest(calibration.registry().digest());
        for (name, path) in &config.proof.code_artifacts {
            proof = proof.with_code_artifact(name.clone(), path.clone());
        }
        if let Some(document) = &config.proof.input_document {
            proof = proof.with_input_document(document.clone());
        }

        tracing::info!(
            run_id = %run_id,
            contract_store = contracts.store_name(),
            calibrated_methods = calibration.registry().len(),
            "Engine initialized"
        );
        Self {
            run_id,
            config,
            contracts,
            calibration,
            executor,
            ledger: RunLedger::new(),
            metrics: ExecutionMetrics::new(),
            proof: Mutex::new(proof),
        }
    }

    /// Build an engine from configuration, failing fast on anything
    /// malformed: the config itself, any contract, the calibration file, or
    /// a contract naming a method the registry does not know.
    pub fn from_config(config: EngineConfig, registry: MethodRegistry) -> EngineResult<Self> {
        config.validate()?;

        let dir = config
            .contracts
            .dir
            .clone()
            .ok_or_else(|| ConfigError::Invalid("contracts.dir must be set".into()))?;
        let contracts = ContractResolver::new(DirectoryContractStore::new(dir));
        let loaded = contracts.warm_up_all()?;

        let calibration = match &config.calibration.registry_file {
            Some(path) => CalibrationRegistry::load(path)?,
            None => CalibrationRegistry::new(),
        };

        let required = contracts.cached_method_keys();
        registry.validate_against(required.iter())?;
        let uncalibrated = calibration.uncalibrated(required.iter());
        if !uncalibrated.is_empty() {
            tracing::warn!(
                count = uncalibrated.len(),
                first = %uncalibrated[0],
                "Methods without calibration will use defaults"
            );
        }

        tracing::info!(contracts = loaded, methods = required.len(), "Startup validation passed");
        Ok(Self::new(
            config,
            contracts,
            CalibrationResolver::new(calibration),
            Arc::new(registry),
        ))
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn contracts(&self) -> &ContractResolver {
        &self.contracts
    }

    pub fn calibration(&self) -> &CalibrationResolver {
        &self.calibration
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn proof_state(&self) -> ProofState {
        self.proof.lock().state().clone()
    }

    /// Raise the run's abort signal. In-flight methods finish, nothing new
    /// starts, and the run can no longer be sealed.
    pub fn abort(&self) {
        tracing::warn!(run_id = %self.run_id, "Abort requested");
        self.executor.abort_flag().store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.executor.abort_flag().load(Ordering::SeqCst)
    }

    // ── Question execution ─────────────────────────────────────────────

    /// Execute one question end to end.
    ///
    /// The execution record is appended to the run ledger whether the
    /// question succeeds or not. A question succeeds when every essential
    /// method succeeded and the evidence passed validation.
    #[tracing::instrument(
        name = "execute_question",
        skip(self, document),
        fields(run_id = %self.run_id)
    )]
    pub fn execute_question(
        &self,
        question_id: &str,
        document: &DocumentContext,
        policy_unit_id: &str,
        correlation_id: &str,
    ) -> EngineResult<QuestionOutcome> {
        if self.is_aborted() {
            return Err(EngineError::Aborted {
                question_id: question_id.to_string(),
            });
        }

        let contract = self.contracts.resolve(question_id)?;
        let scope = DeterminismContext::enter(policy_unit_id, correlation_id)?;
        let mut record = ExecutionRecord::begin(question_id);

        let result = self.run_question(&contract, document, &scope, &mut record);
        record.seeds = scope.manifest().seeds;

        match result {
            Ok((bundle, validation)) => {
                record.evidence_paths = bundle.len();
                record.finish(validation.passed);
                if validation.passed {
                    self.metrics.question_completed();
                } else {
                    self.metrics.question_failed();
                }
                tracing::info!(
                    question_id,
                    event_id = %record.event_id,
                    success = record.success,
                    degraded = validation.degraded,
                    evidence_paths = record.evidence_paths,
                    duration_ms = record.duration_ms(),
                    "Question executed"
                );
                self.ledger.append(record.clone());
                Ok(QuestionOutcome {
                    bundle,
                    validation,
                    record,
                })
            }
            Err(err) => {
                if err.is_fatal() {
                    scope.mark_aborted();
                    self.metrics.fatal_abort();
                }
                self.metrics.question_failed();
                record.finish(false);
                tracing::error!(
                    question_id,
                    event_id = %record.event_id,
                    error = %err,
                    "Question failed"
                );
                self.ledger.append(record);
                Err(err)
            }
        }
    }

    fn run_question(
        &self,
        contract: &Contract,
        document: &DocumentContext,
        scope: &DeterminismScope,
        record: &mut ExecutionRecord,
    ) -> EngineResult<(EvidenceBundle, ValidationResult)> {
        let question_id = contract.question_id.as_str();
        let base_context = self.base_context(contract);
        let order = contract.execution_order();
        let total = order.len();

        let mut outputs = Vec::with_capacity(total);
        let mut upstream = Map::new();
        let mut validation_calibration = None;

        for (position, index) in order.into_iter().enumerate() {
            let spec = &contract.methods[index];
            let key = spec.key();
            let context = base_context.with_method_position(position, total);
            let calibration = self
                .calibration
                .resolve(&spec.class_name, &spec.method_name, &context);
            if validation_calibration.is_none() {
                validation_calibration = Some(calibration);
            }

            let mut kwargs = self.method_kwargs(contract, document, &calibration, &upstream);
            for (name, value) in &spec.args {
                kwargs.insert(name.clone(), value.clone());
            }
            let kwargs = kwargs.with_seed(scope.method_seed(&spec.class_name, &spec.method_name));

            self.metrics.method_invoked();
            let started = Instant::now();
            let result = self.executor.execute(&spec.class_name, &spec.method_name, &kwargs);
            let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let mut execution = MethodExecution {
                method: key.clone(),
                priority: spec.priority,
                provides: spec.provides.clone(),
                status: MethodStatus::Succeeded,
                latency_ms,
                output_digest: None,
            };

            match result {
                Ok(value) => {
                    self.metrics.method_succeeded();
                    execution.output_digest = hash_canonical(&value).ok();
                    tracing::debug!(question_id, method = %key, latency_ms, "Method succeeded");
                    if contract.orchestration == Orchestration::Pipeline {
                        upstream.insert(spec.provides.clone(), value.clone());
                    }
                    outputs.push(MethodOutput::new(index, value));
                    record.push(execution);
                }
                Err(ExecuteError::Fatal(fatal)) => {
                    self.metrics.method_failed();
                    execution.status = MethodStatus::Failed {
                        event_id: fatal.event_id,
                        reason: fatal.to_string(),
                    };
                    record.push(execution);
                    return Err(EngineError::Fatal {
                        question_id: question_id.to_string(),
                        fatal,
                    });
                }
                Err(ExecuteError::Failure(failure)) => {
                    if contract.failure_policy.is_essential(&key) {
                        self.metrics.method_failed();
                        execution.status = MethodStatus::Failed {
                            event_id: failure.event_id,
                            reason: failure.detail.clone(),
                        };
                        record.push(execution);
                        return Err(EngineError::MethodFailed {
                            question_id: question_id.to_string(),
                            failure,
                        });
                    }
                    self.metrics.method_skipped();
                    tracing::warn!(
                        question_id,
                        method = %key,
                        event_id = %failure.event_id,
                        provides = %spec.provides,
                        "Non-essential method failed, continuing without its output"
                    );
                    execution.status = MethodStatus::SkippedNonEssential {
                        event_id: failure.event_id,
                        reason: failure.detail.clone(),
                    };
                    record.push(execution);
                }
            }
        }

        let bundle = assemble(contract, outputs);
        let calibration = validation_calibration.unwrap_or_default();
        let validation =
            validate_contract(&bundle, contract, &calibration).map_err(|source| EngineError::Validation {
                question_id: question_id.to_string(),
                source,
            })?;
        if !validation.passed {
            tracing::warn!(
                question_id,
                errors = validation.errors().count(),
                "Evidence failed validation"
            );
        }
        Ok((bundle, validation))
    }

    fn base_context(&self, contract: &Contract) -> CalibrationContext {
        let mut context = self.calibration.infer_context(&contract.question_id);
        if let Some(area) = contract.policy_area {
            context = context.with_policy_area(area);
        }
        if let Some(unit) = contract.unit_of_analysis {
            context = context.with_unit_of_analysis(unit);
        }
        context
    }

    /// Keyword arguments shared by every method of a question. Contract
    /// `args` are layered on top by the caller.
    fn method_kwargs(
        &self,
        contract: &Contract,
        document: &DocumentContext,
        calibration: &CalibrationParameters,
        upstream: &Map<String, Value>,
    ) -> Kwargs {
        let mut kwargs: Kwargs = document.kwargs().into_iter().collect();
        kwargs.insert("question_id", contract.question_id.as_str());
        kwargs.insert("policy_area_id", contract.policy_area_id.as_str());
        kwargs.insert("dimension_id", contract.dimension_id.as_str());
        if let Ok(calibration) = serde_json::to_value(calibration) {
            kwargs.insert("calibration", calibration);
        }
        if contract.orchestration == Orchestration::Pipeline {
            kwargs.insert("upstream", Value::Object(upstream.clone()));
        }
        kwargs
    }

    // ── Batches ────────────────────────────────────────────────────────

    /// Execute questions concurrently, at most `runtime.max_concurrency` at
    /// a time, each on a blocking worker. Results come back in request
    /// order.
    pub async fn execute_batch(
        self: &Arc<Self>,
        requests: Vec<QuestionRequest>,
    ) -> Vec<EngineResult<QuestionOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.config.runtime.max_concurrency.max(1)));
        tracing::info!(
            run_id = %self.run_id,
            questions = requests.len(),
            max_concurrency = self.config.runtime.max_concurrency,
            "Executing batch"
        );

        let mut handles = Vec::with_capacity(requests.len());
        for request in requests {
            let engine = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let question_id = request.question_id.clone();
            let handle: JoinHandle<EngineResult<QuestionOutcome>> = tokio::spawn(async move {
                let worker_error = |question_id: &str, reason: String| EngineError::Worker {
                    question_id: question_id.to_string(),
                    reason,
                };
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| worker_error(&request.question_id, e.to_string()))?;
                let question_id = request.question_id.clone();
                tokio::task::spawn_blocking(move || {
                    engine.execute_question(
                        &request.question_id,
                        &request.document,
                        &request.policy_unit_id,
                        &request.correlation_id,
                    )
                })
                .await
                .map_err(|e| worker_error(&question_id, e.to_string()))?
            });
            handles.push((question_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (question_id, handle) in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(EngineError::Worker {
                    question_id,
                    reason: e.to_string(),
                }),
            });
        }
        results
    }

    // ── Sealing ────────────────────────────────────────────────────────

    /// Seal the run from `records` if every success condition holds.
    ///
    /// A question that ran more than once counts by its latest record, so a
    /// retried success never stands in for another question. The expected
    /// phase count is `runtime.expected_questions`, or the number of
    /// distinct questions when unset. Returns `Ok(None)` while any condition
    /// fails.
    pub fn seal_run(
        &self,
        records: &[ExecutionRecord],
        artifacts: &[PathBuf],
    ) -> EngineResult<Option<ProofRecord>> {
        let mut latest: BTreeMap<&str, &ExecutionRecord> = BTreeMap::new();
        for record in records {
            latest.insert(record.question_id.as_str(), record);
        }

        let phases_total = self.config.runtime.expected_questions.unwrap_or(latest.len());
        let phases_success = latest.values().filter(|r| r.success).count();
        if latest.len() < records.len() {
            tracing::debug!(
                records = records.len(),
                questions = latest.len(),
                "Repeated questions counted once"
            );
        }

        let mut execution_metadata = BTreeMap::new();
        if let Ok(metrics) = serde_json::to_value(self.metrics.snapshot()) {
            execution_metadata.insert("metrics".to_string(), metrics);
        }
        execution_metadata.insert(
            "methods_executed".to_string(),
            Value::from(records.iter().map(|r| r.methods.len()).sum::<usize>()),
        );
        let run_dir_files = collect_artifacts_manifest(&self.config.proof.run_dir)?;
        execution_metadata.insert(
            "run_dir_manifest".to_string(),
            Value::Object(
                run_dir_files
                    .into_iter()
                    .map(|(path, hash)| (path, Value::String(hash)))
                    .collect(),
            ),
        );

        let outcome = RunOutcome {
            phases_total,
            phases_success,
            questions_total: phases_total,
            questions_answered: phases_success,
            evidence_records: latest.values().map(|r| r.evidence_paths).sum(),
            aborted: self.is_aborted(),
            artifacts: artifacts.to_vec(),
            execution_metadata,
        };
        Ok(self.proof.lock().try_seal(&outcome)?)
    }

    /// Seal the run from the engine's own ledger.
    pub fn seal_ledger(&self, artifacts: &[PathBuf]) -> EngineResult<Option<ProofRecord>> {
        self.seal_run(&self.ledger.records(), artifacts)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("run_id", &self.run_id)
            .field("contracts_cached", &self.contracts.cached_count())
            .field("ledger_len", &self.ledger.len())
            .field("aborted", &self.is_aborted())
            .finish_non_exhaustive()
    }
}
