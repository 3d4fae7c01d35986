//! Scoped determinism guard.
//!
//! A [`DeterminismScope`] is an RAII guard: entering marks the current
//! thread as owning a scope, and `Drop` clears the mark on every exit path,
//! including early returns and unwinding. Scopes are `!Send`, so one
//! question's scope can never migrate to another worker.

use crate::error::{DeterminismError, DeterminismResult};
use crate::registry::{SeedManifest, SeedRegistry};
use crate::seeds::{rng_from_seed, DeterministicSeeds, SeedComponent};
use rand::rngs::StdRng;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

thread_local! {
    static ACTIVE_SCOPE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Entry point for determinism scopes.
pub struct DeterminismContext;

impl DeterminismContext {
    /// Enter a scope for `(policy_unit_id, correlation_id)`.
    ///
    /// Fails with [`DeterminismError::NestedScope`] when this thread already
    /// holds a scope.
    pub fn enter(policy_unit_id: &str, correlation_id: &str) -> DeterminismResult<DeterminismScope> {
        if policy_unit_id.is_empty() {
            return Err(DeterminismError::EmptyIdentifier("policy_unit_id"));
        }
        if correlation_id.is_empty() {
            return Err(DeterminismError::EmptyIdentifier("correlation_id"));
        }

        ACTIVE_SCOPE.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(existing) = active.as_ref() {
                return Err(DeterminismError::NestedScope {
                    active_policy_unit: existing.clone(),
                });
            }
            *active = Some(policy_unit_id.to_string());
            Ok(())
        })?;

        tracing::debug!(policy_unit_id, correlation_id, "Entered determinism scope");
        Ok(DeterminismScope {
            policy_unit_id: policy_unit_id.to_string(),
            correlation_id: correlation_id.to_string(),
            seeds: DeterministicSeeds::derive(policy_unit_id, correlation_id),
            registry: RefCell::new(SeedRegistry::new()),
            aborted: Cell::new(false),
            _not_send: PhantomData,
        })
    }

    /// Whether the current thread holds a scope.
    pub fn is_active() -> bool {
        ACTIVE_SCOPE.with(|active| active.borrow().is_some())
    }
}

/// Seeds and RNG handles of one question's execution.
pub struct DeterminismScope {
    policy_unit_id: String,
    correlation_id: String,
    seeds: DeterministicSeeds,
    registry: RefCell<SeedRegistry>,
    aborted: Cell<bool>,
    _not_send: PhantomData<*const ()>,
}

impl DeterminismScope {
    pub fn policy_unit_id(&self) -> &str {
        &self.policy_unit_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn seeds(&self) -> &DeterministicSeeds {
        &self.seeds
    }

    /// Seed of a named component, recorded in the audit log.
    pub fn seed(&self, component: SeedComponent) -> u32 {
        self.registry
            .borrow_mut()
            .get_seed(&self.policy_unit_id, &self.correlation_id, component.as_str())
    }

    /// Fresh generator for a named component. Each call restarts the stream.
    pub fn rng(&self, component: SeedComponent) -> StdRng {
        rng_from_seed(self.seed(component))
    }

    /// Seed dedicated to one analysis method, keyed `Class.method`.
    pub fn method_seed(&self, class_name: &str, method_name: &str) -> u32 {
        self.registry.borrow_mut().get_seed(
            &self.policy_unit_id,
            &self.correlation_id,
            &format!("{class_name}.{method_name}"),
        )
    }

    pub fn method_rng(&self, class_name: &str, method_name: &str) -> StdRng {
        rng_from_seed(self.method_seed(class_name, method_name))
    }

    /// Record that the run was aborted while this scope was active.
    pub fn mark_aborted(&self) {
        self.aborted.set(true);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.get()
    }

    /// Manifest of every seed handed out by this scope.
    pub fn manifest(&self) -> SeedManifest {
        self.registry
            .borrow()
            .manifest(Some(&self.policy_unit_id), Some(&self.correlation_id))
    }
}

impl std::fmt::Debug for DeterminismScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeterminismScope")
            .field("policy_unit_id", &self.policy_unit_id)
            .field("correlation_id", &self.correlation_id)
            .field("aborted", &self.aborted.get())
            .finish()
    }
}

impl Drop for DeterminismScope {
    fn drop(&mut self) {
        // try_with: the thread-local may already be gone during thread teardown.
        let _ = ACTIVE_SCOPE.try_with(|active| {
            if let Ok(mut active) = active.try_borrow_mut() {
                *active = None;
            }
        });

        if self.aborted.get() || std::thread::panicking() {
            tracing::warn!(
                policy_unit_id = %self.policy_unit_id,
                correlation_id = %self.correlation_id,
                "Determinism scope exited after abort"
            );
        } else {
            tracing::debug!(
                policy_unit_id = %self.policy_unit_id,
                correlation_id = %self.correlation_id,
                "Exited determinism scope"
            );
        }
    }
}
