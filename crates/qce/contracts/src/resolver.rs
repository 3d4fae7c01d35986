//! Cached contract resolution.

use crate::error::{ContractError, ContractResult};
use crate::model::Contract;
use crate::store::ContractStore;
use parking_lot::{Mutex, RwLock};
use qce_types::MethodKey;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Resolves question ids to validated, shared contracts.
///
/// The cache is read-mostly: hits take the read lock only. A miss takes a
/// per-question load guard and checks again, so concurrent first requests
/// for the same question load and validate it once, while misses for other
/// questions load in parallel. The cache write lock is held only for the
/// insert.
pub struct ContractResolver {
    store: Box<dyn ContractStore>,
    cache: RwLock<HashMap<String, Arc<Contract>>>,
    loading: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ContractResolver {
    pub fn new(store: impl ContractStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            cache: RwLock::new(HashMap::new()),
            loading: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, question_id: &str) -> ContractResult<Arc<Contract>> {
        if let Some(contract) = self.cached(question_id) {
            return Ok(contract);
        }

        let guard = Arc::clone(
            self.loading
                .lock()
                .entry(question_id.to_string())
                .or_default(),
        );
        let _loading = guard.lock();
        if let Some(contract) = self.cached(question_id) {
            return Ok(contract);
        }

        let result = self.load(question_id).map(|contract| {
            let mut cache = self.cache.write();
            Arc::clone(cache.entry(question_id.to_string()).or_insert(contract))
        });
        self.loading.lock().remove(question_id);
        result
    }

    fn cached(&self, question_id: &str) -> Option<Arc<Contract>> {
        self.cache.read().get(question_id).map(Arc::clone)
    }

    fn load(&self, question_id: &str) -> ContractResult<Arc<Contract>> {
        let raw = self
            .store
            .load(question_id)?
            .ok_or_else(|| ContractError::NotFound {
                question_id: question_id.to_string(),
            })?;
        let contract = match Contract::from_value(question_id, raw) {
            Ok(contract) => Arc::new(contract),
            Err(e) => {
                tracing::error!(question_id, store = self.store.name(), error = %e, "Contract rejected");
                return Err(e);
            }
        };

        tracing::info!(
            question_id,
            store = self.store.name(),
            methods = contract.methods.len(),
            "Contract loaded"
        );
        Ok(contract)
    }

    /// Load and validate contracts ahead of execution. Stops at the first
    /// invalid contract.
    pub fn warm_up<I, S>(&self, question_ids: I) -> ContractResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = 0;
        for question_id in question_ids {
            self.resolve(question_id.as_ref())?;
            loaded += 1;
        }
        tracing::info!(loaded, cached = self.cached_count(), "Contract cache warmed up");
        Ok(loaded)
    }

    /// Warm up every contract the store can enumerate.
    pub fn warm_up_all(&self) -> ContractResult<usize> {
        let ids = self.store.question_ids()?;
        self.warm_up(ids)
    }

    /// Name of the backing store, for logs.
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Every method referenced by a cached contract, for startup validation
    /// against the method registry.
    pub fn cached_method_keys(&self) -> BTreeSet<MethodKey> {
        self.cache
            .read()
            .values()
            .flat_map(|c| c.method_keys())
            .collect()
    }
}

impl std::fmt::Debug for ContractResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractResolver")
            .field("store", &self.store.name())
            .field("cached", &self.cached_count())
            .finish()
    }
}
