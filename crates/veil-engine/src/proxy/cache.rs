//! Proxy type cache
//!
//! Maps a [`Contract`] to its generated [`ProxyType`]. The default cache
//! gives every contract its own once-cell, so concurrent requests for the
//! same new contract build it once while other contracts proceed in
//! parallel.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::error::ProxyResult;
use crate::proxy::contract::Contract;
use crate::proxy::implementor::ProxyType;

/// Contract to generated implementation storage
pub trait TypeCache: Send + Sync {
    /// Whether an implementation is stored for the contract
    fn contains(&self, contract: &Contract) -> bool;

    /// Stored implementation for the contract
    fn get(&self, contract: &Contract) -> Option<Arc<ProxyType>>;

    /// Store an implementation. An existing entry is kept; the stored
    /// implementation is returned either way.
    fn store(&self, contract: Contract, ty: Arc<ProxyType>) -> Arc<ProxyType>;

    /// Fetch, or build and store, as one critical section per contract.
    /// A failed build stores nothing.
    fn get_or_build(
        &self,
        contract: &Contract,
        build: &mut dyn FnMut() -> ProxyResult<Arc<ProxyType>>,
    ) -> ProxyResult<Arc<ProxyType>>;
}

/// Default cache: one [`OnceCell`] per contract in a [`DashMap`]
#[derive(Default)]
pub struct ProxyCache {
    entries: DashMap<Contract, Arc<OnceCell<Arc<ProxyType>>>>,
}

impl ProxyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, contract: &Contract) -> Arc<OnceCell<Arc<ProxyType>>> {
        if let Some(cell) = self.entries.get(contract) {
            return cell.clone();
        }
        self.entries
            .entry(contract.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Number of built implementations
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TypeCache for ProxyCache {
    fn contains(&self, contract: &Contract) -> bool {
        self.entries
            .get(contract)
            .map(|cell| cell.get().is_some())
            .unwrap_or(false)
    }

    fn get(&self, contract: &Contract) -> Option<Arc<ProxyType>> {
        self.entries.get(contract).and_then(|cell| cell.get().cloned())
    }

    fn store(&self, contract: Contract, ty: Arc<ProxyType>) -> Arc<ProxyType> {
        let cell = self.cell(&contract);
        cell.get_or_init(|| ty).clone()
    }

    fn get_or_build(
        &self,
        contract: &Contract,
        build: &mut dyn FnMut() -> ProxyResult<Arc<ProxyType>>,
    ) -> ProxyResult<Arc<ProxyType>> {
        // The map shard lock is released before building; the cell
        // serializes builders of this contract only
        let cell = self.cell(contract);
        if let Some(ty) = cell.get() {
            tracing::trace!(target: "veil", "proxy cache hit");
            return Ok(ty.clone());
        }
        cell.get_or_try_init(|| build()).cloned()
    }
}

impl std::fmt::Debug for ProxyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCache").field("entries", &self.len()).finish()
    }
}
