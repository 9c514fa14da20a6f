//! In-memory nanopub store.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use npmesh_core::error::Result;
use npmesh_core::traits::LocalStore;
use npmesh_core::types::{ContentAddress, Nanopub};

/// In-memory store keyed by artifact code.
///
/// All operations are thread-safe and can be called concurrently.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nanopubs: DashMap<String, Nanopub>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports nanopubs, returning how many were new.
    pub fn import(&self, nanopubs: impl IntoIterator<Item = Nanopub>) -> usize {
        let mut imported = 0;
        for np in nanopubs {
            let code = np.address().artifact_code().to_string();
            if self.nanopubs.insert(code, np).is_none() {
                imported += 1;
            }
        }
        debug!(imported, "Imported nanopubs into memory store");
        imported
    }

    /// Returns the number of stored nanopubs.
    pub fn len(&self) -> usize {
        self.nanopubs.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.nanopubs.is_empty()
    }

    /// Removes all nanopubs.
    pub fn clear(&self) {
        self.nanopubs.clear();
    }

    /// Lookup counters as (hits, misses).
    pub fn lookup_stats(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, address: &ContentAddress) -> Result<Option<Nanopub>> {
        let found = self
            .nanopubs
            .get(address.artifact_code())
            .map(|entry| entry.value().clone());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    fn put(&self, nanopub: &Nanopub) -> Result<()> {
        self.nanopubs
            .insert(nanopub.address().artifact_code().to_string(), nanopub.clone());
        Ok(())
    }

    fn contains(&self, address: &ContentAddress) -> bool {
        self.nanopubs.contains_key(address.artifact_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::nanopub;

    #[test]
    fn test_put_get() {
        let store = MemoryStore::new();
        let np = nanopub(1);
        store.put(&np).unwrap();

        let found = store.get(np.address()).unwrap().unwrap();
        assert_eq!(found.uri(), np.uri());
        assert!(store.contains(np.address()));
        assert!(store.get(nanopub(2).address()).unwrap().is_none());
        assert_eq!(store.lookup_stats(), (1, 1));
    }

    #[test]
    fn test_import() {
        let store = MemoryStore::new();
        assert_eq!(store.import(vec![nanopub(1), nanopub(2), nanopub(1)]), 2);
        assert_eq!(store.len(), 2);
        store.clear();
        assert!(store.is_empty());
    }
}
