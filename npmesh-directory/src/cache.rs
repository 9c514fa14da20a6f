//! Descriptor caching: an in-process map and the on-disk peer list.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use npmesh_core::constants::MIN_PERSISTED_PEERS;
use npmesh_core::error::Result;
use npmesh_core::types::RegistryDescriptor;

// ═══════════════════════════════════════════════════════════════════════════════
// IN-PROCESS DESCRIPTOR CACHE
// ═══════════════════════════════════════════════════════════════════════════════

struct CacheState {
    entries: HashMap<String, RegistryDescriptor>,
    refreshed_at: Instant,
}

/// Descriptors keyed by registry URL.
///
/// Entries do not expire individually; the whole map is wiped once the
/// refresh interval has passed. Failed lookups are never cached.
pub struct DescriptorCache {
    state: RwLock<CacheState>,
    refresh_interval: Duration,
}

impl DescriptorCache {
    /// Creates an empty cache.
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                refreshed_at: Instant::now(),
            }),
            refresh_interval,
        }
    }

    fn clear_if_stale(&self) {
        let stale = self.state.read().refreshed_at.elapsed() > self.refresh_interval;
        if stale {
            let mut state = self.state.write();
            if state.refreshed_at.elapsed() > self.refresh_interval {
                debug!(entries = state.entries.len(), "Wiping descriptor cache");
                state.entries.clear();
                state.refreshed_at = Instant::now();
            }
        }
    }

    /// Gets a cached descriptor.
    pub fn get(&self, url: &str) -> Option<RegistryDescriptor> {
        self.clear_if_stale();
        self.state.read().entries.get(url).cloned()
    }

    /// Caches a descriptor under `url`.
    pub fn insert(&self, url: &str, descriptor: RegistryDescriptor) {
        self.clear_if_stale();
        self.state.write().entries.insert(url.to_string(), descriptor);
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.refreshed_at = Instant::now();
    }

    /// Returns the number of cached descriptors.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ON-DISK PEER CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Contents of the peer cache file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerCacheFile {
    /// When the list was written
    pub saved_at: DateTime<Utc>,
    /// Registries found by the crawl that wrote the file
    pub registries: Vec<RegistryDescriptor>,
}

impl PeerCacheFile {
    /// Returns true if the file was saved within `max_age` and not in the future.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.saved_at);
        match age.to_std() {
            Ok(age) => age <= max_age,
            Err(_) => false,
        }
    }
}

/// Loads the peer list if the file exists and is fresh.
///
/// Unreadable or stale files yield `None`.
pub async fn load_peer_cache(path: &Path, max_age: Duration) -> Option<Vec<RegistryDescriptor>> {
    let contents = fs::read(path).await.ok()?;
    let file: PeerCacheFile = match serde_json::from_slice(&contents) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = ?path, error = %e, "Ignoring unreadable peer cache");
            return None;
        }
    };
    if !file.is_fresh(max_age, Utc::now()) {
        debug!(path = ?path, saved_at = %file.saved_at, "Ignoring stale peer cache");
        return None;
    }
    debug!(path = ?path, count = file.registries.len(), "Loaded peer cache");
    Some(file.registries)
}

/// Saves the peer list, unless it is too short to be trusted.
///
/// Returns whether the file was written.
pub async fn save_peer_cache(path: &Path, registries: &[RegistryDescriptor]) -> Result<bool> {
    if registries.len() < MIN_PERSISTED_PEERS {
        debug!(count = registries.len(), "Peer list too short, not persisting");
        return Ok(false);
    }

    let file = PeerCacheFile {
        saved_at: Utc::now(),
        registries: registries.to_vec(),
    };
    let serialized = serde_json::to_vec_pretty(&file)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("tmp");
    let mut out = fs::File::create(&temp_path).await?;
    out.write_all(&serialized).await?;
    out.sync_all().await?;
    fs::rename(&temp_path, path).await?;

    info!(count = registries.len(), path = ?path, "Saved peer cache");
    Ok(true)
}
