//! Single-address retrieval and availability checks.

use tracing::{debug, instrument};

use npmesh_core::error::{NpmeshError, Result};
use npmesh_core::types::{ContentAddress, Nanopub};

use crate::engine::{fetch_attempt, ContentFetcher};

impl ContentFetcher {
    /// One verified attempt against one registry.
    ///
    /// Waits for a free slot of the registry's concurrency cap.
    #[instrument(skip(self, address), fields(address = %address))]
    pub async fn fetch_from(&self, registry: &str, address: &ContentAddress) -> Result<Nanopub> {
        let _permit = self
            .slot(registry)
            .acquire_owned()
            .await
            .map_err(|_| NpmeshError::InternalError("registry slot closed".into()))?;

        let nanopub = fetch_attempt(
            &self.http,
            self.codec.as_ref(),
            &self.connections,
            self.config.pool_wait,
            registry,
            address,
        )
        .await?;
        self.record_usage(registry);
        Ok(nanopub)
    }

    /// Retrieves one nanopub: local store first, then registries in directory order.
    ///
    /// Returns `None` when no registry holds a verified copy.
    #[instrument(skip(self, address), fields(address = %address))]
    pub async fn get_nanopub(&self, address: &ContentAddress) -> Result<Option<Nanopub>> {
        if let Some(nanopub) = self.lookup_local(address) {
            return Ok(Some(nanopub));
        }

        if let Some(local) = &self.config.local_registry {
            match self.fetch_from(local, address).await {
                Ok(nanopub) => return Ok(Some(nanopub)),
                Err(e) => debug!(registry = %local, error = %e, "Local registry miss"),
            }
        }

        let mut registries = self.directory.iter(self.directory.default_mode()).await;
        while let Some(registry) = registries.next_registry().await {
            match self.fetch_from(&registry.public_url, address).await {
                Ok(nanopub) => return Ok(Some(nanopub)),
                Err(e) => debug!(registry = %registry.public_url, error = %e, "Not retrieved"),
            }
        }
        Ok(None)
    }

    /// Lists the registries holding a verified copy of `address`.
    ///
    /// Stops at the first one unless `all` is set.
    #[instrument(skip(self, address), fields(address = %address))]
    pub async fn check_status(&self, address: &ContentAddress, all: bool) -> Result<Vec<String>> {
        let mut holders = Vec::new();
        let mut registries = self.directory.iter(self.directory.default_mode()).await;
        while let Some(registry) = registries.next_registry().await {
            match self.fetch_from(&registry.public_url, address).await {
                Ok(_) => {
                    debug!(registry = %registry.public_url, "Found");
                    holders.push(registry.public_url);
                    if !all {
                        break;
                    }
                }
                Err(e) => debug!(registry = %registry.public_url, error = %e, "Not found"),
            }
        }
        Ok(holders)
    }
}
