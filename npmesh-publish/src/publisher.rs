//! The publisher.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use npmesh_core::error::{NpmeshError, Result};
use npmesh_core::traits::NanopubCodec;
use npmesh_core::types::Nanopub;
use npmesh_directory::RegistryDirectory;

/// Publisher configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Registries to try, in order, instead of the directory
    pub registries: Option<Vec<String>>,
    /// Run every check but never POST
    pub dry_run: bool,
}

impl PublishConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts publication to the given registries.
    pub fn registries(mut self, registries: Vec<String>) -> Self {
        self.registries = Some(registries);
        self
    }

    /// Enables dry-run mode.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Where a nanopub was placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Registry that accepted the nanopub
    pub registry_url: String,
    /// URL of the nanopub in the registry's collection
    pub nanopub_url: String,
    /// True if nothing was actually sent
    pub dry_run: bool,
}

/// Callback invoked with the running count during a batch.
pub type ProgressCallback = Box<dyn Fn(usize) + Send + Sync>;

/// Routes new nanopubs to eligible registries.
pub struct Publisher {
    directory: Arc<RegistryDirectory>,
    codec: Arc<dyn NanopubCodec>,
    config: PublishConfig,
    current: Option<String>,
    usage: HashMap<String, u64>,
}

impl Publisher {
    /// Creates a publisher with default configuration.
    pub fn new(directory: Arc<RegistryDirectory>, codec: Arc<dyn NanopubCodec>) -> Self {
        Self::with_config(directory, codec, PublishConfig::default())
    }

    /// Creates a publisher with the given configuration.
    pub fn with_config(
        directory: Arc<RegistryDirectory>,
        codec: Arc<dyn NanopubCodec>,
        config: PublishConfig,
    ) -> Self {
        Self {
            directory,
            codec,
            config,
            current: None,
            usage: HashMap::new(),
        }
    }

    /// Accepted nanopubs per registry.
    pub fn usage(&self) -> &HashMap<String, u64> {
        &self.usage
    }

    /// The registry that accepted the last nanopub, if any.
    pub fn current_registry(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Publishes one nanopub.
    ///
    /// Protected nanopubs are rejected before any request is made.
    #[instrument(skip(self, nanopub), fields(address = %nanopub.address()))]
    pub async fn publish(&mut self, nanopub: &Nanopub) -> Result<PublishReceipt> {
        if nanopub.is_protected() {
            return Err(NpmeshError::ProtectedNanopub(nanopub.address().to_string()));
        }

        let body = self.codec.encode(nanopub.quads())?;
        let mut seen = HashSet::new();
        let mut posts = 0usize;

        if let Some(current) = self.current.clone() {
            seen.insert(current.clone());
            if let Some(receipt) = self.try_registry(&current, nanopub, &body, &mut posts).await {
                return Ok(self.accept(receipt));
            }
        }

        match self.config.registries.clone() {
            Some(list) => {
                for url in list {
                    if !seen.insert(url.clone()) {
                        continue;
                    }
                    if let Some(receipt) = self.try_registry(&url, nanopub, &body, &mut posts).await {
                        return Ok(self.accept(receipt));
                    }
                }
            }
            None => {
                let directory = Arc::clone(&self.directory);
                let mut registries = directory.iter(directory.default_mode()).await;
                while let Some(registry) = registries.next_registry().await {
                    if !seen.insert(registry.public_url.clone()) {
                        continue;
                    }
                    if let Some(receipt) = self
                        .try_registry(&registry.public_url, nanopub, &body, &mut posts)
                        .await
                    {
                        return Ok(self.accept(receipt));
                    }
                }
            }
        }

        self.current = None;
        warn!(candidates = seen.len(), posts, "No registry accepted the nanopub");
        Err(NpmeshError::PublishFailed {
            address: nanopub.address().to_string(),
            attempts: posts,
        })
    }

    /// Publishes nanopubs one at a time, stopping at the first failure.
    pub async fn publish_batch(
        &mut self,
        nanopubs: &[Nanopub],
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<PublishReceipt>> {
        let mut receipts = Vec::with_capacity(nanopubs.len());
        for nanopub in nanopubs {
            receipts.push(self.publish(nanopub).await?);
            if let Some(callback) = &progress {
                callback(receipts.len());
            }
        }
        info!(count = receipts.len(), "Batch published");
        Ok(receipts)
    }

    fn accept(&mut self, receipt: PublishReceipt) -> PublishReceipt {
        if !receipt.dry_run {
            *self.usage.entry(receipt.registry_url.clone()).or_insert(0) += 1;
            self.current = Some(receipt.registry_url.clone());
            info!(registry = %receipt.registry_url, url = %receipt.nanopub_url, "Published");
        }
        receipt
    }

    /// Checks one candidate and POSTs to it if eligible.
    async fn try_registry(
        &self,
        url: &str,
        nanopub: &Nanopub,
        body: &[u8],
        posts: &mut usize,
    ) -> Option<PublishReceipt> {
        let descriptor = match self.directory.refresh_descriptor(url).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!(registry = url, error = %e, "Skipping unreachable registry");
                return None;
            }
        };
        if !descriptor.post_nanopubs_enabled {
            debug!(registry = url, "Publishing disabled");
            return None;
        }
        if !descriptor.surface_pattern().matches_uri(nanopub.uri()) {
            debug!(registry = url, "Outside the registry's shard");
            return None;
        }

        let receipt = PublishReceipt {
            registry_url: url.to_string(),
            nanopub_url: nanopub.address().collection_url(&descriptor.collection_url()),
            dry_run: self.config.dry_run,
        };
        if self.config.dry_run {
            info!(registry = url, "Dry run, not posting");
            return Some(receipt);
        }

        *posts += 1;
        let response = self
            .directory
            .http_client()
            .post(url)
            .header(CONTENT_TYPE, self.codec.format().media_type())
            .body(body.to_vec())
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => Some(receipt),
            Ok(response) => {
                debug!(registry = url, status = response.status().as_u16(), "Rejected");
                None
            }
            Err(e) => {
                debug!(registry = url, error = %e, "POST failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npmesh_core::constants::{NANOPUBLICATION, PROTECTED_NANOPUB, RDF_TYPE};
    use npmesh_core::{NquadsCodec, Quad};
    use npmesh_directory::DirectoryConfig;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn uri(name: &str) -> String {
        format!("https://w3id.org/np/RA{:0>43}", name)
    }

    fn nanopub(name: &str, protected: bool) -> Nanopub {
        let uri = uri(name);
        let mut quads = vec![Quad::new(&uri, RDF_TYPE, NANOPUBLICATION, format!("{}#Head", uri))];
        if protected {
            quads.push(Quad::new(&uri, RDF_TYPE, PROTECTED_NANOPUB, format!("{}#pubinfo", uri)));
        }
        Nanopub::from_quads(&NquadsCodec, quads).unwrap()
    }

    /// A registry with the given capability flag, hash pattern and POST status.
    async fn registry(
        posting: bool,
        hash_pattern: Option<&str>,
        status: u16,
        expected_posts: u64,
    ) -> (MockServer, String) {
        let server = MockServer::start().await;
        let url = format!("{}/", server.uri());
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "publicUrl": &url,
                "protocolVersion": "0.3",
                "postNanopubsEnabled": posting,
                "hashPattern": hash_pattern
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("content-type", "application/n-quads"))
            .respond_with(ResponseTemplate::new(status))
            .expect(expected_posts)
            .mount(&server)
            .await;
        (server, url)
    }

    fn publisher(config: PublishConfig) -> Publisher {
        let directory = DirectoryConfig::default()
            .no_cache_file()
            .with_blocklist(vec![])
            .with_registries(config.registries.clone().unwrap_or_default());
        Publisher::with_config(
            Arc::new(RegistryDirectory::with_config(directory)),
            Arc::new(NquadsCodec),
            config,
        )
    }

    #[tokio::test]
    async fn test_protected_rejected_before_network() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut publisher = publisher(PublishConfig::new().registries(vec![format!("{}/", server.uri())]));
        let err = assert_err!(publisher.publish(&nanopub("p", true)).await);
        assert!(matches!(err, NpmeshError::ProtectedNanopub(_)));
        assert!(err.is_policy_violation());
    }

    #[tokio::test]
    async fn test_posting_disabled_means_no_posts() {
        let (_a, a) = registry(false, None, 201, 0).await;
        let (_b, b) = registry(false, None, 201, 0).await;

        let mut publisher = publisher(PublishConfig::new().registries(vec![a, b]));
        let err = assert_err!(publisher.publish(&nanopub("x", false)).await);
        assert!(matches!(err, NpmeshError::PublishFailed { attempts: 0, .. }));
    }

    #[tokio::test]
    async fn test_shard_pattern_respected() {
        let (_a, a) = registry(true, Some("zz yy"), 201, 0).await;
        let (_b, b) = registry(true, Some("0"), 201, 1).await;

        let mut publisher = publisher(PublishConfig::new().registries(vec![a, b.clone()]));
        let receipt = assert_ok!(publisher.publish(&nanopub("x", false)).await);
        assert_eq!(receipt.registry_url, b);
        assert_eq!(receipt.nanopub_url, format!("{}np/RA{:0>43}", b, "x"));
        assert!(!receipt.dry_run);
    }

    #[tokio::test]
    async fn test_rejecting_registry_skipped_and_accepting_one_reused() {
        let (_a, a) = registry(true, None, 500, 1).await;
        let (_b, b) = registry(true, None, 202, 2).await;

        let mut publisher = publisher(PublishConfig::new().registries(vec![a, b.clone()]));
        let first = assert_ok!(publisher.publish(&nanopub("one", false)).await);
        assert_eq!(first.registry_url, b);
        assert_eq!(publisher.current_registry(), Some(b.as_str()));

        // The accepting registry goes first, so the rejecting one sees no second POST.
        let second = assert_ok!(publisher.publish(&nanopub("two", false)).await);
        assert_eq!(second.registry_url, b);
        assert_eq!(publisher.usage().get(&b), Some(&2));
    }

    #[tokio::test]
    async fn test_dry_run_posts_nothing() {
        let (_a, a) = registry(true, None, 201, 0).await;

        let mut publisher = publisher(PublishConfig::new().registries(vec![a.clone()]).dry_run());
        let receipt = assert_ok!(publisher.publish(&nanopub("x", false)).await);
        assert!(receipt.dry_run);
        assert_eq!(receipt.registry_url, a);
        assert!(publisher.usage().is_empty());
    }

    #[tokio::test]
    async fn test_batch_aborts_on_failure() {
        let (_a, a) = registry(true, None, 201, 1).await;

        let mut publisher = publisher(PublishConfig::new().registries(vec![a.clone()]));
        let batch = vec![nanopub("one", false), nanopub("two", true), nanopub("three", false)];
        let err = assert_err!(publisher.publish_batch(&batch, None).await);
        assert!(matches!(err, NpmeshError::ProtectedNanopub(_)));
        assert_eq!(publisher.usage().get(&a), Some(&1));
    }

    #[tokio::test]
    async fn test_directory_order_used_without_explicit_list() {
        let (_a, a) = registry(true, None, 201, 1).await;
        let directory = DirectoryConfig::default()
            .no_cache_file()
            .with_blocklist(vec![])
            .with_registries(vec![a.clone()]);
        let mut publisher = Publisher::new(
            Arc::new(RegistryDirectory::with_config(directory)),
            Arc::new(NquadsCodec),
        );

        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let receipts = publisher
            .publish_batch(
                &[nanopub("x", false)],
                Some(Box::new(move |n| seen.store(n, std::sync::atomic::Ordering::SeqCst))),
            )
            .await
            .unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
