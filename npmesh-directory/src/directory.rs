//! Registry discovery.
//!
//! A [`RegistryDirectory`] is constructed once and shared by `Arc`. Each call
//! to [`RegistryDirectory::iter`] starts a new lazy walk over the candidate
//! registries: either the fresh on-disk peer list, or a crawl that starts from
//! the bootstrap (or explicit) list and follows every yielded registry's peers.

use std::collections::{HashSet, VecDeque};

use reqwest::header::ACCEPT;
use tracing::{debug, instrument, warn};

use npmesh_core::error::{NpmeshError, Result};
use npmesh_core::types::RegistryDescriptor;

use crate::cache::{load_peer_cache, save_peer_cache, DescriptorCache};
use crate::config::DirectoryConfig;

/// How a walk chooses its starting point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectoryMode {
    /// Fresh disk cache if available, otherwise crawl from the bootstrap list
    Default,
    /// Ignore the disk cache and crawl from the bootstrap list
    ForceReload,
    /// Crawl from the given registries
    Explicit(Vec<String>),
}

/// Discovers and caches registries.
pub struct RegistryDirectory {
    config: DirectoryConfig,
    http: reqwest::Client,
    descriptors: DescriptorCache,
}

impl RegistryDirectory {
    /// Creates a directory with default configuration.
    pub fn new() -> Self {
        Self::with_config(DirectoryConfig::default())
    }

    /// Creates a directory with the given configuration.
    pub fn with_config(config: DirectoryConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            descriptors: DescriptorCache::new(config.descriptor_refresh),
            config,
            http,
        }
    }

    /// Creates a directory configured from the environment.
    pub fn from_env() -> Self {
        Self::with_config(DirectoryConfig::from_env())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// The shared HTTP client.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// The mode implied by the configuration: explicit if a list is set.
    pub fn default_mode(&self) -> DirectoryMode {
        match &self.config.registries {
            Some(list) => DirectoryMode::Explicit(list.clone()),
            None => DirectoryMode::Default,
        }
    }

    /// Returns the descriptor of `url`, from cache or network.
    pub async fn descriptor(&self, url: &str) -> Result<RegistryDescriptor> {
        if let Some(descriptor) = self.descriptors.get(url) {
            return Ok(descriptor);
        }
        self.refresh_descriptor(url).await
    }

    /// Fetches the descriptor of `url` from the network and caches it.
    #[instrument(skip(self))]
    pub async fn refresh_descriptor(&self, url: &str) -> Result<RegistryDescriptor> {
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NpmeshError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let descriptor: RegistryDescriptor =
            serde_json::from_slice(&body).map_err(|e| NpmeshError::InvalidDescriptor {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        descriptor.validate_for(url, &self.config.min_protocol_version)?;

        debug!(registry = url, version = ?descriptor.protocol_version, "Loaded descriptor");
        self.descriptors.insert(url, descriptor.clone());
        Ok(descriptor)
    }

    /// Loads the peer list of a registry (`GET <url>peers`, one URL per line).
    #[instrument(skip(self))]
    pub async fn peer_list(&self, url: &str) -> Result<Vec<String>> {
        let peers_url = RegistryDescriptor::new(url).peers_url();
        let response = self.http.get(&peers_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NpmeshError::HttpStatus {
                status: status.as_u16(),
                url: peers_url,
            });
        }

        let text = response.text().await?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Starts a walk over the candidate registries.
    pub async fn iter(&self, mode: DirectoryMode) -> RegistryIter<'_> {
        let mut iter = RegistryIter {
            directory: self,
            cached: None,
            to_contact: VecDeque::new(),
            to_get_peers: VecDeque::new(),
            contacted: HashSet::new(),
            peers_got: HashSet::new(),
            found: Vec::new(),
            finished: false,
        };

        match mode {
            DirectoryMode::Default => {
                if let Some(path) = &self.config.cache_file {
                    iter.cached = load_peer_cache(path, self.config.cache_max_age)
                        .await
                        .map(VecDeque::from);
                }
                if iter.cached.is_none() {
                    iter.to_contact.extend(self.config.bootstrap.iter().cloned());
                }
            }
            DirectoryMode::ForceReload => {
                iter.to_contact.extend(self.config.bootstrap.iter().cloned());
            }
            DirectoryMode::Explicit(list) => iter.to_contact.extend(list),
        }

        iter
    }

    /// Walks all candidates and returns them in discovery order.
    pub async fn collect(&self, mode: DirectoryMode) -> Vec<RegistryDescriptor> {
        let mut iter = self.iter(mode).await;
        let mut all = Vec::new();
        while let Some(descriptor) = iter.next_registry().await {
            all.push(descriptor);
        }
        all
    }

    /// Clears the in-process descriptor cache.
    pub fn clear_descriptor_cache(&self) {
        self.descriptors.clear();
    }
}

impl Default for RegistryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// A lazy, finite walk over registries.
pub struct RegistryIter<'a> {
    directory: &'a RegistryDirectory,
    cached: Option<VecDeque<RegistryDescriptor>>,
    to_contact: VecDeque<String>,
    to_get_peers: VecDeque<String>,
    contacted: HashSet<String>,
    peers_got: HashSet<String>,
    found: Vec<RegistryDescriptor>,
    finished: bool,
}

impl RegistryIter<'_> {
    /// Returns true if this walk is served from the disk cache.
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Yields the next valid registry, or `None` once the walk is exhausted.
    ///
    /// Registries whose descriptor cannot be loaded are skipped silently.
    pub async fn next_registry(&mut self) -> Option<RegistryDescriptor> {
        if let Some(cached) = &mut self.cached {
            return cached.pop_front();
        }

        loop {
            if let Some(url) = self.to_contact.pop_front() {
                if !self.contacted.insert(url.clone()) || self.directory.config.is_blocked(&url) {
                    continue;
                }
                match self.directory.descriptor(&url).await {
                    Ok(descriptor) => {
                        self.to_get_peers.push_back(url);
                        self.found.push(descriptor.clone());
                        return Some(descriptor);
                    }
                    Err(e) => {
                        debug!(registry = %url, error = %e, "Skipping registry");
                        continue;
                    }
                }
            }

            let Some(url) = self.to_get_peers.pop_front() else {
                break;
            };
            if !self.peers_got.insert(url.clone()) {
                continue;
            }
            match self.directory.peer_list(&url).await {
                Ok(peers) => {
                    for peer in peers {
                        if self.directory.config.is_blocked(&peer) {
                            continue;
                        }
                        if !self.contacted.contains(&peer) {
                            self.to_contact.push_back(peer);
                        }
                    }
                }
                Err(e) => debug!(registry = %url, error = %e, "Could not load peers"),
            }
        }

        self.finish().await;
        None
    }

    async fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(path) = &self.directory.config.cache_file {
            if let Err(e) = save_peer_cache(path, &self.found).await {
                warn!(path = ?path, error = %e, "Failed to save peer cache");
            }
        }
    }
}
