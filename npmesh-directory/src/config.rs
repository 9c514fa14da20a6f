//! Directory configuration.

use std::path::PathBuf;
use std::time::Duration;

use npmesh_core::constants::{
    BLOCKED_REGISTRIES, BOOTSTRAP_REGISTRIES, DESCRIPTOR_REFRESH_INTERVAL, PEER_CACHE_MAX_AGE,
    REQUIRED_PROTOCOL_VERSION,
};

/// Environment variable holding an explicit registry list.
pub const ENV_REGISTRIES: &str = "NPMESH_REGISTRIES";

/// Environment variable overriding the peer cache file.
pub const ENV_CACHE_FILE: &str = "NPMESH_CACHE_FILE";

/// Default location of the peer cache, under the user's home directory.
pub fn default_cache_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".nanopub")
            .join("cachedservers.json")
    })
}

/// Registry directory configuration.
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    /// Registries contacted when no fresh peer cache is available
    pub bootstrap: Vec<String>,
    /// Peers never queued by a crawl
    pub blocklist: Vec<String>,
    /// Explicit registry list; replaces bootstrap and cache when set
    pub registries: Option<Vec<String>>,
    /// Peer cache file (`None` disables the disk cache)
    pub cache_file: Option<PathBuf>,
    /// Maximum age of a usable peer cache
    pub cache_max_age: Duration,
    /// Interval after which the descriptor cache is wiped
    pub descriptor_refresh: Duration,
    /// Oldest acceptable registry protocol version
    pub min_protocol_version: String,
    /// Connect timeout for descriptor and peer requests
    pub connect_timeout: Duration,
    /// Whole-request timeout for descriptor and peer requests
    pub timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            bootstrap: BOOTSTRAP_REGISTRIES.iter().map(|s| s.to_string()).collect(),
            blocklist: BLOCKED_REGISTRIES.iter().map(|s| s.to_string()).collect(),
            registries: None,
            cache_file: default_cache_file(),
            cache_max_age: PEER_CACHE_MAX_AGE,
            descriptor_refresh: DESCRIPTOR_REFRESH_INTERVAL,
            min_protocol_version: REQUIRED_PROTOCOL_VERSION.into(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Splits a space- or comma-separated registry list.
pub fn parse_registry_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl DirectoryConfig {
    /// Builds a config from the environment, after loading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(list) = std::env::var(ENV_REGISTRIES) {
            let registries = parse_registry_list(&list);
            if !registries.is_empty() {
                config.registries = Some(registries);
            }
        }
        if let Ok(path) = std::env::var(ENV_CACHE_FILE) {
            config.cache_file = Some(PathBuf::from(path));
        }
        config
    }

    /// Uses an explicit registry list.
    pub fn with_registries(mut self, registries: Vec<String>) -> Self {
        self.registries = Some(registries);
        self
    }

    /// Replaces the bootstrap list.
    pub fn with_bootstrap(mut self, bootstrap: Vec<String>) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Replaces the blocklist.
    pub fn with_blocklist(mut self, blocklist: Vec<String>) -> Self {
        self.blocklist = blocklist;
        self
    }

    /// Sets the peer cache file.
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    /// Disables the disk cache.
    pub fn no_cache_file(mut self) -> Self {
        self.cache_file = None;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if `url` is blocklisted.
    pub fn is_blocked(&self, url: &str) -> bool {
        self.blocklist.iter().any(|b| b == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DirectoryConfig::default();
        assert_eq!(config.bootstrap.len(), BOOTSTRAP_REGISTRIES.len());
        assert!(config.is_blocked("http://nanopub.exynize.com/"));
        assert!(config.registries.is_none());
        assert_eq!(config.min_protocol_version, "0.2");
    }

    #[test]
    fn test_parse_registry_list() {
        assert_eq!(
            parse_registry_list("https://a.org/, https://b.org/\nhttps://c.org/"),
            vec!["https://a.org/", "https://b.org/", "https://c.org/"]
        );
        assert!(parse_registry_list("  ,, ").is_empty());
    }

    #[test]
    fn test_builders() {
        let config = DirectoryConfig::default()
            .with_registries(vec!["https://a.org/".into()])
            .with_blocklist(vec![])
            .no_cache_file();
        assert!(config.cache_file.is_none());
        assert!(!config.is_blocked("http://nanopub.exynize.com/"));
        assert_eq!(config.registries.as_deref().map(|r| r.len()), Some(1));
    }
}
