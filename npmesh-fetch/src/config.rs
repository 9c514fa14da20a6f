//! Fetch engine configuration.

use std::time::Duration;

use npmesh_core::constants::{
    CONNECT_TIMEOUT, INDEX_RACE_WIDTH, MAX_CONNECTIONS, MAX_PARALLEL_REQUESTS_PER_REGISTRY,
    OUTSTANDING_TASK_SOFT_CAP, POOL_WAIT, PROGRESS_INTERVAL, REQUEST_TIMEOUT, SCAN_INTERVAL,
};

/// Fetch engine configuration.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    /// Concurrent attempts allowed against one registry
    pub max_per_registry: usize,
    /// Index expansion pauses while this many tasks are outstanding
    pub task_soft_cap: usize,
    /// Hedged attempts launched per sub-index and appended index
    pub race_width: usize,
    /// Coordinator wait between scans
    pub scan_interval: Duration,
    /// Progress callback interval, in writes
    pub progress_interval: u64,
    /// Connect timeout per attempt
    pub connect_timeout: Duration,
    /// Whole-request timeout per attempt
    pub request_timeout: Duration,
    /// Global budget of simultaneous connections
    pub max_connections: usize,
    /// How long an attempt waits for a connection slot
    pub pool_wait: Duration,
    /// Whether index nanopubs are written to the sink
    pub write_index: bool,
    /// Whether index elements are fetched and written
    pub write_content: bool,
    /// Registry tried first for every task, if set
    pub local_registry: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_per_registry: MAX_PARALLEL_REQUESTS_PER_REGISTRY,
            task_soft_cap: OUTSTANDING_TASK_SOFT_CAP,
            race_width: INDEX_RACE_WIDTH,
            scan_interval: SCAN_INTERVAL,
            progress_interval: PROGRESS_INTERVAL,
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            max_connections: MAX_CONNECTIONS,
            pool_wait: POOL_WAIT,
            write_index: true,
            write_content: true,
            local_registry: None,
        }
    }
}

impl FetchConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets which parts of an index tree are written.
    pub fn write(mut self, index: bool, content: bool) -> Self {
        self.write_index = index;
        self.write_content = content;
        self
    }

    /// Sets the preferred local registry.
    pub fn local_registry(mut self, url: impl Into<String>) -> Self {
        self.local_registry = Some(url.into());
        self
    }

    /// Sets the per-attempt request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the progress interval.
    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.max_per_registry, 5);
        assert_eq!(config.task_soft_cap, 3000);
        assert_eq!(config.race_width, 3);
        assert_eq!(config.progress_interval, 100);
        assert_eq!(config.pool_wait, Duration::from_millis(100));
        assert!(config.write_index && config.write_content);
    }

    #[test]
    fn test_builders() {
        let config = FetchConfig::new()
            .write(false, true)
            .local_registry("http://localhost:4800/")
            .progress_interval(0);
        assert!(!config.write_index);
        assert_eq!(config.local_registry.as_deref(), Some("http://localhost:4800/"));
        assert_eq!(config.progress_interval, 1);
    }
}
