//! The content fetcher.
//!
//! A fetch run is driven by a single coordinator that owns the work list.
//! Every attempt runs as its own tokio task holding a permit of the target
//! registry's semaphore, and reports back over a channel. The coordinator
//! wakes on each report or after the scan interval, whichever comes first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use reqwest::header::ACCEPT;
use serde::Serialize;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument, warn};

use npmesh_core::constants::COLLECTION_PATH;
use npmesh_core::error::{NpmeshError, Result};
use npmesh_core::traits::{FetchListener, LocalStore, NanopubCodec, NanopubSink};
use npmesh_core::types::{ContentAddress, Nanopub};
use npmesh_directory::RegistryDirectory;

use crate::config::FetchConfig;
use crate::race::RaceGroup;

/// Summary of a fetch run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FetchReport {
    /// Nanopubs written to the sink
    pub written: u64,
    /// Addresses that could not be resolved
    pub failed: Vec<ContentAddress>,
    /// Successful attempts per registry
    pub usage: HashMap<String, u64>,
    /// Registries known to the run
    pub registries: usize,
}

/// Resolves nanopubs and index trees across the registry federation.
pub struct ContentFetcher {
    pub(crate) directory: Arc<RegistryDirectory>,
    pub(crate) codec: Arc<dyn NanopubCodec>,
    pub(crate) store: Option<Arc<dyn LocalStore>>,
    pub(crate) config: FetchConfig,
    pub(crate) http: reqwest::Client,
    pub(crate) connections: Arc<Semaphore>,
    slots: DashMap<String, Arc<Semaphore>>,
    pub(crate) usage: DashMap<String, u64>,
}

impl ContentFetcher {
    /// Creates a fetcher with default configuration.
    pub fn new(directory: Arc<RegistryDirectory>, codec: Arc<dyn NanopubCodec>) -> Self {
        Self::with_config(directory, codec, FetchConfig::default())
    }

    /// Creates a fetcher with the given configuration.
    pub fn with_config(
        directory: Arc<RegistryDirectory>,
        codec: Arc<dyn NanopubCodec>,
        config: FetchConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            directory,
            codec,
            store: None,
            connections: Arc::new(Semaphore::new(config.max_connections)),
            config,
            http,
            slots: DashMap::new(),
            usage: DashMap::new(),
        }
    }

    /// Consults `store` before any registry.
    pub fn with_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Successful attempts per registry, over the fetcher's lifetime.
    pub fn usage(&self) -> HashMap<String, u64> {
        self.usage
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// The concurrency slot of a registry.
    pub(crate) fn slot(&self, registry: &str) -> Arc<Semaphore> {
        self.slots
            .entry(registry.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_per_registry)))
            .clone()
    }

    pub(crate) fn record_usage(&self, registry: &str) {
        *self.usage.entry(registry.to_string()).or_insert(0) += 1;
    }

    /// Consults the local store, treating store errors as misses.
    pub(crate) fn lookup_local(&self, address: &ContentAddress) -> Option<Nanopub> {
        let store = self.store.as_ref()?;
        match store.get(address) {
            Ok(found) => found,
            Err(e) => {
                warn!(address = %address, error = %e, "Local store lookup failed");
                None
            }
        }
    }

    async fn known_registries(&self) -> Vec<String> {
        let mut registries: Vec<String> = self
            .directory
            .collect(self.directory.default_mode())
            .await
            .into_iter()
            .map(|d| d.public_url)
            .collect();
        if let Some(local) = &self.config.local_registry {
            if !registries.contains(local) {
                registries.push(local.clone());
            }
        }
        registries
    }

    /// Fetches `root` and, if it is an index, its whole tree into `sink`.
    ///
    /// Unresolvable addresses are reported through `listener` and listed in
    /// the report; only a sink failure aborts the run.
    #[instrument(skip(self, root, sink, listener), fields(root = %root))]
    pub async fn fetch(
        &self,
        root: &ContentAddress,
        is_index: bool,
        sink: &mut dyn NanopubSink,
        listener: &dyn FetchListener,
    ) -> Result<FetchReport> {
        let registries = self.known_registries().await;
        info!(registries = registries.len(), is_index, "Starting fetch");

        let started = Instant::now();
        let mut run = FetchRun::new(self, registries, sink, listener);
        run.push_back(FetchTask::new(root.clone(), is_index, None));
        let report = run.run().await?;

        info!(
            written = report.written,
            failed = report.failed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetch finished"
        );
        Ok(report)
    }
}

/// One attempt against one registry: GET, decode, verify.
pub(crate) async fn fetch_attempt(
    http: &reqwest::Client,
    codec: &dyn NanopubCodec,
    connections: &Semaphore,
    pool_wait: std::time::Duration,
    registry: &str,
    address: &ContentAddress,
) -> Result<Nanopub> {
    let _connection = match tokio::time::timeout(pool_wait, connections.acquire()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(_)) => return Err(NpmeshError::InternalError("connection budget closed".into())),
        Err(_) => return Err(NpmeshError::PoolExhausted),
    };

    let url = address.collection_url(&format!("{}{}", registry, COLLECTION_PATH));
    let response = http
        .get(&url)
        .header(ACCEPT, codec.format().media_type())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(NpmeshError::HttpStatus {
            status: status.as_u16(),
            url,
        });
    }

    let body = response.bytes().await?;
    let nanopub = Nanopub::decode(codec, body)?;
    if nanopub.address() != address || !codec.verify(&nanopub) {
        return Err(NpmeshError::VerificationFailed(address.to_string()));
    }
    Ok(nanopub)
}

// ═══════════════════════════════════════════════════════════════════════════════
// FETCH RUN
// ═══════════════════════════════════════════════════════════════════════════════

struct FetchTask {
    address: ContentAddress,
    is_index: bool,
    group: Option<Arc<RaceGroup>>,
    tried: HashSet<String>,
    running: bool,
    store_checked: bool,
    result: Option<Nanopub>,
}

impl FetchTask {
    fn new(address: ContentAddress, is_index: bool, group: Option<Arc<RaceGroup>>) -> Self {
        Self {
            address,
            is_index,
            group,
            tried: HashSet::new(),
            running: false,
            store_checked: false,
            result: None,
        }
    }
}

enum AttemptResult {
    Resolved(Nanopub),
    Lost,
    Failed(NpmeshError),
}

struct AttemptOutcome {
    task_id: u64,
    registry: String,
    result: AttemptResult,
}

/// What a scan decided for one task.
enum Step {
    Keep,
    Drop,
}

struct FetchRun<'a> {
    fetcher: &'a ContentFetcher,
    sink: &'a mut dyn NanopubSink,
    listener: &'a dyn FetchListener,
    registries: Vec<String>,
    tasks: HashMap<u64, FetchTask>,
    queue: VecDeque<u64>,
    front: Vec<u64>,
    back: Vec<u64>,
    next_id: u64,
    in_flight: usize,
    report: FetchReport,
    tx: mpsc::UnboundedSender<AttemptOutcome>,
    rx: mpsc::UnboundedReceiver<AttemptOutcome>,
}

impl<'a> FetchRun<'a> {
    fn new(
        fetcher: &'a ContentFetcher,
        registries: Vec<String>,
        sink: &'a mut dyn NanopubSink,
        listener: &'a dyn FetchListener,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let report = FetchReport {
            registries: registries.len(),
            ..Default::default()
        };
        Self {
            fetcher,
            sink,
            listener,
            registries,
            tasks: HashMap::new(),
            queue: VecDeque::new(),
            front: Vec::new(),
            back: Vec::new(),
            next_id: 0,
            in_flight: 0,
            report,
            tx,
            rx,
        }
    }

    fn insert(&mut self, task: FetchTask) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(id, task);
        id
    }

    fn push_back(&mut self, task: FetchTask) {
        let id = self.insert(task);
        self.queue.push_back(id);
    }

    async fn run(mut self) -> Result<FetchReport> {
        while !self.queue.is_empty() {
            self.scan()?;
            if self.queue.is_empty() {
                break;
            }

            if let Ok(Some(outcome)) =
                tokio::time::timeout(self.fetcher.config.scan_interval, self.rx.recv()).await
            {
                self.handle_outcome(outcome);
            }
            while let Ok(outcome) = self.rx.try_recv() {
                self.handle_outcome(outcome);
            }
        }

        if self.in_flight > 0 {
            debug!(in_flight = self.in_flight, "Leaving cancelled attempts to finish");
        }
        Ok(self.report)
    }

    fn handle_outcome(&mut self, outcome: AttemptOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Some(task) = self.tasks.get_mut(&outcome.task_id) else {
            return;
        };
        task.running = false;

        match outcome.result {
            AttemptResult::Resolved(nanopub) => {
                debug!(registry = %outcome.registry, address = %task.address, "Resolved");
                *self.report.usage.entry(outcome.registry.clone()).or_insert(0) += 1;
                self.fetcher.record_usage(&outcome.registry);
                task.result = Some(nanopub);
            }
            AttemptResult::Lost => {
                debug!(address = %task.address, "Sibling already resolved");
            }
            AttemptResult::Failed(e) => {
                if e.is_structural() {
                    warn!(registry = %outcome.registry, address = %task.address, error = %e, "Registry served bad content");
                } else {
                    debug!(registry = %outcome.registry, address = %task.address, error = %e, "Attempt failed");
                }
                self.listener
                    .on_exception(&e, Some(&outcome.registry), &task.address);
                if e.counts_as_attempt() {
                    task.tried.insert(outcome.registry);
                }
            }
        }
    }

    /// One pass over the work list.
    fn scan(&mut self) -> Result<()> {
        let mut kept = VecDeque::with_capacity(self.queue.len());
        while let Some(id) = self.queue.pop_front() {
            match self.step(id)? {
                Step::Keep => kept.push_back(id),
                Step::Drop => {
                    self.tasks.remove(&id);
                }
            }
        }

        // Sub-index and appended-index races go to the front, elements to the back.
        let mut queue: VecDeque<u64> = self.front.drain(..).rev().collect();
        queue.extend(kept);
        queue.extend(self.back.drain(..));
        self.queue = queue;
        Ok(())
    }

    fn step(&mut self, id: u64) -> Result<Step> {
        let Some(task) = self.tasks.get_mut(&id) else {
            return Ok(Step::Drop);
        };

        if let Some(group) = &task.group {
            if group.is_lost_for(id) {
                return Ok(Step::Drop);
            }
        }
        if task.running {
            return Ok(Step::Keep);
        }

        if task.result.is_none() && !task.store_checked {
            task.store_checked = true;
            if let Some(nanopub) = self.fetcher.lookup_local(&task.address) {
                let won = task.group.as_ref().map_or(true, |g| g.claim(id));
                if !won {
                    return Ok(Step::Drop);
                }
                debug!(address = %task.address, "Served from local store");
                task.result = Some(nanopub);
            }
        }

        if task.result.is_some() {
            return self.process_result(id);
        }

        if self.registries.iter().all(|r| task.tried.contains(r)) {
            let address = task.address.clone();
            let tried = task.tried.len();
            let group = task.group.clone();

            // A race only fails with its last member.
            if let Some(group) = group {
                let siblings_left = self.tasks.iter().any(|(other, t)| {
                    *other != id && t.group.as_ref().is_some_and(|g| Arc::ptr_eq(g, &group))
                });
                if siblings_left {
                    return Ok(Step::Drop);
                }
            }

            let err = NpmeshError::RegistriesExhausted {
                address: address.to_string(),
                tried,
            };
            warn!(address = %address, tried, "Giving up");
            self.listener.on_exception(&err, None, &address);
            self.report.failed.push(address);
            return Ok(Step::Drop);
        }

        let Some((registry, permit)) = self.pick_registry(id) else {
            return Ok(Step::Keep);
        };
        self.assign(id, registry, permit);
        Ok(Step::Keep)
    }

    fn process_result(&mut self, id: u64) -> Result<Step> {
        let outstanding = self.tasks.len();
        let Some(task) = self.tasks.get_mut(&id) else {
            return Ok(Step::Drop);
        };

        if !task.is_index {
            if let Some(nanopub) = task.result.take() {
                self.write(&nanopub)?;
            }
            return Ok(Step::Drop);
        }

        if outstanding >= self.fetcher.config.task_soft_cap {
            return Ok(Step::Keep);
        }
        let Some(nanopub) = task.result.take() else {
            return Ok(Step::Drop);
        };

        let Some(index) = nanopub.index().cloned() else {
            let err = NpmeshError::NotAnIndex(nanopub.uri().to_string());
            warn!(address = %nanopub.address(), "Expected an index");
            self.listener.on_exception(&err, None, nanopub.address());
            self.report.failed.push(nanopub.address().clone());
            return Ok(Step::Drop);
        };

        let references = index.reference_count();
        if self.fetcher.config.write_index {
            self.write(&nanopub)?;
        }
        if self.fetcher.config.write_content {
            for element in index.elements {
                let id = self.insert(FetchTask::new(element, false, None));
                self.back.push(id);
            }
        }
        for child in index.sub_indexes.into_iter().chain(index.appended_index) {
            self.race(child);
        }
        debug!(
            address = %nanopub.address(),
            references,
            outstanding = self.tasks.len(),
            "Expanded index"
        );
        Ok(Step::Drop)
    }

    fn race(&mut self, address: ContentAddress) {
        let group = RaceGroup::new();
        for _ in 0..self.fetcher.config.race_width.max(1) {
            let task = FetchTask::new(address.clone(), true, Some(Arc::clone(&group)));
            let id = self.insert(task);
            self.front.push(id);
        }
    }

    fn write(&mut self, nanopub: &Nanopub) -> Result<()> {
        self.sink.write(nanopub).map_err(|e| match e {
            NpmeshError::SinkError(_) => e,
            other => NpmeshError::SinkError(other.to_string()),
        })?;
        self.report.written += 1;
        if self.report.written % self.fetcher.config.progress_interval.max(1) == 0 {
            self.listener.on_progress(self.report.written);
        }
        Ok(())
    }

    fn pick_registry(&self, id: u64) -> Option<(String, OwnedSemaphorePermit)> {
        let task = self.tasks.get(&id)?;

        if let Some(local) = &self.fetcher.config.local_registry {
            if !task.tried.contains(local) {
                if let Ok(permit) = self.fetcher.slot(local).try_acquire_owned() {
                    return Some((local.clone(), permit));
                }
            }
        }

        let mut shuffled: Vec<&String> = self.registries.iter().collect();
        shuffled.shuffle(&mut rand::thread_rng());
        shuffled
            .into_iter()
            .filter(|r| !task.tried.contains(*r))
            .find_map(|r| {
                self.fetcher
                    .slot(r)
                    .try_acquire_owned()
                    .ok()
                    .map(|permit| (r.clone(), permit))
            })
    }

    fn assign(&mut self, id: u64, registry: String, permit: OwnedSemaphorePermit) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        task.running = true;
        self.in_flight += 1;

        let http = self.fetcher.http.clone();
        let codec = Arc::clone(&self.fetcher.codec);
        let connections = Arc::clone(&self.fetcher.connections);
        let pool_wait = self.fetcher.config.pool_wait;
        let group = task.group.clone();
        let address = task.address.clone();
        let tx = self.tx.clone();

        debug!(registry = %registry, address = %address, "Assigning attempt");
        tokio::spawn(async move {
            let _permit = permit;
            let result = match fetch_attempt(
                &http,
                codec.as_ref(),
                &connections,
                pool_wait,
                &registry,
                &address,
            )
            .await
            {
                Ok(nanopub) => match &group {
                    Some(group) if !group.claim(id) => AttemptResult::Lost,
                    _ => AttemptResult::Resolved(nanopub),
                },
                Err(e) => AttemptResult::Failed(e),
            };
            let _ = tx.send(AttemptOutcome {
                task_id: id,
                registry,
                result,
            });
        });
    }
}
