//! Protocol constants for npmesh.
//!
//! Limits and intervals follow the behavior the registry federation has
//! settled on; the vocabulary IRIs are those of the nanopublication schema.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY PROTOCOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum registry protocol version accepted by this client.
///
/// Versions have the form MAJOR.MINOR, so `0.12` is newer than `0.9`.
pub const REQUIRED_PROTOCOL_VERSION: &str = "0.2";

/// Module identifier of RDF-graph trusty URIs (the only kind registries serve).
pub const RDF_MODULE_ID: &str = "RA";

/// Minimum length of an artifact code (module id plus hash segment).
pub const MIN_ARTIFACT_CODE_LEN: usize = 25;

/// Path segment under which registries expose their stored nanopubs.
pub const COLLECTION_PATH: &str = "np/";

/// Path segment under which registries list their known peers.
pub const PEERS_PATH: &str = "peers";

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTORY CACHING
// ═══════════════════════════════════════════════════════════════════════════════

/// The in-process descriptor cache is wiped wholesale after this interval.
pub const DESCRIPTOR_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// The on-disk peer cache is ignored once it is older than this.
pub const PEER_CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Peer lists shorter than this are never persisted (likely a partial crawl).
pub const MIN_PERSISTED_PEERS: usize = 5;

/// Hardcoded registries used when no fresh peer cache is available.
pub const BOOTSTRAP_REGISTRIES: &[&str] = &[
    "https://registry.knowledgepixels.com/",
    "https://registry.np.trustyuri.net/",
    "https://registry.petapico.org/",
    "http://server.nanopubs.lod.labs.vu.nl/",
    "https://server.nanopubs.knows.idlab.ugent.be/",
    "http://server.np.scify.org/",
];

/// Peers that are known to be permanently gone; never queued by a crawl.
pub const BLOCKED_REGISTRIES: &[&str] = &[
    "http://s1.semanticscience.org:8082/",
    "http://nanopub-server.ops.labs.vu.nl/",
    "http://ristretto.med.yale.edu:8080/nanopub-server/",
    "http://nanopubs.semanticscience.org:8082/",
    "http://rdf.disgenet.org/nanopub-server",
    "http://digitalduchemin.org/np/",
    "http://nanopub.exynize.com/",
    "http://digitalduchemin.org/np-mirror/",
];

// ═══════════════════════════════════════════════════════════════════════════════
// FETCH ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Concurrent requests allowed against a single registry.
pub const MAX_PARALLEL_REQUESTS_PER_REGISTRY: usize = 5;

/// Index expansion pauses while this many tasks are outstanding.
pub const OUTSTANDING_TASK_SOFT_CAP: usize = 3000;

/// Number of hedged requests launched for sub-indexes and appended indexes.
pub const INDEX_RACE_WIDTH: usize = 3;

/// Progress callback interval, in written nanopubs.
pub const PROGRESS_INTERVAL: u64 = 100;

/// Coordinator wait between work-list scans.
pub const SCAN_INTERVAL: Duration = Duration::from_millis(5);

/// Connect timeout for content requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Whole-request timeout for content requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Global budget of simultaneous HTTP connections.
pub const MAX_CONNECTIONS: usize = 1000;

/// How long an attempt waits for a connection slot before failing.
pub const POOL_WAIT: Duration = Duration::from_millis(100);

// ═══════════════════════════════════════════════════════════════════════════════
// VOCABULARY
// ═══════════════════════════════════════════════════════════════════════════════

/// `rdf:type`
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// `np:Nanopublication`
pub const NANOPUBLICATION: &str = "http://www.nanopub.org/nschema#Nanopublication";

/// `npx:NanopubIndex`
pub const NANOPUB_INDEX: &str = "http://purl.org/nanopub/x/NanopubIndex";

/// `npx:IncompleteIndex`
pub const INCOMPLETE_INDEX: &str = "http://purl.org/nanopub/x/IncompleteIndex";

/// `npx:includesElement`
pub const INCLUDES_ELEMENT: &str = "http://purl.org/nanopub/x/includesElement";

/// `npx:includesSubindex`
pub const INCLUDES_SUBINDEX: &str = "http://purl.org/nanopub/x/includesSubindex";

/// `npx:appendsIndex`
pub const APPENDS_INDEX: &str = "http://purl.org/nanopub/x/appendsIndex";

/// `npx:ProtectedNanopub`
pub const PROTECTED_NANOPUB: &str = "http://purl.org/nanopub/x/ProtectedNanopub";
