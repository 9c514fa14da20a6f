//! Error types for npmesh.
//!
//! One error hierarchy shared by every crate of the workspace, built with
//! `thiserror`. The classification helpers are what the fetch engine and the
//! publisher use to decide between retrying elsewhere and giving up.

use thiserror::Error;

/// Result type alias using `NpmeshError`.
pub type Result<T> = std::result::Result<T, NpmeshError>;

/// Main error type for all npmesh operations.
#[derive(Debug, Error)]
pub enum NpmeshError {
    // ═══════════════════════════════════════════════════════════════════════════
    // ADDRESS ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The input does not contain a usable artifact code.
    #[error("Invalid content address: {0}")]
    InvalidAddress(String),

    /// The artifact code is not of the RDF module type registries serve.
    #[error("Not a trusty URI of type RA: {0}")]
    UnsupportedModule(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // REGISTRY ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A registry descriptor could not be used.
    #[error("Invalid registry descriptor from '{url}': {reason}")]
    InvalidDescriptor { url: String, reason: String },

    /// The registry answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Every known registry was tried for an address without success.
    #[error("Failed to get {address}: all {tried} registries tried")]
    RegistriesExhausted { address: String, tried: usize },

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTENT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The document could not be decoded.
    #[error("Malformed nanopub: {0}")]
    MalformedNanopub(String),

    /// Downloaded content does not verify under the requested address.
    #[error("Content does not verify under {0}")]
    VerificationFailed(String),

    /// A task expecting an index resolved to a plain nanopub.
    #[error("Not an index: {0}")]
    NotAnIndex(String),

    /// No codec is registered under the given name.
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // PUBLICATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Protected nanopubs must never be published.
    #[error("Can't publish protected nanopublication: {0}")]
    ProtectedNanopub(String),

    /// No candidate registry accepted the nanopub.
    #[error("Failed to publish {address}: no registry accepted it ({attempts} POST attempts)")]
    PublishFailed { address: String, attempts: usize },

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Protocol version below the required minimum.
    #[error("Protocol version {actual} is older than required {required}")]
    VersionMismatch { required: String, actual: String },

    // ═══════════════════════════════════════════════════════════════════════════
    // NETWORK ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Request or connect timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// No connection slot became available in time; the registry itself was not tried.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Writing a resolved nanopub to the caller's sink failed.
    #[error("Sink error: {0}")]
    SinkError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<reqwest::Error> for NpmeshError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NpmeshError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            NpmeshError::HttpStatus {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            NpmeshError::HttpError(err.to_string())
        }
    }
}

impl NpmeshError {
    /// Returns true if this error is transient (another attempt may succeed).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NpmeshError::HttpError(_)
                | NpmeshError::HttpStatus { .. }
                | NpmeshError::Timeout(_)
                | NpmeshError::PoolExhausted
                | NpmeshError::MalformedNanopub(_)
                | NpmeshError::JsonError(_)
        )
    }

    /// Returns true if a failed attempt with this error marks the registry as tried.
    ///
    /// Pool exhaustion happens before the registry is contacted, so the same
    /// registry stays eligible.
    pub fn counts_as_attempt(&self) -> bool {
        !matches!(self, NpmeshError::PoolExhausted)
    }

    /// Returns true if this is a policy rejection raised before any network call.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            NpmeshError::ProtectedNanopub(_) | NpmeshError::UnsupportedModule(_)
        )
    }

    /// Returns true if the error is fatal to a single fetch task.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            NpmeshError::VerificationFailed(_) | NpmeshError::NotAnIndex(_)
        )
    }
}
