//! Collaborator interfaces.
//!
//! These traits are the seams between the retrieval/publication engine and
//! everything it does not implement itself: RDF serialization, local storage,
//! output sinks and progress reporting.

use crate::codec::RdfFormat;
use crate::error::{NpmeshError, Result};
use crate::types::{ContentAddress, Nanopub, Quad};

// ═══════════════════════════════════════════════════════════════════════════════
// CODEC TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializes, parses and verifies nanopubs in one RDF format.
pub trait NanopubCodec: Send + Sync {
    /// The format handled by this codec.
    fn format(&self) -> RdfFormat;

    /// Parses a body into statements.
    fn decode(&self, body: &[u8]) -> Result<Vec<Quad>>;

    /// Serializes statements.
    fn encode(&self, quads: &[Quad]) -> Result<Vec<u8>>;

    /// Checks that a decoded nanopub matches its own content address.
    fn verify(&self, nanopub: &Nanopub) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOCAL STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// A trusted local source of nanopubs, consulted before any registry.
///
/// Lookups are synchronous; a store that needs I/O should keep it cheap.
pub trait LocalStore: Send + Sync {
    /// Returns the nanopub with this address, if held locally.
    fn get(&self, address: &ContentAddress) -> Result<Option<Nanopub>>;

    /// Stores a nanopub.
    fn put(&self, nanopub: &Nanopub) -> Result<()>;

    /// Returns true if the address is held locally.
    fn contains(&self, address: &ContentAddress) -> bool {
        matches!(self.get(address), Ok(Some(_)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINK TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Destination for resolved nanopubs.
///
/// A write error aborts the fetch run that produced it.
pub trait NanopubSink: Send {
    /// Writes one nanopub.
    fn write(&mut self, nanopub: &Nanopub) -> Result<()>;
}

impl NanopubSink for Vec<Nanopub> {
    fn write(&mut self, nanopub: &Nanopub) -> Result<()> {
        self.push(nanopub.clone());
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LISTENER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Observer of a fetch run.
pub trait FetchListener: Send + Sync {
    /// Called with the running write count every progress interval.
    fn on_progress(&self, _written: u64) {}

    /// Called for every failed attempt and every abandoned task.
    ///
    /// `registry` is `None` when the failure is not tied to a single registry
    /// (for example, when all registries have been exhausted).
    fn on_exception(&self, _error: &NpmeshError, _registry: Option<&str>, _address: &ContentAddress) {}
}

/// Listener that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl FetchListener for NoopListener {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NquadsCodec;
    use crate::constants::{NANOPUBLICATION, RDF_TYPE};

    #[test]
    fn test_vec_sink() {
        let uri = "https://w3id.org/np/RAdG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M";
        let np = Nanopub::from_quads(
            &NquadsCodec,
            vec![Quad::new(uri, RDF_TYPE, NANOPUBLICATION, "g")],
        )
        .unwrap();

        let mut sink: Vec<Nanopub> = Vec::new();
        sink.write(&np).unwrap();
        assert_eq!(sink.len(), 1);
    }
}
