//! Decoded nanopubs.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::constants::{NANOPUBLICATION, PROTECTED_NANOPUB, RDF_TYPE};
use crate::error::{NpmeshError, Result};
use crate::traits::NanopubCodec;
use crate::types::{ContentAddress, IndexNode};

/// One RDF statement with its graph.
///
/// Terms are kept in the textual form the codec produced. IRIs are stored
/// without angle brackets; literals and blank nodes keep their lexical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    /// Subject term
    pub subject: String,
    /// Predicate IRI
    pub predicate: String,
    /// Object term
    pub object: String,
    /// Graph IRI
    pub graph: String,
}

impl Quad {
    /// Creates a quad.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        graph: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            graph: graph.into(),
        }
    }
}

/// A decoded nanopub.
#[derive(Clone, Debug)]
pub struct Nanopub {
    uri: String,
    address: ContentAddress,
    quads: Vec<Quad>,
    body: Bytes,
    index: Option<IndexNode>,
    protected: bool,
}

impl Nanopub {
    /// Decodes a body received from a registry or read from disk.
    pub fn decode(codec: &dyn NanopubCodec, body: Bytes) -> Result<Self> {
        let quads = codec.decode(&body)?;
        Self::from_parts(quads, body)
    }

    /// Builds a nanopub from statements, serializing them with `codec`.
    pub fn from_quads(codec: &dyn NanopubCodec, quads: Vec<Quad>) -> Result<Self> {
        let body = Bytes::from(codec.encode(&quads)?);
        Self::from_parts(quads, body)
    }

    fn from_parts(quads: Vec<Quad>, body: Bytes) -> Result<Self> {
        let uri = quads
            .iter()
            .find(|q| q.predicate == RDF_TYPE && q.object == NANOPUBLICATION)
            .map(|q| q.subject.clone())
            .ok_or_else(|| NpmeshError::MalformedNanopub("no nanopublication head".into()))?;

        let address = ContentAddress::parse(&uri)
            .map_err(|_| NpmeshError::MalformedNanopub(format!("no content address in {}", uri)))?;

        let index = IndexNode::extract(&uri, &quads);
        let protected = quads
            .iter()
            .any(|q| q.subject == uri && q.predicate == RDF_TYPE && q.object == PROTECTED_NANOPUB);

        Ok(Self {
            uri,
            address,
            quads,
            body,
            index,
            protected,
        })
    }

    /// The nanopub URI (subject of the head).
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The content address embedded in the URI.
    pub fn address(&self) -> &ContentAddress {
        &self.address
    }

    /// All statements.
    pub fn quads(&self) -> &[Quad] {
        &self.quads
    }

    /// The raw body as received or encoded.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Index view, if the nanopub is an index.
    pub fn index(&self) -> Option<&IndexNode> {
        self.index.as_ref()
    }

    /// Returns true if the nanopub is an index.
    pub fn is_index(&self) -> bool {
        self.index.is_some()
    }

    /// Returns true if the nanopub is typed as protected and must not be published.
    pub fn is_protected(&self) -> bool {
        self.protected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NquadsCodec;
    use crate::constants::{INCLUDES_ELEMENT, NANOPUB_INDEX};

    const URI: &str = "https://w3id.org/np/RAdG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M";

    fn head(uri: &str) -> Quad {
        Quad::new(uri, RDF_TYPE, NANOPUBLICATION, format!("{}#Head", uri))
    }

    #[test]
    fn test_from_quads() {
        let np = Nanopub::from_quads(&NquadsCodec, vec![head(URI)]).unwrap();
        assert_eq!(np.uri(), URI);
        assert_eq!(np.address().artifact_code(), &URI[20..]);
        assert!(!np.is_index());
        assert!(!np.is_protected());
        assert!(!np.body().is_empty());
    }

    #[test]
    fn test_missing_head() {
        let quads = vec![Quad::new(URI, RDF_TYPE, "http://example.org/Other", "g")];
        assert!(matches!(
            Nanopub::from_quads(&NquadsCodec, quads),
            Err(NpmeshError::MalformedNanopub(_))
        ));
    }

    #[test]
    fn test_index_and_protected_flags() {
        let element = "https://w3id.org/np/RAelement0000000000000000000000000000000000000";
        let graph = format!("{}#pubinfo", URI);
        let quads = vec![
            head(URI),
            Quad::new(URI, RDF_TYPE, NANOPUB_INDEX, graph.as_str()),
            Quad::new(URI, RDF_TYPE, PROTECTED_NANOPUB, graph.as_str()),
            Quad::new(URI, INCLUDES_ELEMENT, element, format!("{}#assertion", URI)),
        ];
        let np = Nanopub::from_quads(&NquadsCodec, quads).unwrap();
        assert!(np.is_protected());
        assert_eq!(np.index().map(|i| i.elements.len()), Some(1));
    }

    #[test]
    fn test_decode_roundtrip_body() {
        let np = Nanopub::from_quads(&NquadsCodec, vec![head(URI)]).unwrap();
        let decoded = Nanopub::decode(&NquadsCodec, np.body().clone()).unwrap();
        assert_eq!(decoded.quads(), np.quads());
    }
}
