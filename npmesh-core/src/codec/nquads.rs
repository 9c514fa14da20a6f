//! N-Quads codec.
//!
//! Parsing goes through `sophia_turtle`; writing is line-per-statement with
//! default-graph statements written back without a graph term.

use sophia_turtle::parser::nq;

use crate::codec::rdf::{collect_quads, as_text, write_nquads};
use crate::codec::RdfFormat;
use crate::error::Result;
use crate::traits::NanopubCodec;
use crate::types::{Nanopub, Quad};

/// N-Quads codec.
///
/// `verify` only checks address consistency. Trusty-URI hash verification is
/// plugged in by registering a different codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct NquadsCodec;

impl NanopubCodec for NquadsCodec {
    fn format(&self) -> RdfFormat {
        RdfFormat::NQuads
    }

    fn decode(&self, body: &[u8]) -> Result<Vec<Quad>> {
        collect_quads(nq::parse_str(as_text(body)?))
    }

    fn encode(&self, quads: &[Quad]) -> Result<Vec<u8>> {
        Ok(write_nquads(quads).into_bytes())
    }

    fn verify(&self, nanopub: &Nanopub) -> bool {
        !nanopub.quads().is_empty() && nanopub.address().is_rdf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
# comment
<https://w3id.org/np/RAdG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.nanopub.org/nschema#Nanopublication> <https://w3id.org/np/RAdG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M#Head> .
_:b0 <http://www.w3.org/2000/01/rdf-schema#label> "a \"quoted\" label"@en <https://w3id.org/np/RAdG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M#assertion> .
_:b0 <http://purl.org/dc/terms/created> "2024-01-01T00:00:00Z"^^<http://www.w3.org/2001/XMLSchema#dateTime> .
"#;

    #[test]
    fn test_decode() {
        let quads = NquadsCodec.decode(DOC.as_bytes()).unwrap();
        assert_eq!(quads.len(), 3);
        assert_eq!(quads[0].object, "http://www.nanopub.org/nschema#Nanopublication");
        assert!(quads[1].subject.starts_with("_:"));
        assert_eq!(quads[1].object, r#""a \"quoted\" label"@en"#);
        assert_eq!(
            quads[2].object,
            r#""2024-01-01T00:00:00Z"^^<http://www.w3.org/2001/XMLSchema#dateTime>"#
        );
        assert_eq!(quads[2].graph, "");
    }

    #[test]
    fn test_encode_decode_stable() {
        let quads = NquadsCodec.decode(DOC.as_bytes()).unwrap();
        let encoded = NquadsCodec.encode(&quads).unwrap();
        assert_eq!(NquadsCodec.decode(&encoded).unwrap(), quads);
    }

    #[test]
    fn test_malformed() {
        assert!(NquadsCodec.decode(b"<a> <b> <c> <d>").is_err());
        assert!(NquadsCodec.decode(b"<a> <b> \"open .").is_err());
        assert!(NquadsCodec.decode(b"not rdf at all").is_err());
        assert!(NquadsCodec.decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_verify() {
        let np = Nanopub::decode(&NquadsCodec, bytes::Bytes::from_static(DOC.as_bytes())).unwrap();
        assert!(NquadsCodec.verify(&np));
    }
}
