//! TriG codec, the format registries serve by default.

use sophia_api::serializer::{QuadSerializer, Stringifier};
use sophia_turtle::parser::{nq, trig};
use sophia_turtle::serializer::trig::TrigSerializer;

use crate::codec::rdf::{as_text, collect_quads, write_nquads};
use crate::codec::RdfFormat;
use crate::error::{NpmeshError, Result};
use crate::traits::NanopubCodec;
use crate::types::{Nanopub, Quad};

/// TriG codec backed by `sophia_turtle`.
///
/// Like [`NquadsCodec`](crate::NquadsCodec), `verify` only checks address
/// consistency.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrigCodec;

impl NanopubCodec for TrigCodec {
    fn format(&self) -> RdfFormat {
        RdfFormat::TriG
    }

    fn decode(&self, body: &[u8]) -> Result<Vec<Quad>> {
        collect_quads(trig::parse_str(as_text(body)?))
    }

    fn encode(&self, quads: &[Quad]) -> Result<Vec<u8>> {
        let text = write_nquads(quads);
        let mut serializer = TrigSerializer::new_stringifier();
        serializer
            .serialize_quads(nq::parse_str(&text))
            .map_err(|e| NpmeshError::MalformedNanopub(e.to_string()))?;
        Ok(serializer.as_str().as_bytes().to_vec())
    }

    fn verify(&self, nanopub: &Nanopub) -> bool {
        !nanopub.quads().is_empty() && nanopub.address().is_rdf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NP: &str = "https://w3id.org/np/RAdG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M";

    fn doc() -> String {
        format!(
            r#"
@prefix np: <http://www.nanopub.org/nschema#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .

<{np}#Head> {{
    <{np}> a np:Nanopublication ;
        np:hasAssertion <{np}#assertion> .
}}

<{np}#assertion> {{
    <{np}#thing> rdfs:label "a \"quoted\" label"@en ;
        rdfs:comment "plain" .
}}

<{np}> <http://purl.org/dc/terms/created> "2024-01-01T00:00:00Z"^^xsd:dateTime .
"#,
            np = NP
        )
    }

    #[test]
    fn test_decode() {
        let quads = TrigCodec.decode(doc().as_bytes()).unwrap();
        assert_eq!(quads.len(), 5);

        let head = &quads[0];
        assert_eq!(head.subject, NP);
        assert_eq!(head.object, "http://www.nanopub.org/nschema#Nanopublication");
        assert_eq!(head.graph, format!("{}#Head", NP));

        let label = quads.iter().find(|q| q.object.ends_with("@en")).unwrap();
        assert_eq!(label.object, r#""a \"quoted\" label"@en"#);
        assert!(quads.iter().any(|q| q.object == r#""plain""#));

        let created = quads.last().unwrap();
        assert_eq!(
            created.object,
            r#""2024-01-01T00:00:00Z"^^<http://www.w3.org/2001/XMLSchema#dateTime>"#
        );
        assert_eq!(created.graph, "");
    }

    #[test]
    fn test_encode_decode_stable() {
        let mut quads = TrigCodec.decode(doc().as_bytes()).unwrap();
        let encoded = TrigCodec.encode(&quads).unwrap();
        let mut decoded = TrigCodec.decode(&encoded).unwrap();
        quads.sort_by(|a, b| (&a.graph, &a.subject, &a.object).cmp(&(&b.graph, &b.subject, &b.object)));
        decoded.sort_by(|a, b| (&a.graph, &a.subject, &a.object).cmp(&(&b.graph, &b.subject, &b.object)));
        assert_eq!(decoded, quads);
    }

    #[test]
    fn test_reads_what_nquads_cannot() {
        assert!(crate::NquadsCodec.decode(doc().as_bytes()).is_err());
    }

    #[test]
    fn test_malformed() {
        assert!(TrigCodec.decode(b"<a> { <b> <c> ").is_err());
        assert!(TrigCodec.decode(b"not rdf at all").is_err());
        assert!(TrigCodec.decode(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_verify() {
        let np = Nanopub::decode(&TrigCodec, bytes::Bytes::from(doc())).unwrap();
        assert_eq!(np.uri(), NP);
        assert!(TrigCodec.verify(&np));
    }
}
