//! Conversion between parsed RDF terms and the textual [`Quad`] form.

use sophia_api::quad::Quad as RdfQuad;
use sophia_api::source::QuadSource;
use sophia_api::term::{Term, TermKind};

use crate::error::{NpmeshError, Result};
use crate::types::Quad;

const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

pub(crate) fn as_text(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body).map_err(|e| NpmeshError::MalformedNanopub(format!("not UTF-8: {}", e)))
}

/// Drains a parsed quad source into textual quads.
pub(crate) fn collect_quads<S>(mut source: S) -> Result<Vec<Quad>>
where
    S: QuadSource,
{
    let mut quads = Vec::new();
    let mut failure = None;
    source
        .for_each_quad(|q| {
            if failure.is_some() {
                return;
            }
            match quad_text(q) {
                Ok(quad) => quads.push(quad),
                Err(e) => failure = Some(e),
            }
        })
        .map_err(|e| NpmeshError::MalformedNanopub(e.to_string()))?;
    match failure {
        Some(e) => Err(e),
        None => Ok(quads),
    }
}

fn quad_text<Q: RdfQuad>(q: Q) -> Result<Quad> {
    let graph = match q.g() {
        Some(g) => term_text(g)?,
        None => String::new(),
    };
    Ok(Quad::new(term_text(q.s())?, term_text(q.p())?, term_text(q.o())?, graph))
}

fn term_text<T: Term>(term: T) -> Result<String> {
    match term.kind() {
        TermKind::Iri => term
            .iri()
            .map(|iri| iri.as_str().to_string())
            .ok_or_else(|| NpmeshError::MalformedNanopub("IRI term without IRI".into())),
        TermKind::BlankNode => term
            .bnode_id()
            .map(|id| format!("_:{}", id.as_str()))
            .ok_or_else(|| NpmeshError::MalformedNanopub("blank node without id".into())),
        TermKind::Literal => {
            let lexical = term.lexical_form().map(|l| l.to_string()).unwrap_or_default();
            let mut out = String::with_capacity(lexical.len() + 2);
            out.push('"');
            escape_into(&mut out, &lexical);
            out.push('"');
            if let Some(tag) = term.language_tag() {
                out.push('@');
                out.push_str(tag.as_str());
            } else if let Some(dt) = term.datatype() {
                if dt.as_str() != XSD_STRING {
                    out.push_str("^^<");
                    out.push_str(dt.as_str());
                    out.push('>');
                }
            }
            Ok(out)
        }
        other => Err(NpmeshError::MalformedNanopub(format!(
            "unsupported term kind {:?}",
            other
        ))),
    }
}

fn escape_into(out: &mut String, lexical: &str) {
    for c in lexical.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}

fn write_term(out: &mut String, term: &str) {
    if term.starts_with('"') || term.starts_with("_:") {
        out.push_str(term);
    } else {
        out.push('<');
        out.push_str(term);
        out.push('>');
    }
}

/// Writes quads as N-Quads; statements in the default graph get no graph term.
pub(crate) fn write_nquads(quads: &[Quad]) -> String {
    let mut out = String::new();
    for quad in quads {
        write_term(&mut out, &quad.subject);
        out.push(' ');
        write_term(&mut out, &quad.predicate);
        out.push(' ');
        write_term(&mut out, &quad.object);
        if !quad.graph.is_empty() {
            out.push(' ');
            write_term(&mut out, &quad.graph);
        }
        out.push_str(" .\n");
    }
    out
}
