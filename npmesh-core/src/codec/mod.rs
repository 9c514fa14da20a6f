//! Serialization formats and the codec table.
//!
//! Codecs are registered by name and resolved once at startup; the rest of the
//! workspace only sees `Arc<dyn NanopubCodec>`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{NpmeshError, Result};
use crate::traits::NanopubCodec;

mod nquads;
mod rdf;
mod trig;

pub use nquads::NquadsCodec;
pub use trig::TrigCodec;

/// Name of the codec used when none is configured.
pub const DEFAULT_CODEC: &str = "trig";

/// RDF serialization formats understood by registries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RdfFormat {
    /// TriG
    TriG,
    /// N-Quads
    NQuads,
}

impl RdfFormat {
    /// Media type for `Accept` and `Content-Type` headers.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::TriG => "application/trig",
            Self::NQuads => "application/n-quads",
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TriG => "trig",
            Self::NQuads => "nq",
        }
    }

    /// Name under which the built-in codec for this format is registered.
    pub fn codec_name(&self) -> &'static str {
        match self {
            Self::TriG => "trig",
            Self::NQuads => "nquads",
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "trig" => Some(Self::TriG),
            "nq" | "nquads" => Some(Self::NQuads),
            _ => None,
        }
    }
}

impl fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Factory producing a codec instance.
pub type CodecFactory = Box<dyn Fn() -> Arc<dyn NanopubCodec> + Send + Sync>;

/// Name-keyed registry of codecs.
pub struct CodecTable {
    factories: HashMap<String, CodecFactory>,
}

impl CodecTable {
    /// Creates an empty table.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers (or replaces) a codec under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: CodecFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Resolves a codec by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn NanopubCodec>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| NpmeshError::UnknownCodec(name.to_string()))
    }

    /// Resolves the codec for a file from its extension, or `fallback` when the
    /// extension names no known format.
    pub fn resolve_for_file(&self, path: &Path, fallback: &str) -> Result<Arc<dyn NanopubCodec>> {
        let name = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RdfFormat::from_extension)
            .map_or(fallback, |format| format.codec_name());
        self.resolve(name)
    }

    /// Registered codec names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CodecTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(
            RdfFormat::TriG.codec_name(),
            Box::new(|| Arc::new(TrigCodec) as Arc<dyn NanopubCodec>),
        );
        table.register(
            RdfFormat::NQuads.codec_name(),
            Box::new(|| Arc::new(NquadsCodec) as Arc<dyn NanopubCodec>),
        );
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = CodecTable::default();
        assert_eq!(table.names(), vec!["nquads", "trig"]);
        let codec = table.resolve(DEFAULT_CODEC).unwrap();
        assert_eq!(codec.format(), RdfFormat::TriG);
        assert_eq!(codec.format().media_type(), "application/trig");
        let codec = table.resolve("nquads").unwrap();
        assert_eq!(codec.format(), RdfFormat::NQuads);
    }

    #[test]
    fn test_unknown_codec() {
        let table = CodecTable::empty();
        assert!(matches!(table.resolve("turtle"), Err(NpmeshError::UnknownCodec(_))));
    }

    #[test]
    fn test_resolve_for_file() {
        let table = CodecTable::default();
        let codec = table.resolve_for_file(Path::new("np/one.nq"), "trig").unwrap();
        assert_eq!(codec.format(), RdfFormat::NQuads);
        let codec = table.resolve_for_file(Path::new("two.TriG"), "nquads").unwrap();
        assert_eq!(codec.format(), RdfFormat::TriG);
        let codec = table.resolve_for_file(Path::new("three.rdf"), "nquads").unwrap();
        assert_eq!(codec.format(), RdfFormat::NQuads);
        assert!(table.resolve_for_file(Path::new("four"), "turtle").is_err());
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(RdfFormat::from_extension("TRIG"), Some(RdfFormat::TriG));
        assert_eq!(RdfFormat::from_extension("nq"), Some(RdfFormat::NQuads));
        assert_eq!(RdfFormat::from_extension("json"), None);
        assert_eq!(RdfFormat::NQuads.media_type(), "application/n-quads");
        for format in [RdfFormat::TriG, RdfFormat::NQuads] {
            let codec = CodecTable::default().resolve(format.codec_name()).unwrap();
            assert_eq!(codec.format(), format);
        }
    }
}
