//! Registry self-descriptions.

use serde::{Deserialize, Serialize};

use crate::constants::{COLLECTION_PATH, PEERS_PATH, REQUIRED_PROTOCOL_VERSION};
use crate::error::{NpmeshError, Result};
use crate::pattern::SurfacePattern;

fn unset() -> i64 {
    -1
}

/// Snapshot of a registry's self-description, as served at its root URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDescriptor {
    /// URL the registry claims as its own; must equal the URL it was fetched from
    pub public_url: String,
    /// Administrator contact
    #[serde(default)]
    pub admin: Option<String>,
    /// Protocol version, MAJOR.MINOR
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the registry accepts new nanopubs
    #[serde(default)]
    pub post_nanopubs_enabled: bool,
    /// Whether the registry accepts peer announcements
    #[serde(default)]
    pub post_peers_enabled: bool,
    /// Nanopubs per page of the registry's listing (-1 if unknown)
    #[serde(default = "unset")]
    pub page_size: i64,
    /// Sequence number the next stored nanopub will get (-1 if unknown)
    #[serde(default = "unset")]
    pub next_nanopub_no: i64,
    /// Identifier of the registry's journal (-1 if unknown)
    #[serde(default = "unset")]
    pub journal_id: i64,
    /// Largest number of nanopubs the registry will hold
    #[serde(default)]
    pub max_nanopubs: Option<u64>,
    /// Largest accepted nanopub, in triples
    #[serde(default)]
    pub max_nanopub_triples: Option<u64>,
    /// Largest accepted nanopub, in bytes
    #[serde(default)]
    pub max_nanopub_bytes: Option<u64>,
    /// Space-separated URI prefixes this registry covers
    #[serde(default)]
    pub uri_pattern: Option<String>,
    /// Space-separated hash prefixes this registry covers
    #[serde(default)]
    pub hash_pattern: Option<String>,
}

/// Converts a MAJOR.MINOR version string into a comparable number.
///
/// Unparseable versions map to 0.
pub fn version_value(version: &str) -> u32 {
    let mut parts = version.trim().split('.');
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
    match (major, minor) {
        (Some(major), Some(minor)) => major.saturating_mul(1000).saturating_add(minor),
        _ => 0,
    }
}

impl RegistryDescriptor {
    /// Creates a minimal descriptor for the given URL.
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into(),
            admin: None,
            protocol_version: Some(REQUIRED_PROTOCOL_VERSION.into()),
            description: None,
            post_nanopubs_enabled: false,
            post_peers_enabled: false,
            page_size: -1,
            next_nanopub_no: -1,
            journal_id: -1,
            max_nanopubs: None,
            max_nanopub_triples: None,
            max_nanopub_bytes: None,
            uri_pattern: None,
            hash_pattern: None,
        }
    }

    /// Numeric protocol version (0 when absent or unparseable).
    pub fn protocol_version_value(&self) -> u32 {
        self.protocol_version.as_deref().map(version_value).unwrap_or(0)
    }

    /// Checks the descriptor against the URL it was fetched from.
    pub fn validate_for(&self, requested_url: &str, min_version: &str) -> Result<()> {
        if self.public_url != requested_url {
            return Err(NpmeshError::InvalidDescriptor {
                url: requested_url.to_string(),
                reason: format!("public URL mismatch: {}", self.public_url),
            });
        }
        if self.protocol_version_value() < version_value(min_version) {
            return Err(NpmeshError::VersionMismatch {
                required: min_version.to_string(),
                actual: self.protocol_version.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// The declared coverage of this registry.
    pub fn surface_pattern(&self) -> SurfacePattern {
        SurfacePattern::parse(self.uri_pattern.as_deref(), self.hash_pattern.as_deref())
    }

    /// Base URL of the stored nanopub collection.
    pub fn collection_url(&self) -> String {
        format!("{}{}", self.public_url, COLLECTION_PATH)
    }

    /// URL of the registry's peer list.
    pub fn peers_url(&self) -> String {
        format!("{}{}", self.public_url, PEERS_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://registry.example.org/";

    #[test]
    fn test_version_value() {
        assert_eq!(version_value("0.2"), 2);
        assert_eq!(version_value("0.12"), 12);
        assert_eq!(version_value("1.3"), 1003);
        assert!(version_value("0.12") > version_value("0.9"));
        assert_eq!(version_value("garbage"), 0);
        assert_eq!(version_value("3"), 0);
    }

    #[test]
    fn test_deserialize_wire_format() {
        let json = r#"{
            "publicUrl": "https://registry.example.org/",
            "admin": "admin@example.org",
            "protocolVersion": "0.3",
            "description": "test",
            "postNanopubsEnabled": true,
            "postPeersEnabled": false,
            "pageSize": 1000,
            "nextNanopubNo": 42,
            "journalId": 7,
            "maxNanopubTriples": 1200,
            "maxNanopubBytes": 1000000,
            "maxNanopubs": null,
            "uriPattern": "http://purl.org/np/ https://w3id.org/np/",
            "hashPattern": "A B"
        }"#;
        let descriptor: RegistryDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.public_url, URL);
        assert!(descriptor.post_nanopubs_enabled);
        assert_eq!(descriptor.page_size, 1000);
        assert_eq!(descriptor.max_nanopub_triples, Some(1200));
        assert_eq!(descriptor.max_nanopubs, None);
        assert_eq!(descriptor.protocol_version_value(), 3);
    }

    #[test]
    fn test_missing_fields_default() {
        let descriptor: RegistryDescriptor =
            serde_json::from_str(r#"{"publicUrl": "https://registry.example.org/"}"#).unwrap();
        assert!(!descriptor.post_nanopubs_enabled);
        assert_eq!(descriptor.journal_id, -1);
        assert_eq!(descriptor.protocol_version_value(), 0);
    }

    #[test]
    fn test_validate_url_mismatch() {
        let descriptor = RegistryDescriptor::new("https://other.example.org/");
        let err = descriptor.validate_for(URL, "0.2").unwrap_err();
        assert!(matches!(err, NpmeshError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_validate_old_version() {
        let mut descriptor = RegistryDescriptor::new(URL);
        descriptor.protocol_version = Some("0.1".into());
        assert!(matches!(
            descriptor.validate_for(URL, "0.2"),
            Err(NpmeshError::VersionMismatch { .. })
        ));

        descriptor.protocol_version = Some("0.10".into());
        assert!(descriptor.validate_for(URL, "0.2").is_ok());
    }

    #[test]
    fn test_urls() {
        let descriptor = RegistryDescriptor::new(URL);
        assert_eq!(descriptor.collection_url(), "https://registry.example.org/np/");
        assert_eq!(descriptor.peers_url(), "https://registry.example.org/peers");
    }
}
