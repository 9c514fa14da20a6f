//! Surface patterns: a registry's declared shard coverage.
//!
//! A pattern is an optional list of URI prefixes and an optional list of hash
//! prefixes. The hash list is checked first and a miss there fails the match
//! outright; only then is the URI list consulted. An absent or empty list
//! matches everything.
//!
//! The publisher filters candidates with [`SurfacePattern::matches_uri`]. The
//! fetch engine deliberately does not: a declared shard is a placement hint,
//! not an access boundary.

use serde::{Deserialize, Serialize};

use crate::types::ContentAddress;

/// Declared URI/hash-prefix coverage of a registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacePattern {
    uri_prefixes: Option<Vec<String>>,
    hash_prefixes: Option<Vec<String>>,
}

fn split_prefixes(pattern: Option<&str>) -> Option<Vec<String>> {
    let prefixes: Vec<String> = pattern?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    (!prefixes.is_empty()).then_some(prefixes)
}

fn prefix_lists_overlap(a: &[String], b: &[String]) -> bool {
    a.iter()
        .any(|p1| b.iter().any(|p2| p1.starts_with(p2.as_str()) || p2.starts_with(p1.as_str())))
}

impl SurfacePattern {
    /// Pattern that covers everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Parses the space-separated wire representation.
    pub fn parse(uri_pattern: Option<&str>, hash_pattern: Option<&str>) -> Self {
        Self {
            uri_prefixes: split_prefixes(uri_pattern),
            hash_prefixes: split_prefixes(hash_pattern),
        }
    }

    /// Builds a pattern from explicit prefix lists.
    pub fn from_prefixes(uri_prefixes: Vec<String>, hash_prefixes: Vec<String>) -> Self {
        Self {
            uri_prefixes: (!uri_prefixes.is_empty()).then_some(uri_prefixes),
            hash_prefixes: (!hash_prefixes.is_empty()).then_some(hash_prefixes),
        }
    }

    /// Returns true if the pattern restricts nothing.
    pub fn is_unrestricted(&self) -> bool {
        self.uri_prefixes.is_none() && self.hash_prefixes.is_none()
    }

    /// Matches the hash segment of an address against the hash prefixes.
    pub fn matches_hash(&self, address: &ContentAddress) -> bool {
        match &self.hash_prefixes {
            None => true,
            Some(prefixes) => {
                let hash = address.hash_part();
                prefixes.iter().any(|p| hash.starts_with(p.as_str()))
            }
        }
    }

    /// Matches a full nanopub URI.
    ///
    /// The embedded address must pass [`matches_hash`](Self::matches_hash)
    /// first; a URI without a parseable address never matches.
    pub fn matches_uri(&self, uri: &str) -> bool {
        let address = match ContentAddress::parse(uri) {
            Ok(address) => address,
            Err(_) => return false,
        };
        if !self.matches_hash(&address) {
            return false;
        }
        match &self.uri_prefixes {
            None => true,
            Some(prefixes) => prefixes.iter().any(|p| uri.starts_with(p.as_str())),
        }
    }

    /// Returns true if some nanopub could be covered by both patterns.
    pub fn overlaps_with(&self, other: &SurfacePattern) -> bool {
        if let (Some(a), Some(b)) = (&self.uri_prefixes, &other.uri_prefixes) {
            if !prefix_lists_overlap(a, b) {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (&self.hash_prefixes, &other.hash_prefixes) {
            if !prefix_lists_overlap(a, b) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HASH: &str = "abcG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M";

    fn uri(prefix: &str, hash: &str) -> String {
        format!("{}RA{}", prefix, hash)
    }

    fn address(hash: &str) -> ContentAddress {
        ContentAddress::parse(&format!("RA{}", hash)).unwrap()
    }

    #[test]
    fn test_unrestricted_matches_everything() {
        let pattern = SurfacePattern::parse(None, Some("   "));
        assert!(pattern.is_unrestricted());
        assert!(pattern.matches_hash(&address(HASH)));
        assert!(pattern.matches_uri(&uri("https://w3id.org/np/", HASH)));
    }

    #[test]
    fn test_hash_prefix() {
        let pattern = SurfacePattern::parse(None, Some("abc"));
        assert!(pattern.matches_hash(&address(HASH)));
        assert!(!pattern.matches_hash(&address("xyzG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M")));
    }

    #[test]
    fn test_uri_requires_hash_match() {
        let pattern = SurfacePattern::parse(Some("https://w3id.org/np/"), Some("zzz"));
        assert!(!pattern.matches_uri(&uri("https://w3id.org/np/", HASH)));

        let pattern = SurfacePattern::parse(Some("https://w3id.org/np/"), Some("ab"));
        assert!(pattern.matches_uri(&uri("https://w3id.org/np/", HASH)));
        assert!(!pattern.matches_uri(&uri("http://purl.org/np/", HASH)));
    }

    #[test]
    fn test_any_uri_prefix_matches() {
        let pattern = SurfacePattern::parse(Some("http://purl.org/np/ https://w3id.org/np/"), None);
        assert!(pattern.matches_uri(&uri("http://purl.org/np/", HASH)));
        assert!(pattern.matches_uri(&uri("https://w3id.org/np/", HASH)));
        assert!(!pattern.matches_uri(&uri("https://example.org/", HASH)));
    }

    #[test]
    fn test_uri_without_address_never_matches() {
        assert!(!SurfacePattern::any().matches_uri("https://w3id.org/np/"));
    }

    #[test]
    fn test_overlap() {
        let a = SurfacePattern::parse(Some("https://w3id.org/"), Some("A B"));
        let b = SurfacePattern::parse(Some("https://w3id.org/np/"), Some("Bx"));
        let c = SurfacePattern::parse(None, Some("C"));
        assert!(a.overlaps_with(&b));
        assert!(b.overlaps_with(&a));
        assert!(!a.overlaps_with(&c));
        assert!(SurfacePattern::any().overlaps_with(&c));
    }

    proptest! {
        #[test]
        fn prop_hash_prefix_is_starts_with(hash in "[A-Za-z0-9_-]{43}", prefix in "[A-Za-z0-9_-]{1,3}") {
            let pattern = SurfacePattern::from_prefixes(vec![], vec![prefix.clone()]);
            prop_assert_eq!(pattern.matches_hash(&address(&hash)), hash.starts_with(&prefix));
        }

        #[test]
        fn prop_uri_match_implies_hash_match(hash in "[A-Za-z0-9_-]{43}", prefix in "[A-Za-z0-9_-]{1,2}") {
            let pattern = SurfacePattern::from_prefixes(vec!["https://w3id.org/np/".into()], vec![prefix]);
            let u = uri("https://w3id.org/np/", &hash);
            if pattern.matches_uri(&u) {
                prop_assert!(pattern.matches_hash(&address(&hash)));
            }
        }
    }
}
