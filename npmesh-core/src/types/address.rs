//! Content addresses (trusty-URI artifact codes).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MIN_ARTIFACT_CODE_LEN, RDF_MODULE_ID};
use crate::error::{NpmeshError, Result};

/// Longest file-extension style suffix tolerated after an artifact code.
const MAX_SUFFIX_LEN: usize = 20;

/// A content address.
///
/// The artifact code is a two-character module id followed by the hash
/// segment. An address may remember the URI it was parsed from, but equality
/// and hashing only consider the artifact code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentAddress {
    artifact_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Returns the trailing artifact code of `s`, if it is long enough.
fn trailing_code(s: &str) -> Option<&str> {
    let start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_code_char(*c))
        .last()
        .map(|(i, _)| i)?;
    let code = &s[start..];
    (code.len() >= MIN_ARTIFACT_CODE_LEN).then_some(code)
}

impl ContentAddress {
    /// Parses a bare artifact code or a URI ending in one.
    ///
    /// A short `.ext` suffix after the code (as in `…/RAxyz.trig`) is ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(NpmeshError::InvalidAddress("empty".into()));
        }

        let is_uri = input.contains(':');
        if !is_uri {
            if input.chars().all(is_code_char) && input.len() >= MIN_ARTIFACT_CODE_LEN {
                return Ok(Self {
                    artifact_code: input.to_string(),
                    uri: None,
                });
            }
            return Err(NpmeshError::InvalidAddress(input.to_string()));
        }

        let code = trailing_code(input).or_else(|| {
            let (head, suffix) = input.rsplit_once('.')?;
            if suffix.len() <= MAX_SUFFIX_LEN && suffix.chars().all(is_code_char) {
                trailing_code(head)
            } else {
                None
            }
        });

        match code {
            Some(code) => Ok(Self {
                artifact_code: code.to_string(),
                uri: Some(input.to_string()),
            }),
            None => Err(NpmeshError::InvalidAddress(input.to_string())),
        }
    }

    /// Parses and additionally requires the RDF module id.
    pub fn parse_rdf(input: &str) -> Result<Self> {
        let address = Self::parse(input)?;
        if !address.is_rdf() {
            return Err(NpmeshError::UnsupportedModule(input.trim().to_string()));
        }
        Ok(address)
    }

    /// The full artifact code.
    pub fn artifact_code(&self) -> &str {
        &self.artifact_code
    }

    /// The two-character module identifier.
    pub fn module_id(&self) -> &str {
        &self.artifact_code[..2]
    }

    /// The hash segment (artifact code without module id).
    pub fn hash_part(&self) -> &str {
        &self.artifact_code[2..]
    }

    /// The URI this address was parsed from, if any.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Returns true for RDF-graph artifact codes.
    pub fn is_rdf(&self) -> bool {
        self.module_id() == RDF_MODULE_ID
    }

    /// URL of this address in a registry's collection.
    pub fn collection_url(&self, registry_url: &str) -> String {
        format!("{}{}", registry_url, self.artifact_code)
    }
}

impl PartialEq for ContentAddress {
    fn eq(&self, other: &Self) -> bool {
        self.artifact_code == other.artifact_code
    }
}

impl Eq for ContentAddress {}

impl Hash for ContentAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.artifact_code.hash(state);
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.artifact_code)
    }
}

impl FromStr for ContentAddress {
    type Err = NpmeshError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
