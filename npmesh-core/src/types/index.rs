//! Index nanopubs: tree fan-out and list continuation over collections.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    APPENDS_INDEX, INCLUDES_ELEMENT, INCLUDES_SUBINDEX, INCOMPLETE_INDEX, NANOPUB_INDEX, RDF_TYPE,
};
use crate::types::{ContentAddress, Quad};

/// The structural view of an index nanopub.
///
/// `elements` are member nanopubs, `sub_indexes` are child indexes, and
/// `appended_index` continues the same logical collection when it overflows a
/// single node. An incomplete index is only meaningful together with the
/// indexes appending it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNode {
    /// Member nanopubs
    pub elements: Vec<ContentAddress>,
    /// Child indexes
    pub sub_indexes: Vec<ContentAddress>,
    /// Index continued by this one
    pub appended_index: Option<ContentAddress>,
    /// Whether the index is marked incomplete
    pub incomplete: bool,
}

impl IndexNode {
    /// Extracts the index view of the nanopub `uri`, if it is typed as an index.
    ///
    /// Only statements about `uri` itself count. Member references that do not
    /// carry a valid address are skipped, and repeated references keep their
    /// first position.
    pub fn extract(uri: &str, quads: &[Quad]) -> Option<Self> {
        let typed_as = |class: &str| {
            quads
                .iter()
                .any(|q| q.subject == uri && q.predicate == RDF_TYPE && q.object == class)
        };
        if !typed_as(NANOPUB_INDEX) {
            return None;
        }

        let mut node = IndexNode {
            incomplete: typed_as(INCOMPLETE_INDEX),
            ..Default::default()
        };
        let mut seen_elements = HashSet::new();
        let mut seen_subs = HashSet::new();
        for quad in quads.iter().filter(|q| q.subject == uri) {
            let Ok(target) = ContentAddress::parse(&quad.object) else {
                continue;
            };
            match quad.predicate.as_str() {
                INCLUDES_ELEMENT => {
                    if seen_elements.insert(target.clone()) {
                        node.elements.push(target);
                    }
                }
                INCLUDES_SUBINDEX => {
                    if seen_subs.insert(target.clone()) {
                        node.sub_indexes.push(target);
                    }
                }
                APPENDS_INDEX if node.appended_index.is_none() => {
                    node.appended_index = Some(target);
                }
                _ => {}
            }
        }
        Some(node)
    }

    /// Number of references (elements, sub-indexes and appended index).
    pub fn reference_count(&self) -> usize {
        self.elements.len() + self.sub_indexes.len() + usize::from(self.appended_index.is_some())
    }
}
