//! # npmesh Store
//!
//! Trusted local stores consulted before any registry.
//!
//! - [`MemoryStore`]: concurrent in-memory map
//! - [`DirStore`]: one file per nanopub in a directory

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

mod dir;
mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

#[cfg(test)]
pub(crate) mod test_utils {
    use npmesh_core::constants::{NANOPUBLICATION, RDF_TYPE};
    use npmesh_core::{Nanopub, NquadsCodec, Quad};

    /// Builds a minimal nanopub whose artifact code ends with `n`.
    pub fn nanopub(n: u32) -> Nanopub {
        let uri = format!("https://w3id.org/np/RAtest{:040}", n);
        Nanopub::from_quads(
            &NquadsCodec,
            vec![Quad::new(&uri, RDF_TYPE, NANOPUBLICATION, format!("{}#Head", uri))],
        )
        .unwrap()
    }
}
