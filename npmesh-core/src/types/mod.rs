//! Domain types shared across npmesh crates.

mod address;
mod descriptor;
mod index;
mod nanopub;

pub use address::ContentAddress;
pub use descriptor::{version_value, RegistryDescriptor};
pub use index::IndexNode;
pub use nanopub::{Nanopub, Quad};
