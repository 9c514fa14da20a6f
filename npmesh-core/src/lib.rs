//! # npmesh Core
//!
//! Core types, errors, and traits for npmesh, a client for the federation of
//! nanopublication registries.
//!
//! This crate provides the foundational building blocks used by all other npmesh crates:
//!
//! - **Types**: content addresses, registry descriptors, nanopubs and index nodes
//! - **Errors**: one error enum with classification helpers
//! - **Constants**: protocol limits, bootstrap registries and vocabulary
//! - **Pattern**: registry shard coverage (`SurfacePattern`)
//! - **Codec**: the codec table and the built-in TriG and N-Quads codecs
//! - **Traits**: collaborator interfaces (codec, local store, sink, listener)
//!
//! ## Example
//!
//! ```rust
//! use npmesh_core::{ContentAddress, SurfacePattern};
//!
//! let address = ContentAddress::parse("RAdG9VXVOBq-7Ju5H085CgynfrVlwpajLb02B-W0ko_5M").unwrap();
//! let pattern = SurfacePattern::parse(None, Some("dG9"));
//! assert!(pattern.matches_hash(&address));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod codec;
pub mod constants;
pub mod error;
pub mod pattern;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use codec::{CodecTable, NquadsCodec, RdfFormat, TrigCodec, DEFAULT_CODEC};
pub use constants::*;
pub use error::{NpmeshError, Result};
pub use pattern::SurfacePattern;
pub use traits::*;
pub use types::*;
