//! # npmesh Publish
//!
//! Places new nanopubs on registries of the federation.
//!
//! Candidates are tried one at a time. A registry is skipped when its
//! descriptor cannot be reloaded, when it has publishing disabled, or when
//! its declared shard does not cover the nanopub's URI. The first registry
//! answering a POST with 2xx wins and is tried first for later nanopubs.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

mod publisher;

pub use publisher::{ProgressCallback, PublishConfig, PublishReceipt, Publisher};
