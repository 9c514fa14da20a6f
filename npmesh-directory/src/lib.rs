//! # npmesh Directory
//!
//! Discovery of registries in the nanopublication federation.
//!
//! - **Bootstrap**: a hardcoded list, overridable by configuration
//! - **Disk cache**: the peer list of the last full crawl, reused for 24h
//! - **Descriptor cache**: per-URL descriptors, wiped every 24h
//! - **Crawl**: each yielded registry's `peers` list is followed lazily
//!
//! ## Example
//!
//! ```rust,no_run
//! use npmesh_directory::{DirectoryMode, RegistryDirectory};
//!
//! # async fn example() {
//! let directory = RegistryDirectory::from_env();
//! let mut registries = directory.iter(DirectoryMode::Default).await;
//! while let Some(registry) = registries.next_registry().await {
//!     println!("{}", registry.public_url);
//! }
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

mod cache;
mod config;
mod directory;

pub use cache::{load_peer_cache, save_peer_cache, DescriptorCache, PeerCacheFile};
pub use config::{default_cache_file, parse_registry_list, DirectoryConfig, ENV_CACHE_FILE, ENV_REGISTRIES};
pub use directory::{DirectoryMode, RegistryDirectory, RegistryIter};
