//! Directory-backed nanopub store.
//!
//! Each nanopub lives in `<artifactCode>.<ext>`, serialized with the store's
//! codec. Files are re-verified on every read.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use npmesh_core::error::{NpmeshError, Result};
use npmesh_core::traits::{LocalStore, NanopubCodec};
use npmesh_core::types::{ContentAddress, Nanopub};

/// Store backed by a directory of serialized nanopubs.
pub struct DirStore {
    root: PathBuf,
    codec: Arc<dyn NanopubCodec>,
}

impl DirStore {
    /// Opens (and creates if needed) a store at `root`.
    pub fn open(root: impl AsRef<Path>, codec: Arc<dyn NanopubCodec>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(path = ?root, format = %codec.format(), "Opened directory store");
        Ok(Self { root, codec })
    }

    /// Returns the root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, address: &ContentAddress) -> PathBuf {
        self.root.join(format!(
            "{}.{}",
            address.artifact_code(),
            self.codec.format().extension()
        ))
    }

    /// Addresses of all stored nanopubs.
    pub fn addresses(&self) -> Result<Vec<ContentAddress>> {
        let ext = self.codec.format().extension();
        let mut addresses = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(address) = ContentAddress::parse(stem) {
                    addresses.push(address);
                }
            }
        }
        Ok(addresses)
    }
}

impl LocalStore for DirStore {
    fn get(&self, address: &ContentAddress) -> Result<Option<Nanopub>> {
        let path = self.file_for(address);
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let nanopub = Nanopub::decode(self.codec.as_ref(), Bytes::from(body))?;
        if nanopub.address() != address || !self.codec.verify(&nanopub) {
            warn!(path = ?path, "Stored nanopub failed verification");
            return Err(NpmeshError::VerificationFailed(address.to_string()));
        }
        Ok(Some(nanopub))
    }

    fn put(&self, nanopub: &Nanopub) -> Result<()> {
        let path = self.file_for(nanopub.address());
        let body = self.codec.encode(nanopub.quads())?;

        // Write atomically (write to temp, then rename)
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&body)?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        debug!(address = %nanopub.address(), "Stored nanopub");
        Ok(())
    }

    fn contains(&self, address: &ContentAddress) -> bool {
        self.file_for(address).exists()
    }
}
