//! Swappable binding of the metadata and blob stores to a storage root.

use crate::blob_store::{BlobStore, LocalBlobStore};
use crate::config::{MetadataBackend, StorageConfig};
use crate::error::Result;
use crate::metadata::{open_metadata_store, MetadataStore};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The store pair bound to one storage root.
#[derive(Clone)]
pub struct Providers {
    /// Metadata store rooted at `<root>/db`.
    pub metadata: Arc<dyn MetadataStore>,
    /// Blob store rooted at `<root>/objects`.
    pub blobs: Arc<dyn BlobStore>,
    /// Storage root both stores derive from.
    pub root: PathBuf,
}

impl Providers {
    /// Opens both stores under `root`.
    ///
    /// Nothing is returned unless both stores open successfully.
    pub fn open(root: impl AsRef<Path>, backend: MetadataBackend) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let blobs: Arc<dyn BlobStore> =
            Arc::new(LocalBlobStore::new(StorageConfig::blob_root(&root))?);
        let metadata = open_metadata_store(StorageConfig::metadata_root(&root), backend)?;
        Ok(Self {
            metadata,
            blobs,
            root,
        })
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").field("root", &self.root).finish()
    }
}

/// Holds the active [`Providers`] and replaces them atomically.
///
/// Readers take a cheap snapshot of the current pair with [`current`]; an
/// operation keeps using the pair it started with even if a reconfiguration
/// happens meanwhile.
///
/// [`current`]: ProviderManager::current
#[derive(Debug)]
pub struct ProviderManager {
    backend: MetadataBackend,
    active: RwLock<Providers>,
}

impl ProviderManager {
    /// Opens the store pair for `root`.
    pub fn open(root: impl AsRef<Path>, backend: MetadataBackend) -> Result<Self> {
        let providers = Providers::open(root, backend)?;
        info!(root = %providers.root.display(), backend = %backend, "Storage providers ready");
        Ok(Self::from_providers(providers, backend))
    }

    /// Wraps an already constructed store pair, e.g. one with a custom
    /// [`BlobStore`].
    pub fn from_providers(providers: Providers, backend: MetadataBackend) -> Self {
        Self {
            backend,
            active: RwLock::new(providers),
        }
    }

    /// The active store pair.
    pub fn current(&self) -> Providers {
        self.active.read().clone()
    }

    /// The active metadata store.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.active.read().metadata.clone()
    }

    /// The active blob store.
    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        self.active.read().blobs.clone()
    }

    /// The active storage root.
    pub fn root(&self) -> PathBuf {
        self.active.read().root.clone()
    }

    /// Rebinds both stores to `new_root`.
    ///
    /// The new pair is fully constructed before the swap. If either store
    /// fails to open, the previous pair stays active. Existing data is never
    /// moved between roots. Rebinding to the active root (after resolving
    /// symlinks and `..`) keeps the current pair.
    ///
    /// The redb backend allows one open handle per database file. Switching
    /// back to a root whose database is still held elsewhere, e.g. by a
    /// [`Providers`] obtained from [`current`] or a pending background graph
    /// rebuild, fails with a `Database` error until that handle is dropped.
    ///
    /// [`current`]: ProviderManager::current
    pub fn reconfigure(&self, new_root: impl AsRef<Path>) -> Result<()> {
        let new_root = new_root.as_ref();
        if same_location(&self.root(), new_root) {
            debug!(root = %new_root.display(), "Storage root unchanged");
            return Ok(());
        }

        let next = Providers::open(new_root, self.backend)?;
        self.swap(next);
        Ok(())
    }

    /// Reinstates a previously active pair, returning the one it replaces.
    pub fn restore(&self, previous: Providers) -> Providers {
        self.swap(previous)
    }

    fn swap(&self, next: Providers) -> Providers {
        let mut active = self.active.write();
        info!(
            from = %active.root.display(),
            to = %next.root.display(),
            "Storage providers reconfigured"
        );
        std::mem::replace(&mut *active, next)
    }
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
