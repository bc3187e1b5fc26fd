//! Durable store for codebases, versions, file indexes, lineage links and
//! the per-codebase graph cache.
//!
//! Every backend keeps the full record set in memory behind one reader/writer
//! lock. A mutation is applied to a copy of the records, persisted, and only
//! then swapped in: a successful call is durable and immediately visible, and
//! a failed persist leaves the visible state unchanged.

mod catalog;
mod json_backend;
mod redb_backend;

pub use catalog::{Catalog, Change, FALLBACK_DEFAULT_BRANCH};
pub use json_backend::JsonBackend;
pub use redb_backend::RedbBackend;

use crate::config::MetadataBackend;
use crate::error::{Result, VaultError};
use crate::types::{Codebase, FileTree, LineageLink, Version};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Metadata operations needed by the snapshot, lineage and archive engines.
pub trait MetadataStore: Send + Sync {
    /// Creates a codebase. Fails with `CodebaseExists` on a duplicate id.
    fn create_codebase(&self, codebase: &Codebase) -> Result<()>;

    /// Looks up a codebase by id.
    fn get_codebase(&self, id: &str) -> Result<Codebase>;

    /// Replaces an existing codebase record.
    fn update_codebase(&self, codebase: &Codebase) -> Result<()>;

    /// Removes a codebase with every version, file tree, link and cache entry
    /// that references it.
    fn delete_codebase(&self, id: &str) -> Result<()>;

    /// All codebases, ordered by id.
    fn list_codebases(&self) -> Result<Vec<Codebase>>;

    /// Records a version together with its file tree.
    fn create_version(&self, version: &Version, tree: &FileTree) -> Result<()>;

    /// Looks up a version by id.
    fn get_version(&self, id: &str) -> Result<Version>;

    /// Resolves `(codebase, branch, label)` to the most recently created match.
    fn find_version(&self, codebase_id: &str, branch: &str, label: &str) -> Result<Version>;

    /// File tree (the file index) stored under `tree_id`.
    fn get_file_tree(&self, tree_id: &str) -> Result<FileTree>;

    /// Latest version on `branch`, ignoring `exclude_id`.
    fn latest_in_branch(
        &self,
        codebase_id: &str,
        branch: &str,
        exclude_id: &str,
    ) -> Result<Option<Version>>;

    /// True if `branch` has no versions other than `exclude_id`.
    fn is_new_branch(&self, codebase_id: &str, branch: &str, exclude_id: &str) -> Result<bool>;

    /// Latest version on the codebase's default branch.
    fn latest_on_default_branch(&self, codebase_id: &str) -> Result<Option<Version>>;

    /// Records a link. Returns false, changing nothing, if the child already
    /// has a parent.
    fn create_link(&self, link: &LineageLink) -> Result<bool>;

    /// The parent link of `child_version_id`, if any.
    fn get_link(&self, child_version_id: &str) -> Result<Option<LineageLink>>;

    /// All versions of a codebase, newest first.
    fn graph_nodes(&self, codebase_id: &str) -> Result<Vec<Version>>;

    /// All links of a codebase in record order.
    fn graph_edges(&self, codebase_id: &str) -> Result<Vec<LineageLink>>;

    /// Branch name → id of the branch head.
    fn branch_heads(&self, codebase_id: &str) -> Result<BTreeMap<String, String>>;

    /// Serialized graph cache. Fails with `CacheNotFound` when absent.
    fn get_graph_cache(&self, codebase_id: &str) -> Result<Vec<u8>>;

    /// Replaces the serialized graph cache.
    fn set_graph_cache(&self, codebase_id: &str, data: &[u8]) -> Result<()>;
}

/// Persistence half of a metadata store.
///
/// `persist` receives the catalog as it will look after the change, plus the
/// change itself, so backends can choose between rewriting whole collections
/// and applying the change incrementally.
pub trait CatalogBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Loads every record.
    fn load(&self) -> Result<Catalog>;

    /// Durably records `change`, whose result is `next`.
    fn persist(&self, next: &Catalog, change: &Change) -> Result<()>;

    /// Reads the graph cache of a codebase, `None` when absent.
    fn read_cache(&self, codebase_id: &str) -> Result<Option<Vec<u8>>>;

    /// Durably writes the graph cache of a codebase.
    fn write_cache(&self, codebase_id: &str, data: &[u8]) -> Result<()>;
}

/// [`MetadataStore`] over any [`CatalogBackend`].
pub struct CatalogStore<B> {
    backend: B,
    catalog: RwLock<Catalog>,
}

impl<B: CatalogBackend> CatalogStore<B> {
    /// Loads the backend's records into memory.
    pub fn open(backend: B) -> Result<Self> {
        let catalog = backend.load()?;
        debug!(
            backend = backend.name(),
            codebases = catalog.codebases.len(),
            versions = catalog.versions.len(),
            links = catalog.links.len(),
            "Loaded metadata"
        );
        Ok(Self {
            backend,
            catalog: RwLock::new(catalog),
        })
    }

    /// Applies a mutation under the write lock. `mutate` returns `None` for a
    /// no-op, which skips persistence.
    fn write<F>(&self, mutate: F) -> Result<bool>
    where
        F: FnOnce(&mut Catalog) -> Result<Option<Change>>,
    {
        let mut guard = self.catalog.write();
        let mut next = guard.clone();
        match mutate(&mut next)? {
            Some(change) => {
                self.backend.persist(&next, &change)?;
                *guard = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<B: CatalogBackend> MetadataStore for CatalogStore<B> {
    fn create_codebase(&self, codebase: &Codebase) -> Result<()> {
        self.write(|c| c.insert_codebase(codebase.clone()).map(Some))?;
        Ok(())
    }

    fn get_codebase(&self, id: &str) -> Result<Codebase> {
        self.catalog.read().codebase(id).cloned()
    }

    fn update_codebase(&self, codebase: &Codebase) -> Result<()> {
        self.write(|c| c.replace_codebase(codebase.clone()).map(Some))?;
        Ok(())
    }

    fn delete_codebase(&self, id: &str) -> Result<()> {
        self.write(|c| c.remove_codebase(id).map(Some))?;
        Ok(())
    }

    fn list_codebases(&self) -> Result<Vec<Codebase>> {
        Ok(self.catalog.read().codebases().cloned().collect())
    }

    fn create_version(&self, version: &Version, tree: &FileTree) -> Result<()> {
        self.write(|c| c.insert_version(version.clone(), tree.clone()).map(Some))?;
        Ok(())
    }

    fn get_version(&self, id: &str) -> Result<Version> {
        self.catalog.read().version(id).cloned()
    }

    fn find_version(&self, codebase_id: &str, branch: &str, label: &str) -> Result<Version> {
        self.catalog
            .read()
            .find_version(codebase_id, branch, label)
            .cloned()
    }

    fn get_file_tree(&self, tree_id: &str) -> Result<FileTree> {
        self.catalog.read().file_tree(tree_id).cloned()
    }

    fn latest_in_branch(
        &self,
        codebase_id: &str,
        branch: &str,
        exclude_id: &str,
    ) -> Result<Option<Version>> {
        Ok(self
            .catalog
            .read()
            .latest_in_branch(codebase_id, branch, Some(exclude_id))
            .cloned())
    }

    fn is_new_branch(&self, codebase_id: &str, branch: &str, exclude_id: &str) -> Result<bool> {
        Ok(self
            .catalog
            .read()
            .is_new_branch(codebase_id, branch, exclude_id))
    }

    fn latest_on_default_branch(&self, codebase_id: &str) -> Result<Option<Version>> {
        let catalog = self.catalog.read();
        let branch = catalog.default_branch(codebase_id);
        Ok(catalog.latest_in_branch(codebase_id, branch, None).cloned())
    }

    fn create_link(&self, link: &LineageLink) -> Result<bool> {
        self.write(|c| c.insert_link(link.clone()))
    }

    fn get_link(&self, child_version_id: &str) -> Result<Option<LineageLink>> {
        Ok(self.catalog.read().link_for_child(child_version_id).cloned())
    }

    fn graph_nodes(&self, codebase_id: &str) -> Result<Vec<Version>> {
        Ok(self
            .catalog
            .read()
            .versions_newest_first(codebase_id)
            .into_iter()
            .cloned()
            .collect())
    }

    fn graph_edges(&self, codebase_id: &str) -> Result<Vec<LineageLink>> {
        Ok(self
            .catalog
            .read()
            .links_for(codebase_id)
            .into_iter()
            .cloned()
            .collect())
    }

    fn branch_heads(&self, codebase_id: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.catalog.read().branch_heads(codebase_id))
    }

    fn get_graph_cache(&self, codebase_id: &str) -> Result<Vec<u8>> {
        let _guard = self.catalog.read();
        self.backend
            .read_cache(codebase_id)?
            .ok_or_else(|| VaultError::CacheNotFound(codebase_id.to_string()))
    }

    fn set_graph_cache(&self, codebase_id: &str, data: &[u8]) -> Result<()> {
        let guard = self.catalog.write();
        if !guard.codebases.contains_key(codebase_id) {
            return Err(VaultError::CodebaseNotFound(codebase_id.to_string()));
        }
        self.backend.write_cache(codebase_id, data)
    }
}

/// Opens the configured metadata backend rooted at `root`.
pub fn open_metadata_store(
    root: impl AsRef<Path>,
    backend: MetadataBackend,
) -> Result<Arc<dyn MetadataStore>> {
    let root = root.as_ref();
    let store: Arc<dyn MetadataStore> = match backend {
        MetadataBackend::Json => Arc::new(CatalogStore::open(JsonBackend::new(root)?)?),
        MetadataBackend::Redb => Arc::new(CatalogStore::open(RedbBackend::open(root)?)?),
    };
    Ok(store)
}
