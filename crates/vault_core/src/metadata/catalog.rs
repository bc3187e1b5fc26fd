//! In-memory record set shared by every metadata backend.
//!
//! All query logic lives here so that backends only differ in how they load
//! and persist records.

use crate::error::{Result, VaultError};
use crate::types::{Codebase, FileTree, LineageLink, Version};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Branch used for fork detection when the codebase record is unavailable.
pub const FALLBACK_DEFAULT_BRANCH: &str = "main";

/// Every metadata record of one store.
///
/// Versions and links are kept in record (insertion) order, which breaks
/// timestamp ties: among versions with equal `created_at`, the one recorded
/// last counts as the most recent.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub(crate) codebases: BTreeMap<String, Codebase>,
    pub(crate) versions: Vec<Version>,
    pub(crate) file_indexes: BTreeMap<String, FileTree>,
    pub(crate) links: Vec<LineageLink>,
    version_pos: HashMap<String, usize>,
    linked_children: HashSet<String>,
}

/// A mutation applied to a catalog, handed to the backend for persistence.
#[derive(Debug, Clone)]
pub enum Change {
    /// A codebase was created or updated.
    CodebaseUpserted(Codebase),
    /// A version and its file tree were created.
    VersionCreated {
        /// New version
        version: Version,
        /// Its file tree
        tree: FileTree,
    },
    /// A lineage link was created.
    LinkCreated(LineageLink),
    /// A codebase and every record referencing it were removed.
    CodebaseDeleted {
        /// Deleted codebase
        codebase_id: String,
        /// Removed version ids
        version_ids: Vec<String>,
        /// Removed tree ids
        tree_ids: Vec<String>,
        /// Removed link ids
        link_ids: Vec<String>,
    },
}

impl Catalog {
    /// Assembles a catalog from loaded collections and builds its indexes.
    pub fn from_parts(
        codebases: BTreeMap<String, Codebase>,
        versions: Vec<Version>,
        file_indexes: BTreeMap<String, FileTree>,
        links: Vec<LineageLink>,
    ) -> Self {
        let mut catalog = Self {
            codebases,
            versions,
            file_indexes,
            links,
            version_pos: HashMap::new(),
            linked_children: HashSet::new(),
        };
        catalog.reindex();
        catalog
    }

    fn reindex(&mut self) {
        self.version_pos = self
            .versions
            .iter()
            .enumerate()
            .map(|(i, v)| (v.id.clone(), i))
            .collect();
        self.linked_children = self
            .links
            .iter()
            .map(|l| l.child_version_id.clone())
            .collect();
    }

    // Mutations. Each validates first and leaves the catalog untouched on error.

    pub(crate) fn insert_codebase(&mut self, codebase: Codebase) -> Result<Change> {
        if self.codebases.contains_key(&codebase.id) {
            return Err(VaultError::CodebaseExists(codebase.id));
        }
        // Names prefix blob keys, so two codebases may not share one.
        if self.codebases.values().any(|c| c.name == codebase.name) {
            return Err(VaultError::CodebaseExists(codebase.name));
        }
        self.codebases.insert(codebase.id.clone(), codebase.clone());
        Ok(Change::CodebaseUpserted(codebase))
    }

    pub(crate) fn replace_codebase(&mut self, codebase: Codebase) -> Result<Change> {
        match self.codebases.get_mut(&codebase.id) {
            Some(slot) => *slot = codebase.clone(),
            None => return Err(VaultError::CodebaseNotFound(codebase.id)),
        }
        Ok(Change::CodebaseUpserted(codebase))
    }

    pub(crate) fn insert_version(&mut self, version: Version, tree: FileTree) -> Result<Change> {
        if !self.codebases.contains_key(&version.codebase_id) {
            return Err(VaultError::CodebaseNotFound(version.codebase_id));
        }
        if self.version_pos.contains_key(&version.id) {
            return Err(VaultError::VersionExists(version.id));
        }
        if tree.tree_id != version.tree_id || tree.version_id != version.id {
            return Err(VaultError::InvalidInput(format!(
                "file tree {} does not belong to version {}",
                tree.tree_id, version.id
            )));
        }
        if self.file_indexes.contains_key(&tree.tree_id) {
            return Err(VaultError::InvalidInput(format!(
                "file tree {} already exists",
                tree.tree_id
            )));
        }

        self.version_pos
            .insert(version.id.clone(), self.versions.len());
        self.versions.push(version.clone());
        self.file_indexes.insert(tree.tree_id.clone(), tree.clone());
        Ok(Change::VersionCreated { version, tree })
    }

    /// Returns `None` when the child already has a parent link.
    pub(crate) fn insert_link(&mut self, link: LineageLink) -> Result<Option<Change>> {
        if self.linked_children.contains(&link.child_version_id) {
            return Ok(None);
        }
        for id in [&link.child_version_id, &link.parent_version_id] {
            if !self.version_pos.contains_key(id) {
                return Err(VaultError::VersionIdNotFound(id.clone()));
            }
        }
        if link.child_version_id == link.parent_version_id {
            return Err(VaultError::InvalidInput(format!(
                "version {} cannot be its own parent",
                link.child_version_id
            )));
        }

        self.linked_children.insert(link.child_version_id.clone());
        self.links.push(link.clone());
        Ok(Some(Change::LinkCreated(link)))
    }

    pub(crate) fn remove_codebase(&mut self, codebase_id: &str) -> Result<Change> {
        if self.codebases.remove(codebase_id).is_none() {
            return Err(VaultError::CodebaseNotFound(codebase_id.to_string()));
        }

        let (removed, kept): (Vec<Version>, Vec<Version>) = std::mem::take(&mut self.versions)
            .into_iter()
            .partition(|v| v.codebase_id == codebase_id);
        self.versions = kept;

        let tree_ids: Vec<String> = removed.iter().map(|v| v.tree_id.clone()).collect();
        for tree_id in &tree_ids {
            self.file_indexes.remove(tree_id);
        }

        let (removed_links, kept_links): (Vec<LineageLink>, Vec<LineageLink>) =
            std::mem::take(&mut self.links)
                .into_iter()
                .partition(|l| l.codebase_id == codebase_id);
        self.links = kept_links;

        self.reindex();

        Ok(Change::CodebaseDeleted {
            codebase_id: codebase_id.to_string(),
            version_ids: removed.into_iter().map(|v| v.id).collect(),
            tree_ids,
            link_ids: removed_links.into_iter().map(|l| l.id).collect(),
        })
    }

    // Queries.

    pub(crate) fn codebase(&self, id: &str) -> Result<&Codebase> {
        self.codebases
            .get(id)
            .ok_or_else(|| VaultError::CodebaseNotFound(id.to_string()))
    }

    pub(crate) fn codebases(&self) -> impl Iterator<Item = &Codebase> {
        self.codebases.values()
    }

    pub(crate) fn version(&self, id: &str) -> Result<&Version> {
        self.version_pos
            .get(id)
            .and_then(|&i| self.versions.get(i))
            .ok_or_else(|| VaultError::VersionIdNotFound(id.to_string()))
    }

    /// Versions of a codebase, newest first; equal timestamps list the later record first.
    pub(crate) fn versions_newest_first(&self, codebase_id: &str) -> Vec<&Version> {
        let mut versions: Vec<&Version> = self
            .versions
            .iter()
            .rev()
            .filter(|v| v.codebase_id == codebase_id)
            .collect();
        versions.sort_by(|a, b| newest_first(a, b));
        versions
    }

    pub(crate) fn find_version(&self, codebase_id: &str, branch: &str, label: &str) -> Result<&Version> {
        self.versions_newest_first(codebase_id)
            .into_iter()
            .find(|v| v.branch == branch && v.label == label)
            .ok_or_else(|| VaultError::VersionNotFound {
                codebase_id: codebase_id.to_string(),
                branch: branch.to_string(),
                label: label.to_string(),
            })
    }

    pub(crate) fn file_tree(&self, tree_id: &str) -> Result<&FileTree> {
        self.file_indexes
            .get(tree_id)
            .ok_or_else(|| VaultError::TreeNotFound(tree_id.to_string()))
    }

    pub(crate) fn latest_in_branch(
        &self,
        codebase_id: &str,
        branch: &str,
        exclude_id: Option<&str>,
    ) -> Option<&Version> {
        self.versions_newest_first(codebase_id)
            .into_iter()
            .find(|v| v.branch == branch && Some(v.id.as_str()) != exclude_id)
    }

    pub(crate) fn is_new_branch(&self, codebase_id: &str, branch: &str, exclude_id: &str) -> bool {
        !self
            .versions
            .iter()
            .any(|v| v.codebase_id == codebase_id && v.branch == branch && v.id != exclude_id)
    }

    pub(crate) fn default_branch(&self, codebase_id: &str) -> &str {
        self.codebases
            .get(codebase_id)
            .map(|c| c.default_branch.as_str())
            .unwrap_or(FALLBACK_DEFAULT_BRANCH)
    }

    pub(crate) fn link_for_child(&self, child_version_id: &str) -> Option<&LineageLink> {
        if !self.linked_children.contains(child_version_id) {
            return None;
        }
        self.links
            .iter()
            .find(|l| l.child_version_id == child_version_id)
    }

    pub(crate) fn links_for(&self, codebase_id: &str) -> Vec<&LineageLink> {
        self.links
            .iter()
            .filter(|l| l.codebase_id == codebase_id)
            .collect()
    }

    /// Branch name → id of its most recently created version.
    pub(crate) fn branch_heads(&self, codebase_id: &str) -> BTreeMap<String, String> {
        let mut heads = BTreeMap::new();
        for v in self.versions_newest_first(codebase_id) {
            heads
                .entry(v.branch.clone())
                .or_insert_with(|| v.id.clone());
        }
        heads
    }
}

fn newest_first(a: &Version, b: &Version) -> Ordering {
    b.created_at.cmp(&a.created_at)
}
