//! Lineage engine: links new versions to their parent and builds the
//! per-codebase version graph.
//!
//! # Linking
//!
//! Exactly one strategy applies to a freshly created version:
//!
//! 1. An explicit `branch_from` reference links to the named version as
//!    [`LinkageType::BranchFrom`].
//! 2. On a branch with no other versions, the latest version of the default
//!    branch becomes the fork point ([`LinkageType::BranchFrom`]). With no such
//!    version the new version is a lineage root and no link is created.
//! 3. Otherwise the latest other version on the same branch becomes the
//!    parent ([`LinkageType::Sequential`]).
//!
//! # Graph cache
//!
//! [`get_graph`] serves the cached graph whenever one exists and only builds
//! it on a miss. Automatic linking never refreshes the cache, so a cached
//! graph can lag behind the newest snapshots until [`rebuild_graph`] runs.
//! Manual links schedule a background rebuild through [`schedule_rebuild`];
//! the caller does not wait for it.
//!
//! Rebuilds are serialized process-wide. Each one reads the metadata only
//! after the previous write to the cache has landed, so a background rebuild
//! that finishes late can never replace a newer graph with an older one.

use crate::error::{Result, VaultError};
use crate::metadata::MetadataStore;
use crate::types::{
    LineageLink, LinkageType, Version, VersionEdge, VersionGraph, VersionNode, VersionRef,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The strategy chosen for a new version.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkDecision {
    /// Link to an explicitly named version.
    Explicit(Version),
    /// First version of a branch: fork from the default branch head.
    Fork(Version),
    /// Follow the previous version of the same branch.
    Sequential(Version),
    /// No parent exists.
    Root,
}

impl LinkDecision {
    /// The chosen parent, if any.
    pub fn parent(&self) -> Option<&Version> {
        match self {
            Self::Explicit(v) | Self::Fork(v) | Self::Sequential(v) => Some(v),
            Self::Root => None,
        }
    }

    /// Link type recorded for this decision.
    pub fn linkage_type(&self) -> Option<LinkageType> {
        match self {
            Self::Explicit(_) | Self::Fork(_) => Some(LinkageType::BranchFrom),
            Self::Sequential(_) => Some(LinkageType::Sequential),
            Self::Root => None,
        }
    }
}

/// Chooses the linking strategy for `version`, which must already be stored.
///
/// # Errors
///
/// Returns `VersionNotFound` if `branch_from` names a version that does not
/// exist, or any metadata error.
pub fn decide(
    metadata: &dyn MetadataStore,
    version: &Version,
    branch_from: Option<&VersionRef>,
) -> Result<LinkDecision> {
    if let Some(reference) = branch_from {
        let parent = metadata.find_version(&version.codebase_id, &reference.branch, &reference.label)?;
        return Ok(LinkDecision::Explicit(parent));
    }

    if metadata.is_new_branch(&version.codebase_id, &version.branch, &version.id)? {
        return Ok(match metadata.latest_on_default_branch(&version.codebase_id)? {
            Some(parent) if parent.id != version.id => LinkDecision::Fork(parent),
            _ => LinkDecision::Root,
        });
    }

    match metadata.latest_in_branch(&version.codebase_id, &version.branch, &version.id)? {
        Some(parent) => Ok(LinkDecision::Sequential(parent)),
        None => Ok(LinkDecision::Root),
    }
}

/// Links a freshly stored version to its parent.
///
/// Returns the version's parent link, or `None` for a lineage root. If the
/// version already had a parent, that existing link is returned unchanged.
/// The graph cache is not touched.
pub fn link_new_version(
    metadata: &dyn MetadataStore,
    version: &Version,
    branch_from: Option<&VersionRef>,
) -> Result<Option<LineageLink>> {
    let decision = decide(metadata, version, branch_from)?;
    let (parent, linkage_type) = match (decision.parent(), decision.linkage_type()) {
        (Some(parent), Some(linkage_type)) => (parent, linkage_type),
        _ => {
            debug!(version_id = %version.id, branch = %version.branch, "Version is a lineage root");
            return Ok(None);
        }
    };

    let link = LineageLink {
        id: Uuid::new_v4().to_string(),
        codebase_id: version.codebase_id.clone(),
        branch: version.branch.clone(),
        child_version_id: version.id.clone(),
        parent_version_id: parent.id.clone(),
        linkage_type,
    };

    if metadata.create_link(&link)? {
        info!(
            child = %link.child_version_id,
            parent = %link.parent_version_id,
            linkage_type = %linkage_type,
            "Linked version"
        );
        Ok(Some(link))
    } else {
        metadata.get_link(&version.id)
    }
}

/// Records a user-requested link between two stored versions.
///
/// Returns false, changing nothing, if the child already has a parent. A
/// cache rebuild is scheduled in the background either way; the cache may
/// still be stale when this returns.
pub fn link_manually(
    metadata: Arc<dyn MetadataStore>,
    codebase_id: &str,
    child: &Version,
    parent: &Version,
    linkage_type: LinkageType,
) -> Result<bool> {
    for v in [child, parent] {
        if v.codebase_id != codebase_id {
            return Err(VaultError::InvalidInput(format!(
                "version {} does not belong to codebase {}",
                v.id, codebase_id
            )));
        }
    }

    let link = LineageLink {
        id: Uuid::new_v4().to_string(),
        codebase_id: codebase_id.to_string(),
        branch: child.branch.clone(),
        child_version_id: child.id.clone(),
        parent_version_id: parent.id.clone(),
        linkage_type,
    };
    let created = metadata.create_link(&link)?;
    if !created {
        debug!(child = %child.id, "Child already linked, keeping existing parent");
    }

    schedule_rebuild(metadata, codebase_id.to_string());
    Ok(created)
}

/// Builds the graph of a codebase from the metadata store.
pub fn build_graph(metadata: &dyn MetadataStore, codebase_id: &str) -> Result<VersionGraph> {
    let nodes = metadata
        .graph_nodes(codebase_id)?
        .iter()
        .map(VersionNode::from)
        .collect();
    let edges = metadata
        .graph_edges(codebase_id)?
        .iter()
        .map(VersionEdge::from)
        .collect();
    let refs = metadata.branch_heads(codebase_id)?;

    Ok(VersionGraph {
        codebase_id: codebase_id.to_string(),
        nodes,
        edges,
        refs,
    })
}

/// Serializes a graph into its cached form.
pub fn encode_graph(graph: &VersionGraph) -> Result<Vec<u8>> {
    serde_json::to_vec(graph).map_err(|e| VaultError::Serialization(e.to_string()))
}

/// Parses a cached graph.
pub fn decode_graph(bytes: &[u8]) -> Result<VersionGraph> {
    serde_json::from_slice(bytes).map_err(|e| VaultError::Deserialization(e.to_string()))
}

/// Held for the whole read-build-write of a cache rebuild.
static REBUILD_LOCK: Mutex<()> = Mutex::new(());

/// Rebuilds the graph of a codebase and stores it as the cache.
///
/// With no intervening writes, two rebuilds produce identical cache bytes.
pub fn rebuild_graph(metadata: &dyn MetadataStore, codebase_id: &str) -> Result<VersionGraph> {
    let _guard = REBUILD_LOCK.lock();
    let graph = build_graph(metadata, codebase_id)?;
    metadata.set_graph_cache(codebase_id, &encode_graph(&graph)?)?;
    debug!(
        codebase_id,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Rebuilt version graph"
    );
    Ok(graph)
}

/// Returns the cached graph bytes, building the cache on a miss.
pub fn get_graph(metadata: &dyn MetadataStore, codebase_id: &str) -> Result<Vec<u8>> {
    match metadata.get_graph_cache(codebase_id) {
        Ok(bytes) => Ok(bytes),
        Err(VaultError::CacheNotFound(_)) => {
            rebuild_graph(metadata, codebase_id)?;
            metadata.get_graph_cache(codebase_id)
        }
        Err(e) => Err(e),
    }
}

/// Rebuilds the cache of a codebase on the rayon pool without waiting.
///
/// Failures are logged; nothing is reported back to the caller.
pub fn schedule_rebuild(metadata: Arc<dyn MetadataStore>, codebase_id: String) {
    rayon::spawn(move || {
        if let Err(e) = rebuild_graph(metadata.as_ref(), &codebase_id) {
            warn!(codebase_id = %codebase_id, error = %e, "Background graph rebuild failed");
        }
    });
}
