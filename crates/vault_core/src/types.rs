//! Core data types for the snapshot archive.

use crate::content_hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Extensions stored verbatim. Everything else is compressed.
///
/// Part of the stored-record contract: clients read the resulting `type`
/// field to decide whether a blob needs decompression.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff"];

/// A project whose states are archived as snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codebase {
    /// Unique, immutable identifier.
    pub id: String,
    /// Display name; also the blob key prefix for this codebase's content.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Default branch; new branches fork from its latest version.
    #[serde(rename = "branch")]
    pub default_branch: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Bumped on every snapshot.
    pub updated_at: DateTime<Utc>,
}

/// Aggregate size statistics for one version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionStats {
    /// Number of files in the snapshot.
    pub total_files: u64,
    /// Sum of original file sizes in bytes.
    pub total_size: u64,
    /// Sum of stored (possibly compressed) sizes in bytes.
    pub compressed_size: u64,
    /// `compressed_size / total_size`, or 0 when `total_size` is 0.
    pub compression_ratio: f64,
}

impl VersionStats {
    /// Accumulates one stored file.
    pub fn add_file(&mut self, file: &FileEntry) {
        self.total_files += 1;
        self.total_size += file.size;
        self.compressed_size += file.compressed_size;
    }

    /// Recomputes the compression ratio from the accumulated sizes.
    pub fn finish(mut self) -> Self {
        self.compression_ratio = if self.total_size == 0 {
            0.0
        } else {
            self.compressed_size as f64 / self.total_size as f64
        };
        self
    }
}

/// One captured state of a codebase on a branch.
///
/// Immutable once created. Lookups by `(codebase_id, branch, label)` resolve
/// to the most recently created match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Unique identifier.
    pub id: String,
    /// Owning codebase.
    pub codebase_id: String,
    /// User-supplied label, not required to be unique.
    #[serde(rename = "version")]
    pub label: String,
    /// Branch this version belongs to.
    pub branch: String,
    /// File tree owned 1:1 by this version.
    pub tree_id: String,
    /// Snapshot message.
    #[serde(default)]
    pub message: String,
    /// Creation time; the ordering key for lineage decisions.
    pub created_at: DateTime<Utc>,
    /// Size statistics.
    pub stats: VersionStats,
}

impl Version {
    /// Returns the `(branch, label)` reference for this version.
    pub fn reference(&self) -> VersionRef {
        VersionRef::new(&self.branch, &self.label)
    }
}

/// Storage treatment of a file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Stored verbatim.
    Image,
    /// Compressed before storage.
    Other,
}

impl FileKind {
    /// Classifies a relative path by its (case-insensitive) extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use vault_core::FileKind;
    ///
    /// assert_eq!(FileKind::classify("assets/Logo.PNG"), FileKind::Image);
    /// assert_eq!(FileKind::classify("src/main.rs"), FileKind::Other);
    /// assert_eq!(FileKind::classify("Makefile"), FileKind::Other);
    /// ```
    pub fn classify(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            _ => Self::Other,
        }
    }

    /// Returns true if blobs of this kind are stored compressed.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Other)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// File index entry: where one file of a version lives in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative, slash-normalized path.
    pub path: String,
    /// Hash of the original bytes.
    pub hash: ContentHash,
    /// Original size in bytes.
    pub size: u64,
    /// Stored size in bytes.
    pub compressed_size: u64,
    /// Blob key: `<codebase-name>/<hash>`.
    pub storage_key: String,
    /// Storage treatment.
    #[serde(rename = "type")]
    pub kind: FileKind,
}

/// The set of file entries captured by one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTree {
    /// Tree identifier (matches `Version::tree_id`).
    pub tree_id: String,
    /// Owning version.
    pub version_id: String,
    /// File entries.
    pub files: Vec<FileEntry>,
    /// When the tree was assembled.
    pub generated_at: DateTime<Utc>,
}

/// Kind of parent→child relationship between versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkageType {
    /// Same-branch, time-ordered succession.
    Sequential,
    /// Fork point of a branch from another branch or version.
    BranchFrom,
}

impl fmt::Display for LinkageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::BranchFrom => write!(f, "branch_from"),
        }
    }
}

/// Persisted lineage link. At most one exists per child version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageLink {
    /// Link identifier.
    pub id: String,
    /// Owning codebase.
    pub codebase_id: String,
    /// Branch of the child version.
    pub branch: String,
    /// Child version id.
    pub child_version_id: String,
    /// Parent version id.
    pub parent_version_id: String,
    /// Relationship kind.
    pub linkage_type: LinkageType,
}

/// Locates a version within a codebase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRef {
    /// Branch name.
    pub branch: String,
    /// Version label.
    #[serde(rename = "version")]
    pub label: String,
}

impl VersionRef {
    /// Creates a reference from branch and label.
    pub fn new(branch: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.branch, self.label)
    }
}

/// Graph node: the renderable projection of a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionNode {
    /// Version id.
    pub id: String,
    /// Version label.
    #[serde(rename = "version")]
    pub label: String,
    /// Branch.
    pub branch: String,
    /// Snapshot message.
    pub message: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Size statistics.
    pub stats: VersionStats,
}

impl From<&Version> for VersionNode {
    fn from(v: &Version) -> Self {
        Self {
            id: v.id.clone(),
            label: v.label.clone(),
            branch: v.branch.clone(),
            message: v.message.clone(),
            created_at: v.created_at,
            stats: v.stats,
        }
    }
}

/// Graph edge from parent to child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEdge {
    /// Parent version id.
    pub from: String,
    /// Child version id.
    pub to: String,
    /// Relationship kind.
    pub linkage_type: LinkageType,
}

impl From<&LineageLink> for VersionEdge {
    fn from(link: &LineageLink) -> Self {
        Self {
            from: link.parent_version_id.clone(),
            to: link.child_version_id.clone(),
            linkage_type: link.linkage_type,
        }
    }
}

/// Derived view of all versions and lineage links of one codebase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionGraph {
    /// Owning codebase.
    pub codebase_id: String,
    /// Versions, newest first.
    pub nodes: Vec<VersionNode>,
    /// Lineage edges in link record order.
    pub edges: Vec<VersionEdge>,
    /// Branch name → id of the branch head.
    pub refs: BTreeMap<String, String>,
}
