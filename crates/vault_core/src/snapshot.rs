//! Snapshot pipeline: turns uploaded files into stored blobs plus a
//! version and file tree record.
//!
//! Files are processed in parallel on the rayon pool. Each file is hashed
//! over its original bytes, compressed unless it is an image, and stored
//! under `<codebase-name>/<hash>`, so identical content within a codebase
//! collapses to one blob. The first failing file fails the whole snapshot;
//! nothing is written to the metadata store by this module.

use crate::blob_store::BlobStore;
use crate::codec;
use crate::content_hash::ContentHash;
use crate::error::{Result, VaultError};
use crate::types::{FileEntry, FileKind, FileTree, Version, VersionStats};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// One file of a snapshot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Path relative to the project root.
    pub path: String,
    /// Original file content.
    pub content: Vec<u8>,
}

impl UploadedFile {
    /// Creates an uploaded file.
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Where a snapshot goes and how it is described.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotTarget<'a> {
    /// Owning codebase id.
    pub codebase_id: &'a str,
    /// Codebase name, used as the blob key prefix.
    pub codebase_name: &'a str,
    /// Branch of the new version.
    pub branch: &'a str,
    /// Label of the new version.
    pub label: &'a str,
    /// Snapshot message.
    pub message: &'a str,
    /// zstd level for compressed files.
    pub compression_level: i32,
}

/// Normalizes an uploaded path to a relative, slash-separated form.
///
/// Backslashes become slashes, `.` and empty segments are dropped. Absolute
/// paths and `..` segments are rejected.
///
/// # Examples
///
/// ```
/// use vault_core::snapshot::normalize_path;
///
/// assert_eq!(normalize_path("src\\main.rs").unwrap(), "src/main.rs");
/// assert_eq!(normalize_path("./a//b.txt").unwrap(), "a/b.txt");
/// assert!(normalize_path("../etc/passwd").is_err());
/// assert!(normalize_path("/abs").is_err());
/// ```
pub fn normalize_path(path: &str) -> Result<String> {
    let unified = path.replace('\\', "/");
    let invalid = |reason: &str| VaultError::InvalidInput(format!("file path '{}' {}", path, reason));

    if unified.starts_with('/') || unified.split('/').next().is_some_and(|s| s.ends_with(':')) {
        return Err(invalid("must be relative"));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(invalid("escapes the project root")),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(invalid("is empty"));
    }
    Ok(segments.join("/"))
}

/// Stores every file and assembles the resulting version and file tree.
///
/// Version and tree ids are random and assigned before any file is stored.
///
/// # Errors
///
/// Returns `InvalidInput` for an empty upload, an invalid path, a path
/// that occurs twice, or a file path that another path needs as a directory. Returns `PipelineFailed` wrapping the first per-file
/// failure; blobs already written by other files may remain, but no version
/// is produced.
pub fn create_snapshot(
    blobs: &dyn BlobStore,
    files: &[UploadedFile],
    target: &SnapshotTarget<'_>,
) -> Result<(Version, FileTree)> {
    if files.is_empty() {
        return Err(VaultError::InvalidInput(
            "a snapshot needs at least one file".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(files.len());
    let mut paths = Vec::with_capacity(files.len());
    for file in files {
        let path = normalize_path(&file.path)?;
        if !seen.insert(path.clone()) {
            return Err(VaultError::InvalidInput(format!(
                "file path '{}' appears more than once",
                path
            )));
        }
        paths.push(path);
    }
    for path in &paths {
        if let Some(parent) = ancestors(path).find(|a| seen.contains(*a)) {
            return Err(VaultError::InvalidInput(format!(
                "file path '{}' is also used as the directory of '{}'",
                parent, path
            )));
        }
    }

    let version_id = Uuid::new_v4().to_string();
    let tree_id = Uuid::new_v4().to_string();

    info!(
        codebase = target.codebase_name,
        branch = target.branch,
        label = target.label,
        files = files.len(),
        "Creating snapshot"
    );

    let entries: Vec<FileEntry> = files
        .par_iter()
        .zip(paths.par_iter())
        .map(|(file, path)| {
            store_file(blobs, target, path, &file.content).map_err(|e| VaultError::PipelineFailed {
                path: path.clone(),
                source: Box::new(e),
            })
        })
        .collect::<Result<_>>()?;

    let mut stats = VersionStats::default();
    for entry in &entries {
        stats.add_file(entry);
    }
    let stats = stats.finish();

    let now = Utc::now();
    let version = Version {
        id: version_id.clone(),
        codebase_id: target.codebase_id.to_string(),
        label: target.label.to_string(),
        branch: target.branch.to_string(),
        tree_id: tree_id.clone(),
        message: target.message.to_string(),
        created_at: now,
        stats,
    };
    let tree = FileTree {
        tree_id,
        version_id,
        files: entries,
        generated_at: now,
    };

    info!(
        version_id = %version.id,
        total_files = stats.total_files,
        total_size = stats.total_size,
        compressed_size = stats.compressed_size,
        "Snapshot content stored"
    );

    Ok((version, tree))
}

/// Proper ancestor directories of a normalized path, shortest first.
fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(i, _)| &path[..i])
}

/// Hashes, encodes and stores one file.
fn store_file(
    blobs: &dyn BlobStore,
    target: &SnapshotTarget<'_>,
    path: &str,
    content: &[u8],
) -> Result<FileEntry> {
    let kind = FileKind::classify(path);
    let hash = ContentHash::of(content);
    let storage_key = hash.storage_key(target.codebase_name);
    let stored = codec::encode(kind, content, target.compression_level)?;

    blobs.put(&storage_key, &stored)?;
    debug!(path, key = %storage_key, kind = %kind, size = content.len(), "Stored file");

    Ok(FileEntry {
        path: path.to_string(),
        hash,
        size: content.len() as u64,
        compressed_size: stored.len() as u64,
        storage_key,
        kind,
    })
}
