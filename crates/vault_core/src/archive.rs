//! Archive engine: rebuilds the files of a version from stored blobs.
//!
//! Whole-version archives are materialized into a private temporary
//! directory first and then walked into a zip container. The temporary
//! directory is removed when the call returns, whether it succeeds or not.

use crate::blob_store::BlobStore;
use crate::codec;
use crate::content_hash::ContentHash;
use crate::error::{Result, VaultError};
use crate::metadata::MetadataStore;
use crate::snapshot::normalize_path;
use crate::types::{FileEntry, FileTree, Version};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Resolves `(codebase, branch, label)` to a version and its file tree.
pub fn resolve(
    metadata: &dyn MetadataStore,
    codebase_id: &str,
    branch: &str,
    label: &str,
) -> Result<(Version, FileTree)> {
    let version = metadata.find_version(codebase_id, branch, label)?;
    let tree = metadata.get_file_tree(&version.tree_id)?;
    Ok((version, tree))
}

/// Fetches one file and returns its original bytes.
///
/// # Errors
///
/// Fails if the blob is missing, cannot be decoded, or does not hash to the
/// recorded content hash.
pub fn fetch_file(blobs: &dyn BlobStore, entry: &FileEntry) -> Result<Vec<u8>> {
    let stored = blobs.get(&entry.storage_key)?;
    let content = codec::decode(entry.kind, stored)?;

    let actual = ContentHash::of(&content);
    if actual != entry.hash {
        return Err(VaultError::Archive(format!(
            "content of '{}' hashes to {}, expected {}",
            entry.path, actual, entry.hash
        )));
    }
    Ok(content)
}

/// Builds a zip of every file in a version.
///
/// Files are fetched and written in parallel; the first failure aborts the
/// archive and no zip is produced.
pub fn archive_version(
    metadata: &dyn MetadataStore,
    blobs: &dyn BlobStore,
    codebase_id: &str,
    branch: &str,
    label: &str,
) -> Result<Vec<u8>> {
    let (version, tree) = resolve(metadata, codebase_id, branch, label)?;
    info!(
        version_id = %version.id,
        files = tree.files.len(),
        "Archiving version"
    );

    let workdir = TempDir::new()?;
    materialize(blobs, &tree.files, workdir.path())?;
    let bytes = zip_directory(workdir.path())?;

    debug!(version_id = %version.id, bytes = bytes.len(), "Archive ready");
    Ok(bytes)
}

/// Returns the original bytes of one file of a version.
///
/// # Errors
///
/// Returns `FileNotFound` if `path` is not part of the version.
pub fn get_single_file(
    metadata: &dyn MetadataStore,
    blobs: &dyn BlobStore,
    codebase_id: &str,
    branch: &str,
    label: &str,
    path: &str,
) -> Result<Vec<u8>> {
    let wanted = normalize_path(path)?;
    let (_, tree) = resolve(metadata, codebase_id, branch, label)?;

    let entry = tree
        .files
        .iter()
        .find(|f| f.path == wanted)
        .ok_or_else(|| VaultError::FileNotFound {
            path: wanted.clone(),
            label: label.to_string(),
        })?;

    fetch_file(blobs, entry)
}

/// Writes every file under `root`, in parallel.
fn materialize(blobs: &dyn BlobStore, files: &[FileEntry], root: &Path) -> Result<()> {
    files.par_iter().try_for_each(|entry| {
        write_entry(blobs, entry, root).map_err(|e| VaultError::PipelineFailed {
            path: entry.path.clone(),
            source: Box::new(e),
        })
    })
}

fn write_entry(blobs: &dyn BlobStore, entry: &FileEntry, root: &Path) -> Result<()> {
    let relative = normalize_path(&entry.path)?;
    let content = fetch_file(blobs, entry)?;

    let target = relative.split('/').fold(root.to_path_buf(), |p, s| p.join(s));
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(&target)?;
    file.write_all(&content)?;
    Ok(())
}

/// Streams every regular file under `root` into a zip, using slash paths
/// relative to `root`.
fn zip_directory(root: &Path) -> Result<Vec<u8>> {
    let zip_err = |e: zip::result::ZipError| VaultError::Archive(e.to_string());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| VaultError::Archive(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| VaultError::Archive(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(name, options).map_err(zip_err)?;
        let mut source = File::open(entry.path())?;
        std::io::copy(&mut source, &mut zip)?;
    }

    let cursor = zip.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}
