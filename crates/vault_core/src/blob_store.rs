//! Key/value blob storage for file content.

use crate::error::{Result, VaultError};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Opaque object storage addressed by string keys.
///
/// Keys are slash-separated relative names such as `<codebase>/<hash>`.
/// Implementations provide no locking: callers must not write two different
/// payloads under one key at the same time. Content-derived keys make
/// concurrent writes of the same key idempotent.
pub trait BlobStore: Send + Sync {
    /// Creates or overwrites the object stored under `key`.
    ///
    /// The write is all-or-nothing from the caller's point of view.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Returns the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `BlobNotFound` if no object is stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Removes every object whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrefix` for an empty prefix or one that does not stay
    /// nested under the store root; nothing is deleted in that case.
    fn delete_with_prefix(&self, prefix: &str) -> Result<()>;
}

/// Blob store backed by a directory on the local filesystem.
///
/// Object keys map directly to relative file paths under the root, so the key
/// `proj/3f2a...` is stored at `<root>/proj/3f2a...`. Writes go through a
/// temp file, fsync and rename.
///
/// # Examples
///
/// ```
/// use vault_core::{BlobStore, LocalBlobStore};
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let store = LocalBlobStore::new(tmp.path().join("objects")).unwrap();
///
/// store.put("proj/abc", b"hello world").unwrap();
/// assert_eq!(store.get("proj/abc").unwrap(), b"hello world");
///
/// store.delete_with_prefix("proj/").unwrap();
/// assert!(store.get("proj/abc").is_err());
/// ```
#[derive(Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checks whether an object exists under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.object_path(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Maps a key to its file path, rejecting keys that would leave the root.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let segments = split_key(key)?;
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(VaultError::InvalidInput(format!("invalid blob key '{}'", key)));
        }

        let mut path = self.root.clone();
        for segment in segments {
            path.push(segment);
        }
        Ok(path)
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        let dir = path
            .parent()
            .ok_or_else(|| VaultError::InvalidInput(format!("invalid blob key '{}'", key)))?;

        fs::create_dir_all(dir)?;

        // Unique temp name so concurrent writers of the same key never share it.
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("blob");
        let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        #[cfg(unix)]
        {
            if let Ok(dir_file) = File::open(dir) {
                let _ = dir_file.sync_all();
            }
        }

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(VaultError::BlobNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_with_prefix(&self, prefix: &str) -> Result<()> {
        let reject = |reason: &str| VaultError::InvalidPrefix {
            prefix: prefix.to_string(),
            reason: reason.to_string(),
        };

        if prefix.trim().is_empty() {
            return Err(reject("prefix is empty"));
        }

        let segments = split_key(prefix).map_err(|_| reject("prefix escapes the store root"))?;
        // A trailing slash leaves an empty last segment: the whole directory goes.
        let (stem, dirs) = match segments.split_last() {
            Some((stem, dirs)) => (*stem, dirs),
            None => return Err(reject("prefix resolves to the store root")),
        };
        if dirs.iter().any(|s| s.is_empty()) {
            return Err(reject("prefix contains an empty path segment"));
        }

        let mut parent = self.root.clone();
        for dir in dirs {
            parent.push(dir);
        }

        if stem.is_empty() {
            if parent == self.root {
                return Err(reject("prefix resolves to the store root"));
            }
            debug!(prefix, path = %parent.display(), "Deleting blob directory");
            return remove_path(&parent);
        }

        let entries = match fs::read_dir(&parent) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let matches = entry
                .file_name()
                .to_str()
                .map(|name| name.starts_with(stem))
                .unwrap_or(false);
            if matches {
                debug!(prefix, path = %entry.path().display(), "Deleting blob entry");
                remove_path(&entry.path())?;
            }
        }

        Ok(())
    }
}

/// Splits a key into path segments, refusing anything that could escape the root.
fn split_key(key: &str) -> Result<Vec<&str>> {
    let invalid = || VaultError::InvalidInput(format!("blob key '{}' escapes the store root", key));

    if key.starts_with('/') || key.contains('\\') {
        return Err(invalid());
    }

    let segments: Vec<&str> = key.split('/').collect();
    for segment in &segments {
        match Path::new(segment).components().next() {
            None => {}
            Some(Component::Normal(_)) if !segment.contains(':') => {}
            _ => return Err(invalid()),
        }
        if *segment == "." || *segment == ".." {
            return Err(invalid());
        }
    }

    Ok(segments)
}

/// Removes a file or directory tree; absent paths are not an error.
fn remove_path(path: &Path) -> Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
