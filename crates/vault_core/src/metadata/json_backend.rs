//! Reference metadata backend: one JSON document per collection.
//!
//! Layout under the metadata root:
//!
//! ```text
//! codebases.json        codebase id → codebase
//! versions.json         versions in record order
//! file_indexes.json     tree id → file tree
//! version_links.json    lineage links in record order
//! graph_cache/<id>.json serialized version graph per codebase
//! ```
//!
//! Every mutation rewrites the whole affected collection, so the cost of a
//! write grows with the collection. This is fine while the records fit in the
//! memory of a single process; larger deployments should use the redb backend.

use super::catalog::{Catalog, Change};
use super::CatalogBackend;
use crate::error::{Result, VaultError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const CODEBASES_FILE: &str = "codebases.json";
const VERSIONS_FILE: &str = "versions.json";
const FILE_INDEXES_FILE: &str = "file_indexes.json";
const LINKS_FILE: &str = "version_links.json";
const CACHE_DIR: &str = "graph_cache";

/// JSON-document metadata backend.
#[derive(Debug)]
pub struct JsonBackend {
    root: PathBuf,
}

impl JsonBackend {
    /// Creates a backend rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(CACHE_DIR))?;
        Ok(Self { root })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_path(&self, codebase_id: &str) -> Result<PathBuf> {
        if codebase_id.is_empty()
            || codebase_id.contains(['/', '\\'])
            || codebase_id.starts_with('.')
        {
            return Err(VaultError::InvalidInput(format!(
                "invalid codebase id '{}'",
                codebase_id
            )));
        }
        Ok(self.root.join(CACHE_DIR).join(format!("{}.json", codebase_id)))
    }

    fn load_collection<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.root.join(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&bytes).map_err(|e| VaultError::CorruptedMetadata {
            path,
            reason: e.to_string(),
        })
    }

    /// Serializes a collection into a temp file next to its final location.
    fn stage<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<Staged> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;
        Staged::write(self.root.join(name), &bytes)
    }

    fn stage_codebases(&self, next: &Catalog) -> Result<Staged> {
        self.stage(CODEBASES_FILE, &next.codebases)
    }

    fn stage_versions(&self, next: &Catalog) -> Result<Staged> {
        self.stage(VERSIONS_FILE, &next.versions)
    }

    fn stage_file_indexes(&self, next: &Catalog) -> Result<Staged> {
        self.stage(FILE_INDEXES_FILE, &next.file_indexes)
    }

    fn stage_links(&self, next: &Catalog) -> Result<Staged> {
        self.stage(LINKS_FILE, &next.links)
    }

    /// Renames staged files into place in order, then syncs the directory.
    fn commit(&self, staged: Vec<Staged>) -> Result<()> {
        let mut pending = staged.into_iter();
        while let Some(file) = pending.next() {
            if let Err(e) = file.commit() {
                pending.for_each(Staged::discard);
                return Err(e);
            }
        }
        sync_dir(&self.root);
        Ok(())
    }
}

impl CatalogBackend for JsonBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn load(&self) -> Result<Catalog> {
        Ok(Catalog::from_parts(
            self.load_collection(CODEBASES_FILE)?,
            self.load_collection(VERSIONS_FILE)?,
            self.load_collection(FILE_INDEXES_FILE)?,
            self.load_collection(LINKS_FILE)?,
        ))
    }

    fn persist(&self, next: &Catalog, change: &Change) -> Result<()> {
        let staged = match change {
            Change::CodebaseUpserted(_) => vec![self.stage_codebases(next)?],
            // File trees land before the versions that point at them.
            Change::VersionCreated { .. } => {
                let trees = self.stage_file_indexes(next)?;
                match self.stage_versions(next) {
                    Ok(versions) => vec![trees, versions],
                    Err(e) => {
                        trees.discard();
                        return Err(e);
                    }
                }
            }
            Change::LinkCreated(_) => vec![self.stage_links(next)?],
            Change::CodebaseDeleted { codebase_id, .. } => {
                let cache = self.cache_path(codebase_id)?;
                match fs::remove_file(&cache) {
                    Ok(()) => debug!(codebase_id = %codebase_id, "Removed graph cache"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }

                let mut staged = Vec::with_capacity(4);
                let stagers: [fn(&Self, &Catalog) -> Result<Staged>; 4] = [
                    Self::stage_links,
                    Self::stage_versions,
                    Self::stage_file_indexes,
                    Self::stage_codebases,
                ];
                for stage in stagers {
                    match stage(self, next) {
                        Ok(file) => staged.push(file),
                        Err(e) => {
                            staged.into_iter().for_each(Staged::discard);
                            return Err(e);
                        }
                    }
                }
                staged
            }
        };

        self.commit(staged)
    }

    fn read_cache(&self, codebase_id: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.cache_path(codebase_id)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_cache(&self, codebase_id: &str, data: &[u8]) -> Result<()> {
        let path = self.cache_path(codebase_id)?;
        Staged::write(path, data)?.commit()?;
        sync_dir(&self.root.join(CACHE_DIR));
        Ok(())
    }
}

/// A fully written and synced temp file waiting to be renamed into place.
#[derive(Debug)]
struct Staged {
    tmp: PathBuf,
    target: PathBuf,
}

impl Staged {
    fn write(target: PathBuf, bytes: &[u8]) -> Result<Self> {
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("collection");
        let tmp = target.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        Ok(Self { tmp, target })
    }

    fn commit(self) -> Result<()> {
        if let Err(e) = fs::rename(&self.tmp, &self.target) {
            let _ = fs::remove_file(&self.tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn discard(self) {
        let _ = fs::remove_file(&self.tmp);
    }
}

fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Ok(dir_file) = File::open(dir) {
            let _ = dir_file.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}
