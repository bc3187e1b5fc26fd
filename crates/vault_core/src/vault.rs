//! Service handle providing the main snapshot archive API.

use crate::archive;
use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::lineage;
use crate::provider::ProviderManager;
use crate::snapshot::{self, SnapshotTarget, UploadedFile};
use crate::types::{Codebase, FileTree, LineageLink, LinkageType, Version, VersionGraph, VersionRef};
use chrono::Utc;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Default branch for new codebases and snapshots.
pub const DEFAULT_BRANCH: &str = "main";

/// A request to snapshot a codebase.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    /// Version label.
    pub label: String,
    /// Branch of the new version.
    pub branch: String,
    /// Snapshot message.
    pub message: String,
    /// Uploaded files.
    pub files: Vec<UploadedFile>,
    /// Explicit fork point for the new version.
    pub branch_from: Option<VersionRef>,
    /// Whether to link the version into the lineage graph.
    pub auto_linkage: bool,
}

impl SnapshotRequest {
    /// A request on `branch` with label `label`, auto-linkage enabled.
    pub fn new(branch: impl Into<String>, label: impl Into<String>, files: Vec<UploadedFile>) -> Self {
        Self {
            label: label.into(),
            branch: branch.into(),
            message: String::new(),
            files,
            branch_from: None,
            auto_linkage: true,
        }
    }

    /// Sets the snapshot message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Forks the new version from an explicit `(branch, label)`.
    pub fn branch_from(mut self, reference: VersionRef) -> Self {
        self.branch_from = Some(reference);
        self
    }

    /// Enables or disables automatic lineage linking.
    pub fn auto_linkage(mut self, enabled: bool) -> Self {
        self.auto_linkage = enabled;
        self
    }
}

/// Result of a successful snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotOutcome {
    /// The codebase, with its bumped `updated_at`.
    pub codebase: Codebase,
    /// The new version.
    pub version: Version,
    /// Its file tree.
    pub file_tree: FileTree,
    /// The version graph as served by the cache. It may not include the new
    /// version yet.
    pub graph: Option<VersionGraph>,
    /// The new version's parent link, if one exists.
    pub link: Option<LineageLink>,
    /// Why linking failed, when it did. The snapshot is committed regardless.
    pub link_error: Option<String>,
}

/// A zip of a whole version.
#[derive(Debug, Clone)]
pub struct Archive {
    /// Suggested file name: `<codebase>-<branch>-<label>.zip`.
    pub file_name: String,
    /// Zip bytes.
    pub bytes: Vec<u8>,
}

/// A single file of a version.
#[derive(Debug, Clone)]
pub struct FileDownload {
    /// Base name of the requested path.
    pub file_name: String,
    /// Original file bytes.
    pub bytes: Vec<u8>,
}

/// Snapshot archive handle.
///
/// Owns the configured store pair. Clone-free: share it behind an `Arc` if
/// several threads need it.
///
/// # Examples
///
/// ```
/// use vault_core::{Config, SnapshotRequest, UploadedFile, Vault};
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let mut config = Config::default();
/// config.storage.root = tmp.path().to_path_buf();
///
/// let vault = Vault::open(config).unwrap();
/// let codebase = vault.init_codebase("proj", "demo", "main").unwrap();
///
/// let files = vec![UploadedFile::new("a.txt", b"hello".to_vec())];
/// let outcome = vault
///     .create_snapshot(&codebase.id, SnapshotRequest::new("main", "v1", files))
///     .unwrap();
/// assert_eq!(outcome.version.stats.total_files, 1);
///
/// let file = vault.get_file(&codebase.id, "main", "v1", "a.txt").unwrap();
/// assert_eq!(file.bytes, b"hello");
/// ```
#[derive(Debug)]
pub struct Vault {
    providers: ProviderManager,
    config: RwLock<Config>,
    config_path: Option<PathBuf>,
}

impl Vault {
    /// Opens the stores described by `config`. The configuration is not
    /// written anywhere.
    pub fn open(config: Config) -> Result<Self> {
        config.storage.validate()?;
        let providers =
            ProviderManager::open(&config.storage.root, config.storage.metadata_backend)?;
        Ok(Self {
            providers,
            config: RwLock::new(config),
            config_path: None,
        })
    }

    /// Loads the config file at `path` (defaults if absent) and opens the
    /// stores. Root changes are saved back to the same file.
    pub fn open_with_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut vault = Self::open(Config::load(&path)?)?;
        vault.config_path = Some(path);
        Ok(vault)
    }

    /// Current configuration.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Active storage root.
    pub fn storage_root(&self) -> PathBuf {
        self.providers.root()
    }

    /// The provider manager backing this vault.
    pub fn providers(&self) -> &ProviderManager {
        &self.providers
    }

    /// Rebinds storage to `new_root`, then records it in the config file.
    ///
    /// On any failure the previous stores stay active and neither the
    /// in-memory config nor the config file changes. Setting the current
    /// root again is a no-op.
    pub fn set_storage_root(&self, new_root: impl AsRef<Path>) -> Result<()> {
        let new_root = new_root.as_ref();
        if new_root.as_os_str().is_empty() {
            return Err(VaultError::ConfigError("storage root is empty".to_string()));
        }

        let mut config = self.config.write();
        let previous = self.providers.current();
        self.providers.reconfigure(new_root)?;

        let mut next = config.clone();
        next.storage.root = new_root.to_path_buf();
        if let Some(path) = &self.config_path {
            if let Err(e) = next.save(path) {
                warn!(path = %path.display(), error = %e, "Failed to save config, keeping previous storage root");
                drop(self.providers.restore(previous));
                return Err(e);
            }
        }
        *config = next;
        Ok(())
    }

    /// Creates a codebase with a fresh id.
    pub fn init_codebase(&self, name: &str, description: &str, branch: &str) -> Result<Codebase> {
        validate_codebase_name(name)?;
        let branch = if branch.trim().is_empty() { DEFAULT_BRANCH } else { branch };

        let now = Utc::now();
        let codebase = Codebase {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            default_branch: branch.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.providers.metadata().create_codebase(&codebase)?;

        info!(codebase_id = %codebase.id, name, branch, "Codebase created");
        Ok(codebase)
    }

    /// Looks up a codebase.
    pub fn get_codebase(&self, codebase_id: &str) -> Result<Codebase> {
        self.providers.metadata().get_codebase(codebase_id)
    }

    /// All codebases.
    pub fn list_codebases(&self) -> Result<Vec<Codebase>> {
        self.providers.metadata().list_codebases()
    }

    /// Deletes a codebase: its stored content first, then its metadata.
    ///
    /// If content deletion fails, metadata is left untouched.
    pub fn delete_codebase(&self, codebase_id: &str) -> Result<()> {
        let providers = self.providers.current();
        let codebase = providers.metadata.get_codebase(codebase_id)?;

        providers
            .blobs
            .delete_with_prefix(&format!("{}/", codebase.name))?;
        providers.metadata.delete_codebase(codebase_id)?;

        info!(codebase_id, name = %codebase.name, "Codebase deleted");
        Ok(())
    }

    /// Stores a snapshot and links it into the lineage graph.
    ///
    /// Only storage and metadata failures fail the call. Link failures are
    /// logged and reported in [`SnapshotOutcome::link_error`]; graph read
    /// failures leave [`SnapshotOutcome::graph`] empty.
    pub fn create_snapshot(
        &self,
        codebase_id: &str,
        request: SnapshotRequest,
    ) -> Result<SnapshotOutcome> {
        let providers = self.providers.current();
        let metadata = providers.metadata.as_ref();

        let mut codebase = metadata.get_codebase(codebase_id)?;
        let branch = if request.branch.trim().is_empty() {
            codebase.default_branch.clone()
        } else {
            request.branch.clone()
        };
        if request.label.trim().is_empty() {
            return Err(VaultError::InvalidInput("version label is empty".to_string()));
        }

        let target = SnapshotTarget {
            codebase_id,
            codebase_name: &codebase.name,
            branch: &branch,
            label: &request.label,
            message: &request.message,
            compression_level: self.config.read().storage.compression_level,
        };
        let (version, file_tree) =
            snapshot::create_snapshot(providers.blobs.as_ref(), &request.files, &target)?;

        codebase.updated_at = Utc::now();
        metadata.create_version(&version, &file_tree)?;
        metadata.update_codebase(&codebase)?;

        let (link, link_error) = if request.auto_linkage {
            match lineage::link_new_version(metadata, &version, request.branch_from.as_ref()) {
                Ok(link) => (link, None),
                Err(e) => {
                    warn!(version_id = %version.id, error = %e, "Failed to link version");
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        let graph = match lineage::get_graph(metadata, codebase_id)
            .and_then(|bytes| lineage::decode_graph(&bytes))
        {
            Ok(graph) => Some(graph),
            Err(e) => {
                warn!(codebase_id, error = %e, "Unable to load version graph after snapshot");
                None
            }
        };

        info!(
            codebase_id,
            version_id = %version.id,
            branch = %version.branch,
            label = %version.label,
            "Snapshot created"
        );

        Ok(SnapshotOutcome {
            codebase,
            version,
            file_tree,
            graph,
            link,
            link_error,
        })
    }

    /// Zips every file of a version.
    pub fn archive(&self, codebase_id: &str, branch: &str, label: &str) -> Result<Archive> {
        let providers = self.providers.current();
        let codebase = providers.metadata.get_codebase(codebase_id)?;
        let bytes = archive::archive_version(
            providers.metadata.as_ref(),
            providers.blobs.as_ref(),
            codebase_id,
            branch,
            label,
        )?;

        Ok(Archive {
            file_name: format!("{}-{}-{}.zip", codebase.name, branch, label),
            bytes,
        })
    }

    /// Returns one file of a version.
    pub fn get_file(
        &self,
        codebase_id: &str,
        branch: &str,
        label: &str,
        path: &str,
    ) -> Result<FileDownload> {
        let providers = self.providers.current();
        let bytes = archive::get_single_file(
            providers.metadata.as_ref(),
            providers.blobs.as_ref(),
            codebase_id,
            branch,
            label,
            path,
        )?;

        let file_name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(path)
            .to_string();
        Ok(FileDownload { file_name, bytes })
    }

    /// The version graph, served from the cache when present.
    pub fn graph(&self, codebase_id: &str) -> Result<Vec<u8>> {
        let metadata = self.providers.metadata();
        metadata.get_codebase(codebase_id)?;
        lineage::get_graph(metadata.as_ref(), codebase_id)
    }

    /// Rebuilds and caches the version graph.
    pub fn rebuild_graph(&self, codebase_id: &str) -> Result<VersionGraph> {
        let metadata = self.providers.metadata();
        metadata.get_codebase(codebase_id)?;
        lineage::rebuild_graph(metadata.as_ref(), codebase_id)
    }

    /// Links `child` to `parent` by hand.
    ///
    /// Returns false if `child` already had a parent. A graph rebuild runs in
    /// the background; the cache may still be stale when this returns.
    pub fn link_versions(
        &self,
        codebase_id: &str,
        child: &VersionRef,
        parent: &VersionRef,
        linkage_type: LinkageType,
    ) -> Result<bool> {
        let metadata = self.providers.metadata();
        let child = metadata.find_version(codebase_id, &child.branch, &child.label)?;
        let parent = metadata.find_version(codebase_id, &parent.branch, &parent.label)?;
        lineage::link_manually(metadata, codebase_id, &child, &parent, linkage_type)
    }
}

/// Codebase names become blob key prefixes and must be one safe path segment.
fn validate_codebase_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| VaultError::InvalidInput(format!("codebase name '{}' {}", name, reason));

    if name.trim().is_empty() {
        return Err(invalid("is empty"));
    }
    if name == "." || name == ".." || name.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if name.contains(['/', '\\', ':']) || name.chars().any(char::is_control) {
        return Err(invalid("contains a path separator or control character"));
    }
    Ok(())
}
