use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vault_core::{Config, MetadataBackend, Vault};

/// Manages an isolated vault environment with tempfile
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create a workspace whose config points storage at `<tmp>/store`
    pub fn new(backend: MetadataBackend) -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        let workspace = Self { dir };

        let mut config = Config::default();
        config.storage.root = workspace.storage_dir("store");
        config.storage.metadata_backend = backend;
        config
            .save(&workspace.config_path())
            .context("Failed to write config")?;

        Ok(workspace)
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Config file used by every vault opened here
    pub fn config_path(&self) -> PathBuf {
        self.path().join("vault.toml")
    }

    /// A storage root inside the workspace
    pub fn storage_dir(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Open the vault as a fresh process would
    pub fn open_vault(&self) -> Result<Vault> {
        Ok(Vault::open_with_config_file(self.config_path())?)
    }

    /// Load the config as currently saved on disk
    pub fn saved_config(&self) -> Result<Config> {
        Ok(Config::load(&self.config_path())?)
    }
}
