//! Configuration for the snapshot archive.

use crate::codec::DEFAULT_COMPRESSION_LEVEL;
use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "VAULT_CONFIG";

/// Config file name used when no override is set.
pub const DEFAULT_CONFIG_FILE: &str = "vault.toml";

/// Subdirectory of the storage root holding blob content.
pub const BLOB_DIR: &str = "objects";

/// Subdirectory of the storage root holding metadata.
pub const METADATA_DIR: &str = "db";

/// Process configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Storage-related configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Resolves the config file path from `$VAULT_CONFIG`, falling back to
    /// `vault.toml` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from a file.
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| VaultError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| VaultError::ConfigError(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VaultError::ConfigError(format!("failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    VaultError::ConfigError(format!("failed to create config directory: {}", e))
                })?;
            }
        }

        fs::write(path, content)
            .map_err(|e| VaultError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Which metadata store implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    /// One JSON document per collection, rewritten on every mutation.
    #[default]
    Json,
    /// A redb database; each mutation is one transaction.
    Redb,
}

impl fmt::Display for MetadataBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Redb => write!(f, "redb"),
        }
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Storage root; blobs and metadata live in fixed subdirectories.
    pub root: PathBuf,

    /// Metadata backend (default: json).
    #[serde(default)]
    pub metadata_backend: MetadataBackend,

    /// Compression level for zstd (1-22, default: 3).
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./vault_data"),
            metadata_backend: MetadataBackend::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl StorageConfig {
    /// Directory holding blob content for the given root.
    pub fn blob_root(root: &Path) -> PathBuf {
        root.join(BLOB_DIR)
    }

    /// Directory holding metadata for the given root.
    pub fn metadata_root(root: &Path) -> PathBuf {
        root.join(METADATA_DIR)
    }

    /// Rejects values that cannot be used to open stores.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(VaultError::ConfigError("storage root is empty".to_string()));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(VaultError::ConfigError(format!(
                "compression_level must be between 1 and 22, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}
