//! Error types for vault_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for vault_core operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Codebase with the given ID does not exist.
    #[error("codebase not found: {0}")]
    CodebaseNotFound(String),

    /// No version matches the (codebase, branch, label) triple.
    #[error("version not found: {branch}/{label} in codebase {codebase_id}")]
    VersionNotFound {
        /// Owning codebase
        codebase_id: String,
        /// Branch searched
        branch: String,
        /// Version label searched
        label: String,
    },

    /// Version with the given ID does not exist.
    #[error("version id not found: {0}")]
    VersionIdNotFound(String),

    /// File tree with the given ID does not exist.
    #[error("file tree not found: {0}")]
    TreeNotFound(String),

    /// Path is not part of the version's file index.
    #[error("file '{path}' not found in version {label}")]
    FileNotFound {
        /// Requested relative path
        path: String,
        /// Version label that was searched
        label: String,
    },

    /// Blob key does not exist in the blob store.
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// No graph cache entry exists for the codebase.
    #[error("graph cache not found for codebase {0}")]
    CacheNotFound(String),

    /// A codebase with this ID already exists.
    #[error("codebase already exists: {0}")]
    CodebaseExists(String),

    /// A version with this ID already exists.
    #[error("version already exists: {0}")]
    VersionExists(String),

    /// Prefix deletion refused because the prefix is empty or escapes the store root.
    #[error("refusing to delete with prefix '{prefix}': {reason}")]
    InvalidPrefix {
        /// Offending prefix
        prefix: String,
        /// Why it was rejected
        reason: String,
    },

    /// Caller supplied malformed or missing input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata database error.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error while persisting records.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error while loading records.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// Zip container could not be written.
    #[error("archive error: {0}")]
    Archive(String),

    /// A per-file unit of a snapshot or archive failed.
    #[error("pipeline failed on {path}: {source}")]
    PipelineFailed {
        /// Relative path of the first failing file
        path: String,
        /// Underlying failure
        #[source]
        source: Box<VaultError>,
    },

    /// Persisted record file is unreadable.
    #[error("corrupted metadata at {}: {}", path.display(), reason)]
    CorruptedMetadata {
        /// File that failed to load
        path: PathBuf,
        /// Description of the corruption
        reason: String,
    },

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl VaultError {
    /// Returns true for every "record or object is absent" variant.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::CodebaseNotFound(_)
            | Self::VersionNotFound { .. }
            | Self::VersionIdNotFound(_)
            | Self::TreeNotFound(_)
            | Self::FileNotFound { .. }
            | Self::BlobNotFound(_)
            | Self::CacheNotFound(_) => true,
            Self::PipelineFailed { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CodebaseNotFound(_) => Some("List known codebases with 'vault list'."),
            Self::VersionNotFound { .. } => {
                Some("Check the branch and label with 'vault graph <codebase-id>'.")
            }
            Self::BlobNotFound(_) => Some(
                "Stored content is missing. The storage root may have been changed or pruned by hand.",
            ),
            Self::CorruptedMetadata { .. } => {
                Some("Restore the metadata directory from a backup or switch to a fresh storage root.")
            }
            Self::InvalidPrefix { .. } => {
                Some("Prefix deletion only accepts a non-empty prefix nested under the storage root.")
            }
            Self::ConfigError(_) => Some("Inspect the config file with 'vault config show'."),
            _ => None,
        }
    }
}

/// Convenience Result type for vault_core operations.
pub type Result<T> = std::result::Result<T, VaultError>;
