//! Vault Core Library
//!
//! A local-first snapshot archive. Whole project states are stored as
//! versions rather than diffs, with:
//! - Content-addressed, per-codebase deduplicated blob storage
//! - Pluggable metadata backends (JSON documents or redb)
//! - Automatic version lineage across and within branches
//! - Zip reconstruction of any stored version
//!
//! # Quick Start
//!
//! ```
//! use vault_core::{Config, SnapshotRequest, UploadedFile, Vault};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let mut config = Config::default();
//! config.storage.root = tmp.path().to_path_buf();
//! let vault = Vault::open(config).unwrap();
//!
//! let proj = vault.init_codebase("proj", "example project", "main").unwrap();
//! let files = vec![
//!     UploadedFile::new("a.txt", b"hello".to_vec()),
//!     UploadedFile::new("b.png", b"\x89PNG...".to_vec()),
//! ];
//! vault
//!     .create_snapshot(&proj.id, SnapshotRequest::new("main", "v1", files.clone()))
//!     .unwrap();
//! let v2 = vault
//!     .create_snapshot(&proj.id, SnapshotRequest::new("main", "v2", files))
//!     .unwrap();
//!
//! // v2 follows v1 on the same branch.
//! let link = v2.link.unwrap();
//! assert_eq!(link.linkage_type.to_string(), "sequential");
//!
//! let graph = vault.rebuild_graph(&proj.id).unwrap();
//! assert_eq!(graph.refs["main"], v2.version.id);
//! ```
//!
//! # Deduplication
//!
//! Storage keys are `<codebase-name>/<hash>` with the hash taken over the
//! original bytes:
//!
//! ```
//! use vault_core::{BlobStore, LocalBlobStore, UploadedFile};
//! use vault_core::snapshot::{create_snapshot, SnapshotTarget};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let blobs = LocalBlobStore::new(tmp.path()).unwrap();
//! let files = vec![
//!     UploadedFile::new("one.txt", b"same".to_vec()),
//!     UploadedFile::new("two.txt", b"same".to_vec()),
//! ];
//! let target = SnapshotTarget {
//!     codebase_id: "id",
//!     codebase_name: "proj",
//!     branch: "main",
//!     label: "v1",
//!     message: "",
//!     compression_level: 3,
//! };
//!
//! let (_, tree) = create_snapshot(&blobs, &files, &target).unwrap();
//! assert_eq!(tree.files[0].storage_key, tree.files[1].storage_key);
//! assert!(blobs.get(&tree.files[0].storage_key).is_ok());
//! ```

pub mod archive;
mod blob_store;
pub mod codec;
mod config;
mod content_hash;
mod error;
pub mod lineage;
pub mod metadata;
mod provider;
pub mod snapshot;
mod types;
mod vault;

pub use blob_store::{BlobStore, LocalBlobStore};
pub use config::{
    Config, MetadataBackend, StorageConfig, BLOB_DIR, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE,
    METADATA_DIR,
};
pub use content_hash::ContentHash;
pub use error::{Result, VaultError};
pub use metadata::{open_metadata_store, MetadataStore};
pub use provider::{ProviderManager, Providers};
pub use snapshot::UploadedFile;
pub use types::*;
pub use vault::{Archive, FileDownload, SnapshotOutcome, SnapshotRequest, Vault, DEFAULT_BRANCH};
