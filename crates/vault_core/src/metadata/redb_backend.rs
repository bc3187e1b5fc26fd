//! Transactional metadata backend on redb.
//!
//! Each mutation is a single write transaction touching only the records it
//! changes. Values are postcard-encoded; versions and links carry a sequence
//! number so that record order survives a reload.

use super::catalog::{Catalog, Change};
use super::CatalogBackend;
use crate::error::{Result, VaultError};
use crate::types::{Codebase, FileTree, LineageLink, Version};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

/// Database file name under the metadata root.
pub const DATABASE_FILE: &str = "metadata.redb";

/// Schema version for migration support.
pub const SCHEMA_VERSION: u64 = 1;

/// String-keyed table of encoded records.
type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

const META_TABLE: TableDefinition<'static, &'static str, u64> = TableDefinition::new("meta");
const CODEBASES_TABLE: RecordTable = TableDefinition::new("codebases");
const VERSIONS_TABLE: RecordTable = TableDefinition::new("versions");
const FILE_INDEXES_TABLE: RecordTable = TableDefinition::new("file_indexes");
const LINKS_TABLE: RecordTable = TableDefinition::new("version_links");
const GRAPH_CACHE_TABLE: RecordTable = TableDefinition::new("graph_cache");

const SCHEMA_KEY: &str = "schema_version";
const SEQ_KEY: &str = "next_seq";

/// A record tagged with its insertion sequence number.
#[derive(Serialize, Deserialize)]
struct Sequenced<T> {
    seq: u64,
    record: T,
}

/// redb-backed metadata backend.
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend").field("path", &self.path).finish()
    }
}

fn db_err<E: Display>(context: &'static str) -> impl FnOnce(E) -> VaultError {
    move |e| VaultError::Database(format!("{}: {}", context, e))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(|e| VaultError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| VaultError::Deserialization(e.to_string()))
}

impl RedbBackend {
    /// Opens (or creates) the database under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database can't be opened or was written with
    /// a different schema version.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let path = root.join(DATABASE_FILE);

        let db = Database::create(&path).map_err(db_err("failed to open metadata database"))?;
        let backend = Self { db, path };
        backend.init_schema()?;
        Ok(backend)
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates every table and checks the schema version.
    fn init_schema(&self) -> Result<()> {
        let txn = self.begin_write()?;
        {
            let mut meta = txn
                .open_table(META_TABLE)
                .map_err(db_err("failed to open meta table"))?;
            let found = meta
                .get(SCHEMA_KEY)
                .map_err(db_err("failed to read schema version"))?
                .map(|v| v.value());
            match found {
                Some(version) if version != SCHEMA_VERSION => {
                    return Err(VaultError::CorruptedMetadata {
                        path: self.path.clone(),
                        reason: format!(
                            "schema version mismatch: found {}, expected {}",
                            version, SCHEMA_VERSION
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    meta.insert(SCHEMA_KEY, SCHEMA_VERSION)
                        .map_err(db_err("failed to write schema version"))?;
                }
            }

            for table in [
                CODEBASES_TABLE,
                VERSIONS_TABLE,
                FILE_INDEXES_TABLE,
                LINKS_TABLE,
                GRAPH_CACHE_TABLE,
            ] {
                txn.open_table(table)
                    .map_err(db_err("failed to create table"))?;
            }
        }
        txn.commit().map_err(db_err("failed to commit"))
    }

    fn begin_write(&self) -> Result<WriteTransaction> {
        self.db
            .begin_write()
            .map_err(db_err("failed to begin write transaction"))
    }

    /// Reads every value of a table, in key order.
    fn read_all<T: DeserializeOwned>(
        &self,
        table: RecordTable,
    ) -> Result<Vec<(String, T)>> {
        let txn = self
            .db
            .begin_read()
            .map_err(db_err("failed to begin read transaction"))?;
        let table = txn.open_table(table).map_err(db_err("failed to open table"))?;

        let mut out = Vec::new();
        for entry in table.iter().map_err(db_err("failed to iterate table"))? {
            let (key, value) = entry.map_err(db_err("failed to read entry"))?;
            out.push((key.value().to_string(), decode(value.value())?));
        }
        Ok(out)
    }

    fn put<T: Serialize>(
        txn: &WriteTransaction,
        table: RecordTable,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let bytes = encode(value)?;
        let mut table = txn.open_table(table).map_err(db_err("failed to open table"))?;
        table
            .insert(key, bytes.as_slice())
            .map_err(db_err("failed to insert record"))?;
        Ok(())
    }

    fn remove_all(
        txn: &WriteTransaction,
        table: RecordTable,
        keys: &[String],
    ) -> Result<()> {
        let mut table = txn.open_table(table).map_err(db_err("failed to open table"))?;
        for key in keys {
            table
                .remove(key.as_str())
                .map_err(db_err("failed to remove record"))?;
        }
        Ok(())
    }

    /// Allocates the next record sequence number inside `txn`.
    fn next_seq(txn: &WriteTransaction) -> Result<u64> {
        let mut meta = txn
            .open_table(META_TABLE)
            .map_err(db_err("failed to open meta table"))?;
        let seq = meta
            .get(SEQ_KEY)
            .map_err(db_err("failed to read sequence"))?
            .map(|v| v.value())
            .unwrap_or(0);
        meta.insert(SEQ_KEY, seq + 1)
            .map_err(db_err("failed to bump sequence"))?;
        Ok(seq)
    }
}

fn in_record_order<T>(mut rows: Vec<(String, Sequenced<T>)>) -> Vec<T> {
    rows.sort_by_key(|(_, row)| row.seq);
    rows.into_iter().map(|(_, row)| row.record).collect()
}

impl CatalogBackend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn load(&self) -> Result<Catalog> {
        let codebases: BTreeMap<String, Codebase> =
            self.read_all(CODEBASES_TABLE)?.into_iter().collect();
        let versions: Vec<Version> = in_record_order(self.read_all(VERSIONS_TABLE)?);
        let file_indexes: BTreeMap<String, FileTree> =
            self.read_all(FILE_INDEXES_TABLE)?.into_iter().collect();
        let links: Vec<LineageLink> = in_record_order(self.read_all(LINKS_TABLE)?);

        Ok(Catalog::from_parts(codebases, versions, file_indexes, links))
    }

    fn persist(&self, _next: &Catalog, change: &Change) -> Result<()> {
        let txn = self.begin_write()?;

        match change {
            Change::CodebaseUpserted(codebase) => {
                Self::put(&txn, CODEBASES_TABLE, &codebase.id, codebase)?;
            }
            Change::VersionCreated { version, tree } => {
                let seq = Self::next_seq(&txn)?;
                Self::put(&txn, FILE_INDEXES_TABLE, &tree.tree_id, tree)?;
                Self::put(
                    &txn,
                    VERSIONS_TABLE,
                    &version.id,
                    &Sequenced { seq, record: version },
                )?;
            }
            Change::LinkCreated(link) => {
                let seq = Self::next_seq(&txn)?;
                Self::put(&txn, LINKS_TABLE, &link.id, &Sequenced { seq, record: link })?;
            }
            Change::CodebaseDeleted {
                codebase_id,
                version_ids,
                tree_ids,
                link_ids,
            } => {
                let codebase = [codebase_id.clone()];
                Self::remove_all(&txn, GRAPH_CACHE_TABLE, &codebase)?;
                Self::remove_all(&txn, LINKS_TABLE, link_ids)?;
                Self::remove_all(&txn, VERSIONS_TABLE, version_ids)?;
                Self::remove_all(&txn, FILE_INDEXES_TABLE, tree_ids)?;
                Self::remove_all(&txn, CODEBASES_TABLE, &codebase)?;
            }
        }

        txn.commit().map_err(db_err("failed to commit"))
    }

    fn read_cache(&self, codebase_id: &str) -> Result<Option<Vec<u8>>> {
        let txn = self
            .db
            .begin_read()
            .map_err(db_err("failed to begin read transaction"))?;
        let table = txn
            .open_table(GRAPH_CACHE_TABLE)
            .map_err(db_err("failed to open graph cache table"))?;
        let value = table
            .get(codebase_id)
            .map_err(db_err("failed to read graph cache"))?
            .map(|v| v.value().to_vec());
        Ok(value)
    }

    fn write_cache(&self, codebase_id: &str, data: &[u8]) -> Result<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn
                .open_table(GRAPH_CACHE_TABLE)
                .map_err(db_err("failed to open graph cache table"))?;
            table
                .insert(codebase_id, data)
                .map_err(db_err("failed to write graph cache"))?;
        }
        txn.commit().map_err(db_err("failed to commit"))
    }
}
