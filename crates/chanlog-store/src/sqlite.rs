//! SQLite implementation of the ObjectStore trait.
//!
//! This is the persistent storage backend for chanlog. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use chanlog_core::{IdentityHash, ObjectHash, VersionId, VersionNode};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{ObjectStore, VersionedObject};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| StoreError::Lock(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn blob_to_hash(bytes: Vec<u8>, column: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("{} is not 32 bytes", column)))
}

fn query_version_ids(conn: &Connection, sql: &str, identity: &IdentityHash) -> Result<Vec<VersionId>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![identity.as_bytes().as_slice()], |row| {
            row.get::<_, Vec<u8>>(0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|b| blob_to_hash(b, "version_id").map(VersionId))
        .collect()
}

#[async_trait]
impl ObjectStore for SqliteStore {
    async fn put_immutable(&self, bytes: &[u8]) -> Result<ObjectHash> {
        let bytes = bytes.to_vec();
        let hash = ObjectHash::hash(&bytes);

        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO objects (hash, bytes, stored_at) VALUES (?1, ?2, ?3)",
                params![hash.as_bytes().as_slice(), bytes, now_millis()],
            )?;
            Ok(hash)
        })
        .await
    }

    async fn get_immutable(&self, hash: &ObjectHash) -> Result<Option<Bytes>> {
        let hash = *hash;

        self.blocking(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT bytes FROM objects WHERE hash = ?1",
                    params![hash.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(bytes.map(Bytes::from))
        })
        .await
    }

    async fn has_immutable(&self, hash: &ObjectHash) -> Result<bool> {
        let hash = *hash;

        self.blocking(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM objects WHERE hash = ?1",
                    params![hash.as_bytes().as_slice()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn put_versioned(
        &self,
        identity: &IdentityHash,
        bytes: &[u8],
        parents: &[VersionId],
    ) -> Result<VersionId> {
        let identity = *identity;
        let bytes = bytes.to_vec();
        let node = VersionNode::new(identity, ObjectHash::hash(&bytes), parents.to_vec());
        let version = node.compute_id();
        let node_bytes = node.to_canonical();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            for parent in &node.parents {
                let parent_identity: Option<Vec<u8>> = tx
                    .query_row(
                        "SELECT identity FROM versions WHERE version_id = ?1",
                        params![parent.as_bytes().as_slice()],
                        |row| row.get(0),
                    )
                    .optional()?;

                if parent_identity.as_deref() != Some(identity.as_bytes().as_slice()) {
                    return Err(StoreError::UnknownVersion {
                        version: *parent,
                        identity,
                    });
                }
            }

            let exists = tx
                .query_row(
                    "SELECT 1 FROM versions WHERE version_id = ?1",
                    params![version.as_bytes().as_slice()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if exists {
                return Ok(version);
            }

            let now = now_millis();
            tx.execute(
                "INSERT OR IGNORE INTO objects (hash, bytes, stored_at) VALUES (?1, ?2, ?3)",
                params![node.data.as_bytes().as_slice(), bytes, now],
            )?;
            tx.execute(
                "INSERT INTO versions (version_id, identity, data_hash, node, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    version.as_bytes().as_slice(),
                    identity.as_bytes().as_slice(),
                    node.data.as_bytes().as_slice(),
                    node_bytes,
                    now,
                ],
            )?;

            for parent in &node.parents {
                tx.execute(
                    "DELETE FROM version_leaves WHERE identity = ?1 AND version_id = ?2",
                    params![identity.as_bytes().as_slice(), parent.as_bytes().as_slice()],
                )?;
            }
            tx.execute(
                "INSERT INTO version_leaves (identity, version_id) VALUES (?1, ?2)",
                params![identity.as_bytes().as_slice(), version.as_bytes().as_slice()],
            )?;

            tx.commit()?;
            Ok(version)
        })
        .await
    }

    async fn get_versioned(&self, version: &VersionId) -> Result<Option<VersionedObject>> {
        let version = *version;

        self.blocking(move |conn| {
            let row: Option<(Vec<u8>, Option<Vec<u8>>)> = conn
                .query_row(
                    "SELECT v.node, o.bytes
                     FROM versions v LEFT JOIN objects o ON o.hash = v.data_hash
                     WHERE v.version_id = ?1",
                    params![version.as_bytes().as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((node_bytes, data)) = row else {
                return Ok(None);
            };

            let node = VersionNode::from_canonical(&node_bytes)?;
            let data = data.ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "version {} references missing data {}",
                    version, node.data
                ))
            })?;

            Ok(Some(VersionedObject {
                version,
                identity: node.identity,
                parents: node.parents,
                data: Bytes::from(data),
            }))
        })
        .await
    }

    async fn list_version_history(&self, identity: &IdentityHash) -> Result<Vec<VersionId>> {
        let identity = *identity;

        self.blocking(move |conn| {
            query_version_ids(
                conn,
                "SELECT version_id FROM versions WHERE identity = ?1 ORDER BY seq",
                &identity,
            )
        })
        .await
    }

    async fn leaves(&self, identity: &IdentityHash) -> Result<Vec<VersionId>> {
        let identity = *identity;

        self.blocking(move |conn| {
            query_version_ids(
                conn,
                "SELECT l.version_id
                 FROM version_leaves l JOIN versions v ON v.version_id = l.version_id
                 WHERE l.identity = ?1
                 ORDER BY v.seq",
                &identity,
            )
        })
        .await
    }
}
