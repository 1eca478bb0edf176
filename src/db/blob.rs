use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

/// Whole-value key/value persistence. A write replaces the previous value.
pub trait BlobStore: Send + Sync {
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Process-local store, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Blobs kept in a single SQLite table.
pub struct SqliteBlobStore {
    conn: Mutex<Connection>,
}

impl SqliteBlobStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Ok(Self::new(super::open_or_create(db_path)?))
    }

    /// Wrap a connection whose schema is already applied.
    pub fn new(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }
}

impl BlobStore for SqliteBlobStore {
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM blobs WHERE key = ?1", params![key], |r| r.get(0))
            .optional()?;
        Ok(value)
    }

    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, bytes, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }
}
