pub mod schema;
pub mod blob;
pub mod face_store;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;

pub use blob::{BlobStore, MemoryBlobStore, SqliteBlobStore};
pub use face_store::FaceStore;

pub fn open_or_create<P: AsRef<Path>>(db_path: P) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    schema::apply_pragmas(&conn)?;
    schema::apply_schema(&conn)?;
    Ok(conn)
}
