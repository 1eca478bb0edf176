use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::db::BlobStore;
use crate::error::{FaceError, FaceResult};
use crate::models::Identity;

/// Key the whole collection is persisted under.
pub const FACE_DATABASE_KEY: &str = "faceDatabase";

/// The registered identities, in insertion order.
///
/// The collection is persisted as one JSON blob and rewritten on every
/// mutation. Readers get a snapshot; writers build the next collection,
/// persist it and swap it in while holding the write lock, so mutations are
/// serialised and a failed write leaves both memory and storage untouched.
pub struct FaceStore {
    blob: Arc<dyn BlobStore>,
    key: String,
    identities: RwLock<Arc<Vec<Identity>>>,
}

impl FaceStore {
    /// Open the store and load whatever is persisted (nothing is fine).
    pub fn open(blob: Arc<dyn BlobStore>) -> FaceResult<Self> {
        Self::with_key(blob, FACE_DATABASE_KEY)
    }

    pub fn with_key(blob: Arc<dyn BlobStore>, key: &str) -> FaceResult<Self> {
        let store = Self {
            blob,
            key: key.to_string(),
            identities: RwLock::new(Arc::new(Vec::new())),
        };
        let loaded = store.load()?;
        info!("Face store loaded: {} identities", loaded.len());
        *store.identities.write() = Arc::new(loaded);
        Ok(store)
    }

    /// Read the persisted collection.
    pub fn load(&self) -> FaceResult<Vec<Identity>> {
        let bytes = self
            .blob
            .read_blob(&self.key)
            .map_err(|e| FaceError::storage("failed to read face database", e))?;
        match bytes {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| FaceError::Storage(format!("face database is corrupt: {}", e))),
            None => Ok(Vec::new()),
        }
    }

    /// Persist `identities` as the whole collection.
    pub fn save(&self, identities: &[Identity]) -> FaceResult<()> {
        let bytes = serde_json::to_vec(identities)
            .map_err(|e| FaceError::Storage(format!("failed to serialize face database: {}", e)))?;
        self.blob
            .write_blob(&self.key, &bytes)
            .map_err(|e| FaceError::storage("failed to write face database", e))?;
        debug!("Face database saved ({} identities, {} bytes)", identities.len(), bytes.len());
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<Vec<Identity>> {
        self.identities.read().clone()
    }

    pub fn len(&self) -> usize {
        self.identities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<Identity> {
        self.identities.read().iter().find(|i| i.id == id).cloned()
    }

    /// Append a new identity and persist.
    ///
    /// Rejects a duplicate id, non-finite values (JSON cannot hold them) and
    /// embeddings whose dimensionality differs from what is already stored.
    pub fn insert(&self, identity: Identity) -> FaceResult<()> {
        if identity.embeddings.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FaceError::InvalidArgument(format!(
                "identity '{}' has a non-finite embedding value",
                identity.id
            )));
        }
        self.mutate(|all| {
            if all.iter().any(|i| i.id == identity.id) {
                return Err(FaceError::InvalidArgument(format!("duplicate identity id '{}'", identity.id)));
            }
            let expected = all
                .iter()
                .flat_map(|i| i.embeddings.iter())
                .chain(identity.embeddings.iter())
                .map(|e| e.len())
                .next();
            if let Some(dim) = expected {
                if identity.embeddings.iter().any(|e| e.len() != dim) {
                    return Err(FaceError::InvalidArgument(format!(
                        "embedding dimensionality differs from the stored {}",
                        dim
                    )));
                }
            }
            all.push(identity);
            Ok(true)
        })
        .map(|_| ())
    }

    /// Remove the identity with `id`. Unknown ids are a no-op and return
    /// `false` without touching storage.
    pub fn delete(&self, id: &str) -> FaceResult<bool> {
        let deleted = self.mutate(|all| {
            let before = all.len();
            all.retain(|i| i.id != id);
            Ok(all.len() != before)
        })?;
        if deleted {
            info!("Deleted identity {}", id);
        }
        Ok(deleted)
    }

    fn mutate<F>(&self, f: F) -> FaceResult<bool>
    where
        F: FnOnce(&mut Vec<Identity>) -> FaceResult<bool>,
    {
        let mut guard = self.identities.write();
        let mut next = guard.as_ref().clone();
        if !f(&mut next)? {
            return Ok(false);
        }
        self.save(&next)?;
        *guard = Arc::new(next);
        Ok(true)
    }

    /// The collection as pretty-printed JSON, same records as persisted.
    pub fn export_json(&self) -> FaceResult<Vec<u8>> {
        serde_json::to_vec_pretty(self.snapshot().as_ref())
            .map_err(|e| FaceError::Storage(format!("failed to serialize face database: {}", e)))
    }

    /// Write an export file named after today's (UTC) date into `dir`.
    pub fn export_to_dir(&self, dir: &Path) -> FaceResult<PathBuf> {
        let bytes = self.export_json()?;
        std::fs::create_dir_all(dir)
            .map_err(|e| FaceError::Storage(format!("failed to create {:?}: {}", dir, e)))?;
        let path = dir.join(export_file_name(chrono::Utc::now().date_naive()));
        std::fs::write(&path, &bytes)
            .map_err(|e| FaceError::Storage(format!("failed to write {:?}: {}", path, e)))?;
        info!("Exported face database to {:?} ({} bytes)", path, bytes.len());
        Ok(path)
    }
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("face-database-{}.json", date.format("%Y-%m-%d"))
}
