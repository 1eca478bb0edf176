use std::sync::Arc;

use homeface_backend::db::face_store::{export_file_name, FACE_DATABASE_KEY};
use homeface_backend::db::{BlobStore, FaceStore, MemoryBlobStore, SqliteBlobStore};
use homeface_backend::error::FaceError;
use homeface_backend::models::{EncodedImage, Identity, Role};
use tempfile::TempDir;

fn identity(id: &str, embedding: Vec<f32>) -> Identity {
    Identity {
        id: id.to_string(),
        name: format!("name of {}", id),
        role: Role::Owner,
        images: vec![EncodedImage::new(vec![0x89, b'P', b'N', b'G', 1, 2, 3])],
        embeddings: vec![embedding],
    }
}

#[test]
fn test_empty_storage_loads_empty() {
    let store = FaceStore::open(Arc::new(MemoryBlobStore::new())).unwrap();
    assert!(store.is_empty());
    assert!(store.snapshot().is_empty());
}

#[test]
fn test_save_then_load_round_trip() {
    let blob = Arc::new(MemoryBlobStore::new());
    let store = FaceStore::open(blob.clone()).unwrap();
    let records = vec![identity("user_a", vec![0.1, 0.2]), identity("user_b", vec![0.3, 0.4])];
    store.save(&records).unwrap();
    assert_eq!(store.load().unwrap(), records);

    let reopened = FaceStore::open(blob).unwrap();
    assert_eq!(reopened.snapshot().as_ref(), &records);
}

#[test]
fn test_delete_unknown_id_leaves_storage_untouched() {
    let blob = Arc::new(MemoryBlobStore::new());
    let store = FaceStore::open(blob.clone()).unwrap();
    store.insert(identity("user_a", vec![1.0, 0.0])).unwrap();
    let before = blob.read_blob(FACE_DATABASE_KEY).unwrap().unwrap();

    assert!(!store.delete("user_missing").unwrap());
    assert_eq!(blob.read_blob(FACE_DATABASE_KEY).unwrap().unwrap(), before);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete_removes_and_persists() {
    let blob = Arc::new(MemoryBlobStore::new());
    let store = FaceStore::open(blob.clone()).unwrap();
    store.insert(identity("user_a", vec![1.0, 0.0])).unwrap();
    store.insert(identity("user_b", vec![0.0, 1.0])).unwrap();

    assert!(store.delete("user_a").unwrap());
    assert!(store.get("user_a").is_none());
    let reopened = FaceStore::open(blob).unwrap();
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.snapshot()[0].id, "user_b");
}

#[test]
fn test_duplicate_id_rejected() {
    let store = FaceStore::open(Arc::new(MemoryBlobStore::new())).unwrap();
    store.insert(identity("user_a", vec![1.0])).unwrap();
    let err = store.insert(identity("user_a", vec![2.0])).unwrap_err();
    assert!(matches!(err, FaceError::InvalidArgument(_)));
}

#[test]
fn test_corrupt_blob_is_storage_error() {
    let blob = Arc::new(MemoryBlobStore::new());
    blob.write_blob(FACE_DATABASE_KEY, b"{not json").unwrap();
    let err = FaceStore::open(blob).err().unwrap();
    assert!(matches!(err, FaceError::Storage(_)));
}

struct FailingBlobStore;

impl BlobStore for FailingBlobStore {
    fn read_blob(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn write_blob(&self, _key: &str, _bytes: &[u8]) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}

#[test]
fn test_failed_write_keeps_memory_unchanged() {
    let store = FaceStore::open(Arc::new(FailingBlobStore)).unwrap();
    let err = store.insert(identity("user_a", vec![1.0])).unwrap_err();
    assert!(matches!(err, FaceError::Storage(_)));
    assert!(store.is_empty());
}

#[test]
fn test_sqlite_store_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("db").join("homeface.db");
    std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();

    {
        let store = FaceStore::open(Arc::new(SqliteBlobStore::open(&db_path).unwrap())).unwrap();
        store.insert(identity("user_a", vec![0.5, 0.5])).unwrap();
        store.insert(identity("user_b", vec![0.1, 0.9])).unwrap();
        store.delete("user_a").unwrap();
    }

    let store = FaceStore::open(Arc::new(SqliteBlobStore::open(&db_path).unwrap())).unwrap();
    let all = store.snapshot();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, "user_b");
    assert_eq!(all[0].images[0].as_bytes(), &[0x89, b'P', b'N', b'G', 1, 2, 3]);
}

#[test]
fn test_export_to_dir() {
    let tmp = TempDir::new().unwrap();
    let store = FaceStore::open(Arc::new(MemoryBlobStore::new())).unwrap();
    store.insert(identity("user_a", vec![0.25, 0.75])).unwrap();

    let path = store.export_to_dir(&tmp.path().join("exports")).unwrap();
    let expected_name = export_file_name(chrono::Utc::now().date_naive());
    assert_eq!(path.file_name().unwrap().to_string_lossy(), expected_name);

    let exported: Vec<Identity> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(exported, store.snapshot().as_ref().clone());
}

#[test]
fn test_non_finite_embedding_rejected_before_write() {
    let blob = Arc::new(MemoryBlobStore::new());
    let store = FaceStore::open(blob.clone()).unwrap();
    let err = store.insert(identity("user_nan", vec![f32::NAN, 0.5])).unwrap_err();
    assert!(matches!(err, FaceError::InvalidArgument(_)));
    assert!(store.is_empty());
    assert!(blob.read_blob(FACE_DATABASE_KEY).unwrap().is_none());
}
