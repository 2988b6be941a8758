//! Staging store tests against S3 or MinIO
//!
//! Skipped unless `S3_ENDPOINT` is set, for example with the MinIO service
//! from docker-compose:
//!
//! ```bash
//! S3_ENDPOINT=http://localhost:9000 S3_PATH_STYLE=true cargo test --test storage_tests
//! ```

use chrono::Utc;
use horizon_common::checksum::sha256_hex;
use horizon_server::storage::{
    config::StorageConfig, staging_key, StagingStore, Storage, StorageError, JSON_CONTENT_TYPE,
};
use uuid::Uuid;

async fn setup_storage() -> Option<Storage> {
    if std::env::var("S3_ENDPOINT").is_err() {
        return None;
    }

    let config = match StorageConfig::from_env() {
        Ok(cfg) => cfg,
        Err(_) => return None,
    };

    match Storage::new(config).await {
        Ok(storage) => Some(storage),
        Err(e) => {
            eprintln!("Failed to create storage client: {}", e);
            None
        },
    }
}

fn test_key() -> String {
    staging_key(Uuid::new_v4(), Utc::now())
}

#[tokio::test]
async fn test_put_then_get() {
    let Some(storage) = setup_storage().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let key = test_key();
    let payload = br#"{"source":"fw1","message":"denied"}"#.to_vec();

    let staged = storage
        .put(&key, payload.clone(), JSON_CONTENT_TYPE)
        .await
        .expect("put should succeed");

    assert_eq!(staged.key, key);
    assert_eq!(staged.size, payload.len() as i64);
    assert_eq!(staged.checksum, sha256_hex(&payload));

    let fetched = storage.get(&key).await.expect("get should succeed");
    assert_eq!(fetched, payload);

    StagingStore::delete(&storage, &key).await.expect("cleanup");
}

#[tokio::test]
async fn test_get_missing_key_is_not_found() {
    let Some(storage) = setup_storage().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let key = test_key();
    let result = storage.get(&key).await;

    match result {
        Err(StorageError::NotFound(missing)) => assert_eq!(missing, key),
        other => panic!("expected NotFound, got {:?}", other.map(|bytes| bytes.len())),
    }
}

#[tokio::test]
async fn test_delete_removes_object() {
    let Some(storage) = setup_storage().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let key = test_key();
    storage
        .put(&key, b"{}".to_vec(), JSON_CONTENT_TYPE)
        .await
        .expect("put should succeed");
    StagingStore::delete(&storage, &key).await.expect("delete should succeed");

    assert!(matches!(storage.get(&key).await, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_download_missing_key_is_not_found() {
    let Some(storage) = setup_storage().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let key = test_key();
    match storage.download(&key).await {
        Err(StorageError::NotFound(missing)) => assert_eq!(missing, key),
        other => panic!("expected NotFound, got {:?}", other.map(|bytes| bytes.len())),
    }
}
