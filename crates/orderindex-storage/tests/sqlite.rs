#![cfg(feature = "sqlite")]

use orderindex_core::{Checkpoint, CheckpointStore, SourceKey};
use orderindex_storage::SqliteCheckpointStore;

fn key(chain_id: i64) -> SourceKey {
    SourceKey::new(chain_id, "0x5FbDB2315678afecb367f032d93F642f64180aa3")
}

#[tokio::test]
async fn checkpoint_roundtrip() {
    let store = SqliteCheckpointStore::in_memory().await.unwrap();
    assert!(store.load(&key(97)).await.unwrap().is_none());

    store.save(Checkpoint::new(key(97), 1_000)).await.unwrap();
    let loaded = store.load(&key(97)).await.unwrap().unwrap();
    assert_eq!(loaded.last_block, 1_000);
    assert_eq!(loaded.source_key, key(97));
}

#[tokio::test]
async fn upsert_is_monotonic() {
    let store = SqliteCheckpointStore::in_memory().await.unwrap();
    store.save(Checkpoint::new(key(97), 1_021)).await.unwrap();
    store.save(Checkpoint::new(key(97), 1_050)).await.unwrap();
    store.save(Checkpoint::new(key(97), 1_010)).await.unwrap();

    assert_eq!(store.load(&key(97)).await.unwrap().unwrap().last_block, 1_050);
    assert_eq!(store.all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn sources_are_isolated() {
    let store = SqliteCheckpointStore::in_memory().await.unwrap();
    store.save(Checkpoint::new(key(97), 500)).await.unwrap();
    store.save(Checkpoint::new(key(5), 900)).await.unwrap();
    store
        .save(Checkpoint::new(SourceKey::new(97, "0xbb"), 10))
        .await
        .unwrap();

    assert_eq!(store.load(&key(97)).await.unwrap().unwrap().last_block, 500);
    assert_eq!(store.load(&key(5)).await.unwrap().unwrap().last_block, 900);

    let chains: Vec<i64> = store
        .all()
        .await
        .unwrap()
        .iter()
        .map(|c| c.source_key.chain_id)
        .collect();
    assert_eq!(chains, vec![5, 97, 97]);
}

#[tokio::test]
async fn file_database_persists() {
    let path = std::env::temp_dir().join(format!("orderindex-{}.db", std::process::id()));
    let path_str = path.to_string_lossy().to_string();
    {
        let store = SqliteCheckpointStore::open(&path_str).await.unwrap();
        store.save(Checkpoint::new(key(97), 42)).await.unwrap();
    }
    let reopened = SqliteCheckpointStore::open(&path_str).await.unwrap();
    assert_eq!(reopened.load(&key(97)).await.unwrap().unwrap().last_block, 42);
    let _ = std::fs::remove_file(&path);
}
