//! Checkpoint manager: persists how far a source has been applied.
//!
//! A checkpoint is the last block whose events have *all* been acknowledged
//! downstream. On restart the indexer resumes at `last_block + 1`, so a crash
//! between a write and the checkpoint save only re-delivers events, it never
//! skips them.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::CallContext;
use crate::error::IndexerError;
use crate::types::SourceKey;

/// A persisted checkpoint for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub source_key: SourceKey,
    /// Last fully applied block.
    pub last_block: u64,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

impl Checkpoint {
    pub fn new(source_key: SourceKey, last_block: u64) -> Self {
        Self {
            source_key,
            last_block,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Trait for storing and loading checkpoints.
///
/// Implementations include `MemoryCheckpointStore`, the collector client and
/// the SQLite store in `orderindex-storage`. A single writer must be able to
/// read back its own last save.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for `key`, or `None` if it was never saved.
    async fn load(&self, key: &SourceKey) -> Result<Option<Checkpoint>, IndexerError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError>;
}

/// Manages checkpoint reads/writes for one source.
///
/// Commits are monotonic: a value at or below the last committed block is
/// ignored.
pub struct CheckpointManager {
    store: std::sync::Arc<dyn CheckpointStore>,
    key: SourceKey,
    last: Option<u64>,
}

impl CheckpointManager {
    pub fn new(store: std::sync::Arc<dyn CheckpointStore>, key: SourceKey) -> Self {
        Self {
            store,
            key,
            last: None,
        }
    }

    pub fn key(&self) -> &SourceKey {
        &self.key
    }

    /// Last block known to be persisted by this manager.
    pub fn last(&self) -> Option<u64> {
        self.last
    }

    /// Load the stored checkpoint (returns `None` if none exists).
    pub async fn load(&mut self, cx: &CallContext) -> Result<Option<u64>, IndexerError> {
        let cp = cx.call(self.store.load(&self.key)).await?;
        self.last = cp.as_ref().map(|c| c.last_block);
        Ok(self.last)
    }

    /// Load the checkpoint, persisting `seed` first if the store is empty.
    pub async fn load_or_seed(
        &mut self,
        cx: &CallContext,
        seed: Option<u64>,
    ) -> Result<u64, IndexerError> {
        if let Some(block) = self.load(cx).await? {
            return Ok(block);
        }
        let Some(seed) = seed else {
            return Err(IndexerError::NoCheckpoint {
                source_key: self.key.to_string(),
            });
        };
        tracing::info!(source = %self.key, seed, "no checkpoint stored, seeding");
        cx.call(self.store.save(Checkpoint::new(self.key.clone(), seed)))
            .await?;
        self.last = Some(seed);
        Ok(seed)
    }

    /// Persist `block` if it is ahead of the last committed value.
    ///
    /// Returns `true` when a save actually happened.
    pub async fn commit(&mut self, cx: &CallContext, block: u64) -> Result<bool, IndexerError> {
        if self.last.is_some_and(|last| block <= last) {
            return Ok(false);
        }
        cx.call(self.store.save(Checkpoint::new(self.key.clone(), block)))
            .await?;
        self.last = Some(block);
        tracing::debug!(source = %self.key, block, "checkpoint committed");
        Ok(true)
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory checkpoint store for tests and dry runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<SourceKey, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a checkpoint.
    pub fn with(checkpoint: Checkpoint) -> Self {
        let store = Self::default();
        store.insert(checkpoint);
        store
    }

    fn insert(&self, checkpoint: Checkpoint) {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(checkpoint.source_key.clone(), checkpoint);
    }

    /// Synchronous peek, for inspection.
    pub fn get(&self, key: &SourceKey) -> Option<Checkpoint> {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &SourceKey) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.get(key))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        self.insert(checkpoint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;

    fn cx() -> CallContext {
        CallContext::new(CancellationToken::new(), Duration::from_secs(1))
    }

    fn key() -> SourceKey {
        SourceKey::new(97, "0x00000000000000000000000000000000000000aa")
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut mgr = CheckpointManager::new(store.clone(), key());

        assert_eq!(mgr.load(&cx()).await.unwrap(), None);

        assert!(mgr.commit(&cx(), 1000).await.unwrap());
        let cp = store.get(&key()).unwrap();
        assert_eq!(cp.last_block, 1000);
        assert_eq!(cp.source_key, key());
        assert_eq!(mgr.load(&cx()).await.unwrap(), Some(1000));
    }

    #[tokio::test]
    async fn commit_is_monotonic() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut mgr = CheckpointManager::new(store.clone(), key());

        mgr.commit(&cx(), 50).await.unwrap();
        assert!(!mgr.commit(&cx(), 50).await.unwrap());
        assert!(!mgr.commit(&cx(), 10).await.unwrap());
        assert_eq!(store.get(&key()).unwrap().last_block, 50);
        assert!(mgr.commit(&cx(), 51).await.unwrap());
        assert_eq!(mgr.last(), Some(51));
    }

    #[tokio::test]
    async fn seed_persists_immediately() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut mgr = CheckpointManager::new(store.clone(), key());

        assert_eq!(mgr.load_or_seed(&cx(), Some(1000)).await.unwrap(), 1000);
        assert_eq!(store.get(&key()).unwrap().last_block, 1000);
    }

    #[tokio::test]
    async fn stored_checkpoint_beats_seed() {
        let store = Arc::new(MemoryCheckpointStore::with(Checkpoint::new(key(), 4242)));
        let mut mgr = CheckpointManager::new(store, key());
        assert_eq!(mgr.load_or_seed(&cx(), Some(1)).await.unwrap(), 4242);
    }

    #[tokio::test]
    async fn missing_seed_is_no_checkpoint() {
        let mut mgr = CheckpointManager::new(Arc::new(MemoryCheckpointStore::new()), key());
        let err = mgr.load_or_seed(&cx(), None).await.unwrap_err();
        assert!(matches!(err, IndexerError::NoCheckpoint { .. }));
        assert!(err.is_fatal());
    }
}
