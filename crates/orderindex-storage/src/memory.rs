//! In-memory sink.
//!
//! Holds replicated orders, matches and checkpoints in RAM with the same
//! create/update contract as the collector. Used by `run --dry-run`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use orderindex_core::{
    Checkpoint, CheckpointStore, EventSink, IndexerError, Match, MatchState, Order, OrderStatus,
    SourceKey,
};

#[derive(Default)]
struct Tables {
    orders: BTreeMap<(i64, i64), Order>,
    matches: BTreeMap<(i64, i64), Match>,
    checkpoints: HashMap<SourceKey, Checkpoint>,
    writes: usize,
}

/// In-memory [`EventSink`] and [`CheckpointStore`].
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemorySink {
    tables: Mutex<Tables>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn order(&self, src_chain: i64, id: i64) -> Option<Order> {
        self.tables().orders.get(&(src_chain, id)).cloned()
    }

    pub fn match_order(&self, src_chain: i64, id: i64) -> Option<Match> {
        self.tables().matches.get(&(src_chain, id)).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.tables().orders.len()
    }

    pub fn match_count(&self) -> usize {
        self.tables().matches.len()
    }

    /// Accepted writes, conflicts excluded.
    pub fn write_count(&self) -> usize {
        self.tables().writes
    }
}

#[async_trait]
impl EventSink for InMemorySink {
    async fn create_order(&self, order: &Order) -> Result<(), IndexerError> {
        let mut t = self.tables();
        let key = (order.src_chain, order.id);
        if t.orders.contains_key(&key) {
            return Err(IndexerError::SinkConflict { entity: "order", id: order.id });
        }
        t.orders.insert(key, order.clone());
        t.writes += 1;
        Ok(())
    }

    async fn update_order(
        &self,
        src_chain: i64,
        id: i64,
        status: &OrderStatus,
    ) -> Result<(), IndexerError> {
        let mut t = self.tables();
        match t.orders.get_mut(&(src_chain, id)) {
            Some(order) => {
                order.state = status.state;
                order.executed_by_match = status.match_id;
                order.match_contract = status.match_contract.clone();
            }
            None => tracing::warn!(src_chain, id, "update for unknown order"),
        }
        t.writes += 1;
        Ok(())
    }

    async fn create_match(&self, m: &Match) -> Result<(), IndexerError> {
        let mut t = self.tables();
        let key = (m.src_chain, m.id);
        if t.matches.contains_key(&key) {
            return Err(IndexerError::SinkConflict { entity: "match order", id: m.id });
        }
        t.matches.insert(key, m.clone());
        t.writes += 1;
        Ok(())
    }

    async fn update_match(
        &self,
        src_chain: i64,
        id: i64,
        state: MatchState,
    ) -> Result<(), IndexerError> {
        let mut t = self.tables();
        match t.matches.get_mut(&(src_chain, id)) {
            Some(m) => m.state = state,
            None => tracing::warn!(src_chain, id, "update for unknown match order"),
        }
        t.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for InMemorySink {
    async fn load(&self, key: &SourceKey) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.tables().checkpoints.get(key).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        self.tables()
            .checkpoints
            .insert(checkpoint.source_key.clone(), checkpoint);
        Ok(())
    }
}
