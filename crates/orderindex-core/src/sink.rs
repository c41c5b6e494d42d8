//! Downstream write interface.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::{Match, MatchState, Order, OrderStatus};

/// The aggregation service that receives replicated entities.
///
/// Creates report an existing id as [`IndexerError::SinkConflict`]; updates
/// are last-write-wins keyed by `(src_chain, id)`. Any other failure is
/// `SinkUnavailable`.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn create_order(&self, order: &Order) -> Result<(), IndexerError>;

    async fn update_order(
        &self,
        src_chain: i64,
        id: i64,
        status: &OrderStatus,
    ) -> Result<(), IndexerError>;

    async fn create_match(&self, m: &Match) -> Result<(), IndexerError>;

    async fn update_match(
        &self,
        src_chain: i64,
        id: i64,
        state: MatchState,
    ) -> Result<(), IndexerError>;
}
