//! Event dispatch: decode a raw log and apply it downstream idempotently.
//!
//! Creates read the authoritative entity from the chain and tolerate an
//! existing id; updates are last-write-wins. Re-delivering any event is
//! therefore safe, which is what lets the checkpoint trail the writes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chain::ChainReader;
use crate::context::CallContext;
use crate::error::IndexerError;
use crate::event::{ContractEvent, EventDecoder, RawEvent};
use crate::indexer::UpdateSource;
use crate::sink::EventSink;
use crate::types::{MatchState, OrderState, OrderStatus};

/// What applying one event did downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Applied {
    Created,
    /// Create collided with an existing id; treated as success.
    AlreadyExists,
    Updated,
    /// The chain reported the entity with state `None`; nothing written.
    Skipped,
}

/// Routes decoded events to the sink for one source chain.
pub struct EventDispatcher {
    chain: Arc<dyn ChainReader>,
    sink: Arc<dyn EventSink>,
    decoder: Arc<dyn EventDecoder>,
    chain_id: i64,
    update_source: UpdateSource,
}

impl EventDispatcher {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        sink: Arc<dyn EventSink>,
        decoder: Arc<dyn EventDecoder>,
        chain_id: i64,
    ) -> Self {
        Self {
            chain,
            sink,
            decoder,
            chain_id,
            update_source: UpdateSource::Event,
        }
    }

    pub fn with_update_source(mut self, source: UpdateSource) -> Self {
        self.update_source = source;
        self
    }

    /// Signature hashes of every event this dispatcher handles.
    pub fn topics(&self) -> Vec<String> {
        self.decoder.topics()
    }

    /// Decode `raw` and apply it.
    pub async fn apply(&self, cx: &CallContext, raw: &RawEvent) -> Result<Applied, IndexerError> {
        let event = self.decode(raw)?;
        tracing::debug!(
            event = %event.kind(),
            block = raw.block_number,
            log_index = raw.log_index,
            tx = %raw.tx_hash,
            "applying event"
        );
        self.apply_event(cx, event).await
    }

    fn decode(&self, raw: &RawEvent) -> Result<ContractEvent, IndexerError> {
        let topic0 = raw.topic0().ok_or_else(|| IndexerError::UnknownEvent {
            topic: String::new(),
            block_number: raw.block_number,
        })?;
        let kind = self
            .decoder
            .classify(topic0)
            .ok_or_else(|| IndexerError::UnknownEvent {
                topic: topic0.to_string(),
                block_number: raw.block_number,
            })?;
        self.decoder
            .decode(kind, raw)
            .map_err(|reason| IndexerError::MalformedEvent {
                event: kind.name().to_string(),
                block_number: raw.block_number,
                reason,
            })
    }

    async fn apply_event(
        &self,
        cx: &CallContext,
        event: ContractEvent,
    ) -> Result<Applied, IndexerError> {
        match event {
            ContractEvent::OrderCreated { order_id, use_relayer } => {
                let mut order = cx.call(self.chain.read_order(order_id)).await?;
                if order.state == OrderState::None {
                    tracing::warn!(order_id, "order not found on chain, skipping create");
                    return Ok(Applied::Skipped);
                }
                order.src_chain = self.chain_id;
                order.use_relayer = use_relayer;
                swallow_conflict(cx.call(self.sink.create_order(&order)).await)
            }

            ContractEvent::OrderUpdated { order_id, status } => {
                let status = match self.update_source {
                    UpdateSource::Event => status,
                    UpdateSource::Chain => {
                        let order = cx.call(self.chain.read_order(order_id)).await?;
                        if order.state == OrderState::None {
                            tracing::warn!(order_id, "order not found on chain, skipping update");
                            return Ok(Applied::Skipped);
                        }
                        order.status()
                    }
                };
                self.update_order(cx, order_id, &status).await
            }

            ContractEvent::MatchCreated { match_id, use_relayer } => {
                let mut m = cx.call(self.chain.read_match(match_id)).await?;
                if m.state == MatchState::None {
                    tracing::warn!(match_id, "match not found on chain, skipping create");
                    return Ok(Applied::Skipped);
                }
                m.src_chain = self.chain_id;
                m.use_relayer = use_relayer;
                swallow_conflict(cx.call(self.sink.create_match(&m)).await)
            }

            ContractEvent::MatchUpdated { match_id, state } => {
                let state = match self.update_source {
                    UpdateSource::Event => state,
                    UpdateSource::Chain => {
                        let m = cx.call(self.chain.read_match(match_id)).await?;
                        if m.state == MatchState::None {
                            tracing::warn!(match_id, "match not found on chain, skipping update");
                            return Ok(Applied::Skipped);
                        }
                        m.state
                    }
                };
                cx.call(self.sink.update_match(self.chain_id, match_id, state))
                    .await?;
                Ok(Applied::Updated)
            }
        }
    }

    async fn update_order(
        &self,
        cx: &CallContext,
        order_id: i64,
        status: &OrderStatus,
    ) -> Result<Applied, IndexerError> {
        cx.call(self.sink.update_order(self.chain_id, order_id, status))
            .await?;
        Ok(Applied::Updated)
    }
}

fn swallow_conflict(res: Result<(), IndexerError>) -> Result<Applied, IndexerError> {
    match res {
        Ok(()) => Ok(Applied::Created),
        Err(IndexerError::SinkConflict { entity, id }) => {
            tracing::warn!(entity, id, "already exists downstream");
            Ok(Applied::AlreadyExists)
        }
        Err(e) => Err(e),
    }
}
