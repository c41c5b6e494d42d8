//! JSON:API client for the order aggregator ("collector").
//!
//! All paths are relative to the configured endpoint:
//!
//! | operation      | request                      |
//! |----------------|------------------------------|
//! | create order   | `POST orders`                |
//! | update order   | `PATCH {chainId}/orders`     |
//! | create match   | `POST match_orders`          |
//! | update match   | `PATCH {chainId}/match_orders` |
//! | last block     | `GET {chainId}/block`        |
//! | set last block | `POST {chainId}/block`       |
//!
//! `409` on a create is surfaced as [`IndexerError::SinkConflict`]; `404` on
//! the block read means no checkpoint. The collector keys checkpoints by
//! chain id only, so one collector serves one contract per chain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use orderindex_core::{
    Checkpoint, CheckpointStore, EventSink, IndexerError, Match, MatchState, Order, OrderStatus,
    SourceKey,
};

/// Collector connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Base URL, e.g. `http://aggregator:8000/integrations/order-aggregator/`.
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            request_timeout_ms: 10_000,
        }
    }
}

// ─── Request bodies ───────────────────────────────────────────────────────────

/// `POST orders` body.
pub fn order_body(order: &Order) -> Value {
    json!({
        "data": {
            "type": "order",
            "attributes": {
                "account": order.creator,
                "amountToBuy": order.buy_amount,
                "amountToSell": order.sell_amount,
                "orderId": order.id,
                "srcChain": order.src_chain,
                "state": order.state.as_u8(),
                "tokenToBuy": order.buy_token,
                "tokenToSell": order.sell_token,
                "useRelayer": order.use_relayer,
            },
            "relationships": {
                "destChain": {
                    "data": { "id": order.dest_chain.to_string(), "type": "chain" }
                }
            }
        }
    })
}

/// `PATCH {chainId}/orders` body. Unset match fields are omitted.
pub fn update_order_body(id: i64, status: &OrderStatus) -> Value {
    let mut attributes = json!({ "state": status.state.as_u8() });
    if let Some(match_id) = status.match_id {
        attributes["matchId"] = json!(match_id);
    }
    if let Some(contract) = &status.match_contract {
        attributes["matchSwapica"] = json!(contract);
    }
    json!({
        "data": {
            "id": id.to_string(),
            "type": "order",
            "attributes": attributes,
        }
    })
}

/// `POST match_orders` body.
pub fn match_body(m: &Match) -> Value {
    json!({
        "data": {
            "type": "match_order",
            "attributes": {
                "amountToSell": m.sell_amount,
                "creator": m.creator,
                "matchId": m.id,
                "state": m.state.as_u8(),
                "tokenToSell": m.sell_token,
                "originChainId": m.origin_chain,
                "originOrderId": m.origin_order_id,
                "srcChainId": m.src_chain,
                "useRelayer": m.use_relayer,
            }
        }
    })
}

/// `PATCH {chainId}/match_orders` body.
pub fn update_match_body(id: i64, state: MatchState) -> Value {
    json!({
        "data": {
            "id": id.to_string(),
            "type": "match_order",
            "attributes": { "state": state.as_u8() },
        }
    })
}

/// `{chainId}/block` body.
pub fn block_body(block: u64) -> Value {
    json!({ "data": { "id": block.to_string(), "type": "block" } })
}

#[derive(Deserialize)]
struct BlockResponse {
    data: BlockKey,
}

#[derive(Deserialize)]
struct BlockKey {
    id: String,
}

/// Parse a `{chainId}/block` response.
pub fn parse_block(body: &str) -> Result<u64, IndexerError> {
    let resp: BlockResponse = serde_json::from_str(body)
        .map_err(|e| IndexerError::SinkUnavailable(format!("invalid block response: {e}")))?;
    resp.data
        .id
        .parse()
        .map_err(|_| IndexerError::SinkUnavailable(format!("invalid block number `{}`", resp.data.id)))
}

/// Map a write response status.
///
/// `conflict` names the entity a `409` refers to; writes without one treat
/// `409` like any other failure.
pub fn write_status(
    status: StatusCode,
    conflict: Option<(&'static str, i64)>,
    what: &str,
    body: &str,
) -> Result<(), IndexerError> {
    if status.is_success() {
        return Ok(());
    }
    match conflict {
        Some((entity, id)) if status == StatusCode::CONFLICT => {
            Err(IndexerError::SinkConflict { entity, id })
        }
        _ => Err(IndexerError::SinkUnavailable(format!(
            "{what}: HTTP {}: {}",
            status.as_u16(),
            body.trim()
        ))),
    }
}

// ─── CollectorClient ──────────────────────────────────────────────────────────

/// HTTP client for the collector.
#[derive(Clone)]
pub struct CollectorClient {
    http: reqwest::Client,
    base: String,
    timeout_ms: u64,
}

impl CollectorClient {
    pub fn new(config: &CollectorConfig) -> Result<Self, IndexerError> {
        if config.endpoint.is_empty() {
            return Err(IndexerError::Config("collector endpoint is required".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| IndexerError::Config(format!("collector client: {e}")))?;
        let mut base = config.endpoint.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            http,
            base,
            timeout_ms: config.request_timeout_ms,
        })
    }

    /// Base URL with a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, String), IndexerError> {
        let url = self.url(path);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;
        tracing::debug!(%method, %url, status = status.as_u16(), "collector request");
        Ok((status, text))
    }

    fn transport_error(&self, e: reqwest::Error) -> IndexerError {
        if e.is_timeout() {
            IndexerError::Timeout { ms: self.timeout_ms }
        } else {
            IndexerError::SinkUnavailable(e.to_string())
        }
    }

    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Value,
        conflict: Option<(&'static str, i64)>,
    ) -> Result<(), IndexerError> {
        let (status, text) = self.request(method, path, Some(&body)).await?;
        write_status(status, conflict, path, &text)
    }

    /// Last block stored for `chain_id`, `None` on `404`.
    pub async fn last_block(&self, chain_id: i64) -> Result<Option<u64>, IndexerError> {
        let path = format!("{chain_id}/block");
        let (status, text) = self.request(Method::GET, &path, None).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        write_status(status, None, &path, &text)?;
        parse_block(&text).map(Some)
    }

    pub async fn set_last_block(&self, chain_id: i64, block: u64) -> Result<(), IndexerError> {
        self.write(Method::POST, &format!("{chain_id}/block"), block_body(block), None)
            .await
    }
}

#[async_trait]
impl EventSink for CollectorClient {
    async fn create_order(&self, order: &Order) -> Result<(), IndexerError> {
        self.write(Method::POST, "orders", order_body(order), Some(("order", order.id)))
            .await
    }

    async fn update_order(
        &self,
        src_chain: i64,
        id: i64,
        status: &OrderStatus,
    ) -> Result<(), IndexerError> {
        self.write(
            Method::PATCH,
            &format!("{src_chain}/orders"),
            update_order_body(id, status),
            None,
        )
        .await
    }

    async fn create_match(&self, m: &Match) -> Result<(), IndexerError> {
        self.write(Method::POST, "match_orders", match_body(m), Some(("match order", m.id)))
            .await
    }

    async fn update_match(
        &self,
        src_chain: i64,
        id: i64,
        state: MatchState,
    ) -> Result<(), IndexerError> {
        self.write(
            Method::PATCH,
            &format!("{src_chain}/match_orders"),
            update_match_body(id, state),
            None,
        )
        .await
    }
}

#[async_trait]
impl CheckpointStore for CollectorClient {
    async fn load(&self, key: &SourceKey) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self
            .last_block(key.chain_id)
            .await?
            .map(|block| Checkpoint::new(key.clone(), block)))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        self.set_last_block(checkpoint.source_key.chain_id, checkpoint.last_block)
            .await
    }
}
