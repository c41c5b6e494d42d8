//! Live log subscription over WebSocket (`eth_subscribe("logs")`).
//!
//! `subscribe` opens a fresh connection, waits for the subscription id and
//! spawns a task that forwards matching notifications into a
//! [`LogSubscription`]. The task ends when the socket closes, on the first
//! receive error (reported to the consumer), or when the consumer drops the
//! subscription. Reconnecting is the scheduler's job: the next pass
//! subscribes again.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

use orderindex_core::{IndexerError, LogSubscriber, LogSubscription, RawEvent};

use crate::error::TransportError;
use crate::reader::RawLog;
use crate::rpc::{JsonRpcRequest, JsonRpcResponse, RpcId};

const SUBSCRIBE_ID: u64 = 1;

/// [`LogSubscriber`] for one contract.
pub struct WsLogSubscriber {
    url: String,
    contract: String,
}

impl WsLogSubscriber {
    pub fn new(url: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            contract: contract.into(),
        }
    }

    fn subscribe_request(&self, topics: &[String]) -> JsonRpcRequest {
        JsonRpcRequest::new(
            SUBSCRIBE_ID,
            "eth_subscribe",
            vec![
                json!("logs"),
                json!({ "address": self.contract, "topics": [topics] }),
            ],
        )
    }
}

#[async_trait]
impl LogSubscriber for WsLogSubscriber {
    async fn subscribe(&self, topics: &[String]) -> Result<LogSubscription, IndexerError> {
        tracing::info!(url = %self.url, "opening log subscription");
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let req = serde_json::to_string(&self.subscribe_request(topics))
            .map_err(TransportError::Deserialization)?;
        sink.send(Message::Text(req.into()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let sub_id = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(id) = subscription_id(text.as_str())? {
                        break id;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::WebSocket("closed before subscribing".into()).into());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError::WebSocket(e.to_string()).into()),
            }
        };
        tracing::info!(url = %self.url, subscription = %sub_id, "log subscription active");

        let (tx, subscription) = LogSubscription::channel();
        let url = self.url.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(item) = notification(text.as_str(), &sub_id) {
                                if tx.send(item).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(url = %url, error = %e, "log subscription receive error");
                            let _ = tx.send(Err(TransportError::WebSocket(e.to_string()).into()));
                            break;
                        }
                    }
                }
            }
            let _ = sink.close().await;
            tracing::info!(url = %url, "log subscription closed");
        });

        Ok(subscription)
    }
}

/// The subscription id if `text` is the response to our `eth_subscribe`.
fn subscription_id(text: &str) -> Result<Option<String>, TransportError> {
    let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(text) else {
        return Ok(None);
    };
    if resp.id != RpcId::Number(SUBSCRIBE_ID) {
        return Ok(None);
    }
    match resp.into_result().map_err(TransportError::Rpc)? {
        Value::String(id) => Ok(Some(id)),
        other => Err(TransportError::InvalidResponse(format!(
            "eth_subscribe returned {other}"
        ))),
    }
}

/// Decode an `eth_subscription` notification for `sub_id`.
///
/// Returns `None` for unrelated messages and removed logs.
fn notification(text: &str, sub_id: &str) -> Option<Result<RawEvent, IndexerError>> {
    let val: Value = serde_json::from_str(text).ok()?;
    if val.get("method").and_then(Value::as_str) != Some("eth_subscription") {
        return None;
    }
    let params = val.get("params")?;
    if params.get("subscription").and_then(Value::as_str) != Some(sub_id) {
        return None;
    }
    let log: RawLog = match serde_json::from_value(params.get("result")?.clone()) {
        Ok(log) => log,
        Err(e) => return Some(Err(TransportError::Deserialization(e).into())),
    };
    if log.is_removed() {
        tracing::debug!(tx = %log.tx_hash, "ignoring removed log");
        return None;
    }
    Some(log.into_event().map_err(IndexerError::from))
}
