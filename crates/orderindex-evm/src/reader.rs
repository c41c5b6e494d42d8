//! EVM chain reader.
//!
//! Uses `eth_blockNumber`, a single `eth_getLogs` per window filtered by
//! contract address and an OR-set of `topics[0]`, and `eth_call` for the
//! entity getters.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use orderindex_core::{ChainReader, IndexerError, Match, Order, QueryWindow, RawEvent};

use crate::abi::ContractAbi;
use crate::error::TransportError;
use crate::rpc::RpcTransport;

/// A raw EVM log as returned by `eth_getLogs` and log subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    /// Convert into the chain-agnostic representation.
    pub fn into_event(self) -> Result<RawEvent, TransportError> {
        let block_number = parse_hex_u64(&self.block_number)?;
        let log_index = u32::try_from(parse_hex_u64(&self.log_index)?)
            .map_err(|_| TransportError::InvalidResponse(format!("logIndex {} overflows", self.log_index)))?;
        let data = parse_hex_bytes(&self.data)?;
        Ok(RawEvent {
            address: self.address,
            topics: self.topics.into_iter().map(|t| t.to_ascii_lowercase()).collect(),
            data,
            block_number,
            log_index,
            tx_hash: self.tx_hash,
        })
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(s: &str) -> Result<u64, TransportError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| TransportError::InvalidResponse(format!("bad hex quantity `{s}`: {e}")))
}

/// Parse `0x`-prefixed hex data.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, TransportError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| TransportError::InvalidResponse(format!("bad hex data: {e}")))
}

/// [`ChainReader`] for the order-book contract over any JSON-RPC transport.
pub struct EvmChainReader<T> {
    transport: T,
    contract: String,
    abi: ContractAbi,
    next_id: AtomicU64,
}

impl<T: RpcTransport> EvmChainReader<T> {
    pub fn new(transport: T, contract: impl Into<String>) -> Self {
        Self {
            transport,
            contract: contract.into(),
            abi: ContractAbi::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn call<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<R, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.transport.call(id, method, params).await
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let ret: String = self
            .call(
                "eth_call",
                vec![
                    json!({ "to": self.contract, "data": format!("0x{}", hex::encode(data)) }),
                    json!("latest"),
                ],
            )
            .await?;
        parse_hex_bytes(&ret)
    }

    /// Chain id reported by the node.
    pub async fn chain_id(&self) -> Result<u64, IndexerError> {
        let quantity: String = self.call("eth_chainId", vec![]).await?;
        Ok(parse_hex_u64(&quantity)?)
    }
}

#[async_trait]
impl<T: RpcTransport> ChainReader for EvmChainReader<T> {
    async fn current_height(&self) -> Result<u64, IndexerError> {
        let quantity: String = self.call("eth_blockNumber", vec![]).await?;
        Ok(parse_hex_u64(&quantity)?)
    }

    async fn events(
        &self,
        window: QueryWindow,
        topics: &[String],
    ) -> Result<Vec<RawEvent>, IndexerError> {
        let filter = json!({
            "address": self.contract,
            "fromBlock": format!("0x{:x}", window.from_block),
            "toBlock": format!("0x{:x}", window.to_block),
            "topics": [topics],
        });
        let logs: Vec<RawLog> = self.call("eth_getLogs", vec![filter]).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if log.is_removed() {
                tracing::debug!(tx = %log.tx_hash, "skipping removed log");
                continue;
            }
            events.push(log.into_event()?);
        }
        events.sort_by_key(|e| (e.block_number, e.log_index));
        tracing::debug!(%window, count = events.len(), "fetched logs");
        Ok(events)
    }

    async fn read_order(&self, id: i64) -> Result<Order, IndexerError> {
        let data = self
            .abi
            .get_order_call(id)
            .map_err(IndexerError::ChainUnavailable)?;
        let ret = self.eth_call(data).await?;
        self.abi
            .decode_order(&ret)
            .map_err(|e| IndexerError::ChainUnavailable(format!("invalid getOrder({id}) response: {e}")))
    }

    async fn read_match(&self, id: i64) -> Result<Match, IndexerError> {
        let data = self
            .abi
            .get_match_call(id)
            .map_err(IndexerError::ChainUnavailable)?;
        let ret = self.eth_call(data).await?;
        self.abi
            .decode_match(&ret)
            .map_err(|e| IndexerError::ChainUnavailable(format!("invalid getMatch({id}) response: {e}")))
    }
}
