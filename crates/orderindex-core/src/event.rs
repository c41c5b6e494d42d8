//! Raw logs, the closed set of contract events, and the decoder seam.

use serde::{Deserialize, Serialize};

use crate::types::{MatchState, OrderStatus};

// ─── RawEvent ─────────────────────────────────────────────────────────────────

/// An undecoded log as returned by the chain. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Emitting contract (`0x…`).
    pub address: String,
    /// `topics[0]` is the event signature hash; the rest are indexed args.
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed arguments.
    pub data: Vec<u8>,
    pub block_number: u64,
    pub log_index: u32,
    pub tx_hash: String,
}

impl RawEvent {
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }
}

// ─── EventKind ────────────────────────────────────────────────────────────────

/// The four monitored contract events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    OrderCreated,
    OrderUpdated,
    MatchCreated,
    MatchUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        Self::OrderCreated,
        Self::OrderUpdated,
        Self::MatchCreated,
        Self::MatchUpdated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::OrderCreated => "OrderCreated",
            Self::OrderUpdated => "OrderUpdated",
            Self::MatchCreated => "MatchCreated",
            Self::MatchUpdated => "MatchUpdated",
        }
    }

    /// Canonical Solidity signature; `keccak256` of it is `topics[0]`.
    pub fn signature(self) -> &'static str {
        match self {
            Self::OrderCreated => {
                "OrderCreated((uint256,address,address,address,uint256,uint256,uint256,(uint8,uint256,address)),bool)"
            }
            Self::OrderUpdated => "OrderUpdated(uint256,(uint8,uint256,address))",
            Self::MatchCreated => {
                "MatchCreated((uint256,uint256,uint256,address,address,uint256,uint8),bool)"
            }
            Self::MatchUpdated => "MatchUpdated(uint256,uint8)",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── ContractEvent ────────────────────────────────────────────────────────────

/// A decoded contract event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    OrderCreated { order_id: i64, use_relayer: bool },
    OrderUpdated { order_id: i64, status: OrderStatus },
    MatchCreated { match_id: i64, use_relayer: bool },
    MatchUpdated { match_id: i64, state: MatchState },
}

impl ContractEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::OrderCreated { .. } => EventKind::OrderCreated,
            Self::OrderUpdated { .. } => EventKind::OrderUpdated,
            Self::MatchCreated { .. } => EventKind::MatchCreated,
            Self::MatchUpdated { .. } => EventKind::MatchUpdated,
        }
    }
}

// ─── EventDecoder ─────────────────────────────────────────────────────────────

/// Maps raw logs to [`ContractEvent`]s.
///
/// Synchronous and infallible apart from payload errors; the dispatcher turns
/// those into `MalformedEvent`.
pub trait EventDecoder: Send + Sync {
    /// `topics[0]` values of every monitored event, `0x`-prefixed lowercase hex.
    fn topics(&self) -> Vec<String>;

    /// Resolve a signature hash to its event kind.
    fn classify(&self, topic0: &str) -> Option<EventKind>;

    /// Decode `raw` as an event of `kind`.
    fn decode(&self, kind: EventKind, raw: &RawEvent) -> Result<ContractEvent, String>;
}
