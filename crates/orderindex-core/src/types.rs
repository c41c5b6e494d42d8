//! Shared types for the indexing pipeline.

use serde::{Deserialize, Serialize};

// ─── SourceKey ────────────────────────────────────────────────────────────────

/// Identifies one monitored chain/contract pair. Checkpoints are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    /// EVM chain id.
    pub chain_id: i64,
    /// Contract address (`0x…`), stored lowercase.
    pub contract: String,
}

impl SourceKey {
    pub fn new(chain_id: i64, contract: impl Into<String>) -> Self {
        Self {
            chain_id,
            contract: contract.into().to_ascii_lowercase(),
        }
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.contract)
    }
}

// ─── Order ────────────────────────────────────────────────────────────────────

/// On-chain order state. Discriminants match the contract's enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    None,
    AwaitingMatch,
    Executed,
    Cancelled,
}

impl OrderState {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::AwaitingMatch => 1,
            Self::Executed => 2,
            Self::Cancelled => 3,
        }
    }
}

impl TryFrom<u8> for OrderState {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::AwaitingMatch),
            2 => Ok(Self::Executed),
            3 => Ok(Self::Cancelled),
            other => Err(other),
        }
    }
}

/// The mutable part of an order, carried by `OrderUpdated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub state: OrderState,
    /// Match that executed the order; `None` while unset on-chain (zero).
    pub match_id: Option<i64>,
    /// Contract on the destination chain that holds the match.
    pub match_contract: Option<String>,
}

impl OrderStatus {
    pub fn new(state: OrderState) -> Self {
        Self {
            state,
            match_id: None,
            match_contract: None,
        }
    }
}

/// An order as stored downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Chain the order was created on.
    pub src_chain: i64,
    pub creator: String,
    pub sell_token: String,
    pub buy_token: String,
    /// Decimal string; token amounts are uint256 on-chain.
    pub sell_amount: String,
    pub buy_amount: String,
    pub dest_chain: i64,
    pub state: OrderState,
    pub executed_by_match: Option<i64>,
    pub match_contract: Option<String>,
    pub use_relayer: bool,
}

impl Order {
    /// The current status fields of this order.
    pub fn status(&self) -> OrderStatus {
        OrderStatus {
            state: self.state,
            match_id: self.executed_by_match,
            match_contract: self.match_contract.clone(),
        }
    }
}

// ─── Match ────────────────────────────────────────────────────────────────────

/// On-chain match state. Discriminants match the contract's enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchState {
    None,
    AwaitingFinalization,
    Executed,
    Cancelled,
}

impl MatchState {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::AwaitingFinalization => 1,
            Self::Executed => 2,
            Self::Cancelled => 3,
        }
    }
}

impl TryFrom<u8> for MatchState {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::AwaitingFinalization),
            2 => Ok(Self::Executed),
            3 => Ok(Self::Cancelled),
            other => Err(other),
        }
    }
}

/// A match order as stored downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    /// Chain the match was created on.
    pub src_chain: i64,
    pub origin_order_id: i64,
    pub origin_chain: i64,
    pub creator: String,
    pub sell_token: String,
    pub sell_amount: String,
    pub state: MatchState,
    pub use_relayer: bool,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_key_display_lowercases_contract() {
        let key = SourceKey::new(97, "0xAbCd");
        assert_eq!(key.to_string(), "97:0xabcd");
    }

    #[test]
    fn order_state_from_u8() {
        assert_eq!(OrderState::try_from(1), Ok(OrderState::AwaitingMatch));
        assert_eq!(OrderState::try_from(3), Ok(OrderState::Cancelled));
        assert_eq!(OrderState::try_from(9), Err(9));
        assert_eq!(OrderState::Executed.as_u8(), 2);
    }

    #[test]
    fn match_state_from_u8() {
        assert_eq!(MatchState::try_from(1), Ok(MatchState::AwaitingFinalization));
        assert_eq!(MatchState::try_from(4), Err(4));
    }
}
