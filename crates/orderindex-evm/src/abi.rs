//! ABI codec for the order-book contract.
//!
//! Event fingerprints are `keccak256` of the canonical signature; payloads
//! and getter return values are decoded with alloy's dynamic ABI types.
//!
//! Layouts:
//!
//! ```text
//! Order  = (uint256 id, address creator, address sellToken, address buyToken,
//!           uint256 sellAmount, uint256 buyAmount, uint256 destChain, Status)
//! Status = (uint8 state, uint256 matchId, address matchContract)
//! Match  = (uint256 id, uint256 originChain, uint256 originOrderId,
//!           address creator, address sellToken, uint256 sellAmount, uint8 state)
//! ```

use std::collections::HashMap;

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, U256};
use tiny_keccak::{Hasher, Keccak};

use orderindex_core::{
    ContractEvent, EventDecoder, EventKind, Match, MatchState, Order, OrderState, OrderStatus,
    RawEvent,
};

pub const GET_ORDER: &str = "getOrder(uint256)";
pub const GET_MATCH: &str = "getMatch(uint256)";

// ─── Hashing ──────────────────────────────────────────────────────────────────

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// `topics[0]` of `kind`, `0x`-prefixed lowercase hex.
pub fn event_topic(kind: EventKind) -> String {
    format!("0x{}", hex::encode(keccak256(kind.signature().as_bytes())))
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

// ─── Types ────────────────────────────────────────────────────────────────────

pub fn status_type() -> DynSolType {
    DynSolType::Tuple(vec![
        DynSolType::Uint(8),
        DynSolType::Uint(256),
        DynSolType::Address,
    ])
}

pub fn order_type() -> DynSolType {
    DynSolType::Tuple(vec![
        DynSolType::Uint(256),
        DynSolType::Address,
        DynSolType::Address,
        DynSolType::Address,
        DynSolType::Uint(256),
        DynSolType::Uint(256),
        DynSolType::Uint(256),
        status_type(),
    ])
}

pub fn match_type() -> DynSolType {
    DynSolType::Tuple(vec![
        DynSolType::Uint(256),
        DynSolType::Uint(256),
        DynSolType::Uint(256),
        DynSolType::Address,
        DynSolType::Address,
        DynSolType::Uint(256),
        DynSolType::Uint(8),
    ])
}

// ─── ContractAbi ──────────────────────────────────────────────────────────────

/// Topic table and codec for the four monitored events.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    by_topic: HashMap<String, EventKind>,
}

impl Default for ContractAbi {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractAbi {
    pub fn new() -> Self {
        let by_topic = EventKind::ALL
            .into_iter()
            .map(|kind| (event_topic(kind), kind))
            .collect();
        Self { by_topic }
    }

    /// Calldata for `getOrder(id)`.
    pub fn get_order_call(&self, id: i64) -> Result<Vec<u8>, String> {
        getter_call(GET_ORDER, id)
    }

    /// Calldata for `getMatch(id)`.
    pub fn get_match_call(&self, id: i64) -> Result<Vec<u8>, String> {
        getter_call(GET_MATCH, id)
    }

    /// Decode the return data of `getOrder`.
    pub fn decode_order(&self, data: &[u8]) -> Result<Order, String> {
        let value = order_type().abi_decode(data).map_err(|e| e.to_string())?;
        order_from_value(value)
    }

    /// Decode the return data of `getMatch`.
    pub fn decode_match(&self, data: &[u8]) -> Result<Match, String> {
        let value = match_type().abi_decode(data).map_err(|e| e.to_string())?;
        match_from_value(value)
    }
}

impl EventDecoder for ContractAbi {
    fn topics(&self) -> Vec<String> {
        EventKind::ALL.into_iter().map(event_topic).collect()
    }

    fn classify(&self, topic0: &str) -> Option<EventKind> {
        self.by_topic.get(&topic0.to_ascii_lowercase()).copied()
    }

    fn decode(&self, kind: EventKind, raw: &RawEvent) -> Result<ContractEvent, String> {
        match kind {
            EventKind::OrderCreated => {
                let ty = DynSolType::Tuple(vec![order_type(), DynSolType::Bool]);
                let mut fields = tuple(decode_data(&ty, &raw.data)?, 2, "OrderCreated")?;
                let use_relayer = as_bool(&fields[1], "useRelayer")?;
                let order = order_from_value(fields.swap_remove(0))?;
                Ok(ContractEvent::OrderCreated {
                    order_id: order.id,
                    use_relayer,
                })
            }
            EventKind::OrderUpdated => {
                let order_id = indexed_id(raw, "orderId")?;
                let ty = DynSolType::Tuple(vec![status_type()]);
                let mut fields = tuple(decode_data(&ty, &raw.data)?, 1, "OrderUpdated")?;
                let status = status_from_value(fields.swap_remove(0))?;
                Ok(ContractEvent::OrderUpdated { order_id, status })
            }
            EventKind::MatchCreated => {
                let ty = DynSolType::Tuple(vec![match_type(), DynSolType::Bool]);
                let mut fields = tuple(decode_data(&ty, &raw.data)?, 2, "MatchCreated")?;
                let use_relayer = as_bool(&fields[1], "useRelayer")?;
                let m = match_from_value(fields.swap_remove(0))?;
                Ok(ContractEvent::MatchCreated {
                    match_id: m.id,
                    use_relayer,
                })
            }
            EventKind::MatchUpdated => {
                let match_id = indexed_id(raw, "matchId")?;
                let ty = DynSolType::Tuple(vec![DynSolType::Uint(8)]);
                let fields = tuple(decode_data(&ty, &raw.data)?, 1, "MatchUpdated")?;
                let state = match_state(&fields[0])?;
                Ok(ContractEvent::MatchUpdated { match_id, state })
            }
        }
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn getter_call(signature: &str, id: i64) -> Result<Vec<u8>, String> {
    let id = u64::try_from(id).map_err(|_| format!("negative id {id}"))?;
    let mut data = selector(signature).to_vec();
    data.extend(DynSolValue::Uint(U256::from(id), 256).abi_encode());
    Ok(data)
}

fn decode_data(ty: &DynSolType, data: &[u8]) -> Result<DynSolValue, String> {
    ty.abi_decode(data).map_err(|e| format!("abi decode failed: {e}"))
}

fn indexed_id(raw: &RawEvent, what: &str) -> Result<i64, String> {
    let topic = raw
        .topics
        .get(1)
        .ok_or_else(|| format!("missing indexed {what}"))?;
    let bytes = hex::decode(topic.trim_start_matches("0x"))
        .map_err(|e| format!("invalid topic hex: {e}"))?;
    let value = DynSolType::Uint(256)
        .abi_decode(&bytes)
        .map_err(|e| format!("topic decode: {e}"))?;
    as_i64(&value, what)
}

fn tuple(value: DynSolValue, len: usize, what: &str) -> Result<Vec<DynSolValue>, String> {
    match value {
        DynSolValue::Tuple(fields) if fields.len() == len => Ok(fields),
        other => Err(format!("{what}: expected {len}-tuple, got {other:?}")),
    }
}

fn as_uint(value: &DynSolValue, what: &str) -> Result<U256, String> {
    match value {
        DynSolValue::Uint(u, _) => Ok(*u),
        other => Err(format!("{what}: expected uint, got {other:?}")),
    }
}

fn as_i64(value: &DynSolValue, what: &str) -> Result<i64, String> {
    let u = as_uint(value, what)?;
    i64::try_from(u).map_err(|_| format!("{what} {u} does not fit in i64"))
}

fn as_u8(value: &DynSolValue, what: &str) -> Result<u8, String> {
    let u = as_uint(value, what)?;
    u8::try_from(u).map_err(|_| format!("{what} {u} does not fit in u8"))
}

fn as_bool(value: &DynSolValue, what: &str) -> Result<bool, String> {
    match value {
        DynSolValue::Bool(b) => Ok(*b),
        other => Err(format!("{what}: expected bool, got {other:?}")),
    }
}

fn as_address(value: &DynSolValue, what: &str) -> Result<Address, String> {
    match value {
        DynSolValue::Address(a) => Ok(*a),
        other => Err(format!("{what}: expected address, got {other:?}")),
    }
}

fn match_state(value: &DynSolValue) -> Result<MatchState, String> {
    let raw = as_u8(value, "state")?;
    MatchState::try_from(raw).map_err(|v| format!("unknown match state {v}"))
}

fn status_from_value(value: DynSolValue) -> Result<OrderStatus, String> {
    let f = tuple(value, 3, "status")?;
    let raw_state = as_u8(&f[0], "state")?;
    let state = OrderState::try_from(raw_state).map_err(|v| format!("unknown order state {v}"))?;
    let match_id = Some(as_i64(&f[1], "matchId")?).filter(|id| *id != 0);
    let match_contract = Some(as_address(&f[2], "matchSwapica")?)
        .filter(|a| *a != Address::ZERO)
        .map(|a| a.to_string());
    Ok(OrderStatus {
        state,
        match_id,
        match_contract,
    })
}

fn order_from_value(value: DynSolValue) -> Result<Order, String> {
    let mut f = tuple(value, 8, "order")?;
    let status = status_from_value(f.swap_remove(7))?;
    Ok(Order {
        id: as_i64(&f[0], "orderId")?,
        src_chain: 0,
        creator: as_address(&f[1], "creator")?.to_string(),
        sell_token: as_address(&f[2], "tokenToSell")?.to_string(),
        buy_token: as_address(&f[3], "tokenToBuy")?.to_string(),
        sell_amount: as_uint(&f[4], "amountToSell")?.to_string(),
        buy_amount: as_uint(&f[5], "amountToBuy")?.to_string(),
        dest_chain: as_i64(&f[6], "destinationChain")?,
        state: status.state,
        executed_by_match: status.match_id,
        match_contract: status.match_contract,
        use_relayer: false,
    })
}

fn match_from_value(value: DynSolValue) -> Result<Match, String> {
    let f = tuple(value, 7, "match")?;
    Ok(Match {
        id: as_i64(&f[0], "matchId")?,
        src_chain: 0,
        origin_chain: as_i64(&f[1], "originChainId")?,
        origin_order_id: as_i64(&f[2], "originOrderId")?,
        creator: as_address(&f[3], "creator")?.to_string(),
        sell_token: as_address(&f[4], "tokenToSell")?.to_string(),
        sell_amount: as_uint(&f[5], "amountToSell")?.to_string(),
        state: match_state(&f[6])?,
        use_relayer: false,
    })
}
