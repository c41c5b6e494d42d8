//! In-crate fakes for the chain, the decoder and the sink.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainReader, LogSubscriber, LogSubscription};
use crate::context::CallContext;
use crate::error::IndexerError;
use crate::event::{ContractEvent, EventDecoder, EventKind, RawEvent};
use crate::planner::QueryWindow;
use crate::sink::EventSink;
use crate::types::{Match, MatchState, Order, OrderState, OrderStatus};

pub const CHAIN_ID: i64 = 97;
pub const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";

pub fn cx() -> CallContext {
    CallContext::new(CancellationToken::new(), Duration::from_secs(5))
}

pub fn topic(kind: EventKind) -> String {
    format!("topic:{}", kind.name())
}

/// A log whose payload is the JSON form of `event`, understood by [`FakeDecoder`].
pub fn raw_event(block_number: u64, log_index: u32, event: &ContractEvent) -> RawEvent {
    RawEvent {
        address: CONTRACT.into(),
        topics: vec![topic(event.kind())],
        data: serde_json::to_vec(event).unwrap(),
        block_number,
        log_index,
        tx_hash: format!("0xtx{block_number}_{log_index}"),
    }
}

pub fn order(id: i64, state: OrderState) -> Order {
    Order {
        id,
        src_chain: 0,
        creator: "0x00000000000000000000000000000000000000c1".into(),
        sell_token: "0x00000000000000000000000000000000000000d1".into(),
        buy_token: "0x00000000000000000000000000000000000000d2".into(),
        sell_amount: "1000000000000000000".into(),
        buy_amount: "2500".into(),
        dest_chain: 5,
        state,
        executed_by_match: None,
        match_contract: None,
        use_relayer: false,
    }
}

pub fn matched(id: i64, state: MatchState) -> Match {
    Match {
        id,
        src_chain: 0,
        origin_order_id: 7,
        origin_chain: 5,
        creator: "0x00000000000000000000000000000000000000c2".into(),
        sell_token: "0x00000000000000000000000000000000000000d3".into(),
        sell_amount: "42".into(),
        state,
        use_relayer: false,
    }
}

// ─── FakeDecoder ──────────────────────────────────────────────────────────────

/// Decodes JSON-serialized [`ContractEvent`] payloads.
pub struct FakeDecoder;

impl EventDecoder for FakeDecoder {
    fn topics(&self) -> Vec<String> {
        EventKind::ALL.iter().map(|k| topic(*k)).collect()
    }

    fn classify(&self, topic0: &str) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|k| topic(*k) == topic0)
    }

    fn decode(&self, kind: EventKind, raw: &RawEvent) -> Result<ContractEvent, String> {
        let event: ContractEvent = serde_json::from_slice(&raw.data).map_err(|e| e.to_string())?;
        if event.kind() != kind {
            return Err(format!("payload is {}, topic says {kind}", event.kind()));
        }
        Ok(event)
    }
}

// ─── FakeChain ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeChain {
    height: Mutex<u64>,
    logs: Mutex<Vec<RawEvent>>,
    orders: Mutex<HashMap<i64, Order>>,
    matches: Mutex<HashMap<i64, Match>>,
    queried: Mutex<Vec<QueryWindow>>,
    order_reads: AtomicUsize,
    unavailable: Mutex<bool>,
}

impl FakeChain {
    pub fn new(height: u64) -> Self {
        Self {
            height: Mutex::new(height),
            ..Default::default()
        }
    }

    pub fn set_unavailable(&self, down: bool) {
        *self.unavailable.lock().unwrap() = down;
    }

    pub fn push_log(&self, log: RawEvent) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn put_order(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id, order);
    }

    pub fn put_match(&self, m: Match) {
        self.matches.lock().unwrap().insert(m.id, m);
    }

    pub fn queried(&self) -> Vec<QueryWindow> {
        self.queried.lock().unwrap().clone()
    }

    pub fn order_reads(&self) -> usize {
        self.order_reads.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> Result<(), IndexerError> {
        if *self.unavailable.lock().unwrap() {
            return Err(IndexerError::ChainUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn current_height(&self) -> Result<u64, IndexerError> {
        self.check_up()?;
        Ok(*self.height.lock().unwrap())
    }

    async fn events(
        &self,
        window: QueryWindow,
        topics: &[String],
    ) -> Result<Vec<RawEvent>, IndexerError> {
        self.check_up()?;
        self.queried.lock().unwrap().push(window);
        let mut out: Vec<RawEvent> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| window.contains(l.block_number))
            .filter(|l| l.topic0().is_some_and(|t| topics.iter().any(|x| x == t)))
            .cloned()
            .collect();
        out.sort_by_key(|l| (l.block_number, l.log_index));
        Ok(out)
    }

    async fn read_order(&self, id: i64) -> Result<Order, IndexerError> {
        self.check_up()?;
        self.order_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .orders
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| order(id, OrderState::None)))
    }

    async fn read_match(&self, id: i64) -> Result<Match, IndexerError> {
        self.check_up()?;
        Ok(self
            .matches
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| matched(id, MatchState::None)))
    }
}

// ─── FakeSubscriber ───────────────────────────────────────────────────────────

/// Hands out a single pre-built subscription.
#[derive(Default)]
pub struct FakeSubscriber {
    sub: Mutex<Option<LogSubscription>>,
}

impl FakeSubscriber {
    pub fn new(sub: LogSubscription) -> Self {
        Self {
            sub: Mutex::new(Some(sub)),
        }
    }
}

#[async_trait]
impl LogSubscriber for FakeSubscriber {
    async fn subscribe(&self, _topics: &[String]) -> Result<LogSubscription, IndexerError> {
        self.sub
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| IndexerError::ChainUnavailable("already subscribed".into()))
    }
}

// ─── RecordingSink ────────────────────────────────────────────────────────────

/// Sink that records every accepted write and can fail on the N-th call.
#[derive(Default)]
pub struct RecordingSink {
    orders: Mutex<Vec<Order>>,
    matches: Mutex<Vec<Match>>,
    order_ids: Mutex<HashSet<(i64, i64)>>,
    match_ids: Mutex<HashSet<(i64, i64)>>,
    order_updates: Mutex<Vec<(i64, i64, OrderStatus)>>,
    match_updates: Mutex<Vec<(i64, i64, MatchState)>>,
    ops: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail_on: Mutex<Option<usize>>,
}

impl RecordingSink {
    /// Fail the `n`-th call (1-based) with `SinkUnavailable`.
    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on: Mutex::new(Some(n)),
            ..Default::default()
        }
    }

    pub fn heal(&self) {
        *self.fail_on.lock().unwrap() = None;
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().clone()
    }

    pub fn matches(&self) -> Vec<Match> {
        self.matches.lock().unwrap().clone()
    }

    pub fn order_updates(&self) -> Vec<(i64, i64, OrderStatus)> {
        self.order_updates.lock().unwrap().clone()
    }

    pub fn match_updates(&self) -> Vec<(i64, i64, MatchState)> {
        self.match_updates.lock().unwrap().clone()
    }

    /// Accepted writes in arrival order, e.g. `"create_order:7"`.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), IndexerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on.lock().unwrap() == Some(n) {
            return Err(IndexerError::SinkUnavailable("503 Service Unavailable".into()));
        }
        Ok(())
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn create_order(&self, order: &Order) -> Result<(), IndexerError> {
        self.enter()?;
        if !self.order_ids.lock().unwrap().insert((order.src_chain, order.id)) {
            return Err(IndexerError::SinkConflict { entity: "order", id: order.id });
        }
        self.orders.lock().unwrap().push(order.clone());
        self.record(format!("create_order:{}", order.id));
        Ok(())
    }

    async fn update_order(
        &self,
        src_chain: i64,
        id: i64,
        status: &OrderStatus,
    ) -> Result<(), IndexerError> {
        self.enter()?;
        self.order_updates
            .lock()
            .unwrap()
            .push((src_chain, id, status.clone()));
        self.record(format!("update_order:{id}"));
        Ok(())
    }

    async fn create_match(&self, m: &Match) -> Result<(), IndexerError> {
        self.enter()?;
        if !self.match_ids.lock().unwrap().insert((m.src_chain, m.id)) {
            return Err(IndexerError::SinkConflict { entity: "match", id: m.id });
        }
        self.matches.lock().unwrap().push(m.clone());
        self.record(format!("create_match:{}", m.id));
        Ok(())
    }

    async fn update_match(
        &self,
        src_chain: i64,
        id: i64,
        state: MatchState,
    ) -> Result<(), IndexerError> {
        self.enter()?;
        self.match_updates.lock().unwrap().push((src_chain, id, state));
        self.record(format!("update_match:{id}"));
        Ok(())
    }
}
