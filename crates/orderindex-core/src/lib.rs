//! orderindex-core: the catch-up engine behind OrderIndex.
//!
//! # Architecture
//!
//! ```text
//! PollScheduler → CatchUpController
//!                      ├── RangePlanner      (bounded, contiguous block windows)
//!                      ├── ChainReader       (height, logs, entity reads)
//!                      ├── EventDispatcher   (decode + idempotent apply)
//!                      │       └── EventSink (collector writes)
//!                      └── CheckpointManager (last fully applied block)
//! ```
//!
//! The crate is chain-agnostic: the EVM reader, the ABI codec and the
//! collector client live in `orderindex-evm` and `orderindex-storage` and
//! plug in through the traits re-exported here.

pub mod backoff;
pub mod catch_up;
pub mod chain;
pub mod checkpoint;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod indexer;
pub mod planner;
pub mod scheduler;
pub mod sink;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::BackoffPolicy;
pub use catch_up::{CatchUpController, PassOutcome};
pub use chain::{ChainReader, LogSubscriber, LogSubscription};
pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore, MemoryCheckpointStore};
pub use context::CallContext;
pub use dispatcher::{Applied, EventDispatcher};
pub use error::IndexerError;
pub use event::{ContractEvent, EventDecoder, EventKind, RawEvent};
pub use indexer::{IndexerConfig, IndexerState, UpdateSource};
pub use planner::{plan, QueryWindow, WindowPlan};
pub use scheduler::{IndexPass, PollScheduler};
pub use sink::EventSink;
pub use types::{Match, MatchState, Order, OrderState, OrderStatus, SourceKey};
