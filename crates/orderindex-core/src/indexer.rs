//! Indexer configuration and state types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;
use crate::error::IndexerError;
use crate::types::SourceKey;

/// Largest chain id accepted (EIP-2294).
pub const MAX_CHAIN_ID: i64 = (u64::MAX / 2 - 36) as i64;

/// Where `*Updated` events take the new status from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    /// Use the decoded event payload; no chain read.
    #[default]
    Event,
    /// Re-read the entity from the chain and use its current status.
    Chain,
}

/// Configuration for one monitored source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// EVM chain id of the monitored network.
    pub chain_id: i64,
    /// Order-book contract address (`0x…`).
    pub contract: String,
    /// Widest block span per log query is `max_window + 1`. `0` = unbounded.
    pub max_window: u64,
    /// Period between successful passes (milliseconds).
    pub poll_interval_ms: u64,
    /// Timeout for each chain/sink/checkpoint call (milliseconds).
    pub request_timeout_ms: u64,
    /// Checkpoint persisted on first run when the store is empty.
    pub seed_checkpoint: Option<u64>,
    /// Follow the chain head through a log subscription after catching up.
    pub live: bool,
    pub update_source: UpdateSource,
    /// First retry delay after a failed pass (milliseconds).
    pub backoff_min_ms: u64,
    /// Retry delay cap (milliseconds).
    pub backoff_max_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            contract: String::new(),
            max_window: 1000,
            poll_interval_ms: 60_000,
            request_timeout_ms: 10_000,
            seed_checkpoint: None,
            live: false,
            update_source: UpdateSource::Event,
            backoff_min_ms: 500,
            backoff_max_ms: 600_000,
        }
    }
}

impl IndexerConfig {
    pub fn source_key(&self) -> SourceKey {
        SourceKey::new(self.chain_id, &self.contract)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_min_ms),
            Duration::from_millis(self.backoff_max_ms),
        )
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if !(1..=MAX_CHAIN_ID).contains(&self.chain_id) {
            return Err(IndexerError::Config(format!(
                "chain id {} out of range 1..={MAX_CHAIN_ID}",
                self.chain_id
            )));
        }
        if !is_address(&self.contract) {
            return Err(IndexerError::Config(format!(
                "contract `{}` is not a 20-byte hex address",
                self.contract
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(IndexerError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(IndexerError::Config("request_timeout_ms must be > 0".into()));
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            return Err(IndexerError::Config(format!(
                "backoff_min_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_min_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }
}

fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Runtime state of one source's controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Not yet started, or between passes.
    Idle,
    /// Walking historical windows up to the chain height.
    CatchingUp,
    /// Applying pushed logs from a subscription.
    Live,
    /// Cancelled.
    Stopped,
    /// The last pass failed.
    Error,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CatchingUp => write!(f, "catching-up"),
            Self::Live => write!(f, "live"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}
