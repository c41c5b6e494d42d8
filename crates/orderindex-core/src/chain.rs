//! Chain-facing interfaces: the pull-based reader and the push-based
//! log subscriber.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::IndexerError;
use crate::event::RawEvent;
use crate::planner::QueryWindow;
use crate::types::{Match, Order};

/// Read access to the monitored contract on one chain.
///
/// All failures surface as [`IndexerError::ChainUnavailable`] (or
/// `Timeout`); implementations do not retry beyond their own transport
/// policy.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Latest block height the node reports.
    async fn current_height(&self) -> Result<u64, IndexerError>;

    /// Logs in `window` whose `topics[0]` is one of `topics`, in chain order
    /// (block number, then log index).
    async fn events(
        &self,
        window: QueryWindow,
        topics: &[String],
    ) -> Result<Vec<RawEvent>, IndexerError>;

    /// Authoritative order read by id.
    async fn read_order(&self, id: i64) -> Result<Order, IndexerError>;

    /// Authoritative match read by id.
    async fn read_match(&self, id: i64) -> Result<Match, IndexerError>;
}

/// Opens push-based log streams for live mode.
#[async_trait]
pub trait LogSubscriber: Send + Sync {
    async fn subscribe(&self, topics: &[String]) -> Result<LogSubscription, IndexerError>;
}

/// Receiving end of a live log stream.
///
/// The stream ends (`next` returns `None`) when the producer closes the
/// connection; an `Err` item reports a transport failure.
#[derive(Debug)]
pub struct LogSubscription {
    rx: mpsc::UnboundedReceiver<Result<RawEvent, IndexerError>>,
}

impl LogSubscription {
    /// Create a subscription together with the sender that feeds it.
    pub fn channel() -> (mpsc::UnboundedSender<Result<RawEvent, IndexerError>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    pub async fn next(&mut self) -> Option<Result<RawEvent, IndexerError>> {
        self.rx.recv().await
    }
}
