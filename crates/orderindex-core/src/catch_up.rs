//! Catch-up controller: one indexing pass for one source.
//!
//! A pass loads (or seeds) the checkpoint, plans windows up to the current
//! chain height, applies every log of each window through the dispatcher and
//! only then commits `window.to_block`. Any error aborts the remaining
//! windows, leaving the checkpoint at the last fully applied window.
//!
//! With live mode enabled and a [`LogSubscriber`] wired, the pass then opens
//! a subscription, runs one more catch-up to close the gap, and applies
//! pushed logs until the stream ends. Live commits trail by one block
//! (`log.block - 1`) because later logs of the same block may still arrive.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::chain::{ChainReader, LogSubscriber, LogSubscription};
use crate::checkpoint::{CheckpointManager, CheckpointStore};
use crate::context::CallContext;
use crate::dispatcher::{Applied, EventDispatcher};
use crate::error::IndexerError;
use crate::indexer::{IndexerConfig, IndexerState};
use crate::planner::plan;
use crate::scheduler::IndexPass;

/// Summary of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassOutcome {
    pub windows: usize,
    pub events: usize,
    pub created: usize,
    pub duplicates: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Checkpoint after the pass.
    pub checkpoint: u64,
}

impl PassOutcome {
    fn record(&mut self, applied: Applied) {
        self.events += 1;
        match applied {
            Applied::Created => self.created += 1,
            Applied::AlreadyExists => self.duplicates += 1,
            Applied::Updated => self.updated += 1,
            Applied::Skipped => self.skipped += 1,
        }
    }

    fn merge(&mut self, other: PassOutcome) {
        self.windows += other.windows;
        self.events += other.events;
        self.created += other.created;
        self.duplicates += other.duplicates;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.checkpoint = self.checkpoint.max(other.checkpoint);
    }
}

/// Per-source indexing state machine.
pub struct CatchUpController {
    config: IndexerConfig,
    chain: Arc<dyn ChainReader>,
    dispatcher: EventDispatcher,
    checkpoint: CheckpointManager,
    subscriber: Option<Arc<dyn LogSubscriber>>,
    topics: Vec<String>,
    state: IndexerState,
}

impl CatchUpController {
    pub fn new(
        config: IndexerConfig,
        chain: Arc<dyn ChainReader>,
        dispatcher: EventDispatcher,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let topics = dispatcher.topics();
        let checkpoint = CheckpointManager::new(store, config.source_key());
        Self {
            config,
            chain,
            dispatcher,
            checkpoint,
            subscriber: None,
            topics,
            state: IndexerState::Idle,
        }
    }

    /// Enable live following through `subscriber` (when `config.live` is set).
    pub fn with_subscriber(mut self, subscriber: Arc<dyn LogSubscriber>) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    pub fn state(&self) -> IndexerState {
        self.state
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Last checkpoint committed or loaded by this controller.
    pub fn checkpoint(&self) -> Option<u64> {
        self.checkpoint.last()
    }

    /// Run one pass (plus live following, if enabled).
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<PassOutcome, IndexerError> {
        let cx = CallContext::new(cancel.clone(), self.config.request_timeout());
        self.state = IndexerState::CatchingUp;
        let res = self.run_inner(&cx).await;
        self.state = match &res {
            Ok(_) => IndexerState::Idle,
            Err(IndexerError::Cancelled) => IndexerState::Stopped,
            Err(_) => IndexerState::Error,
        };
        res
    }

    async fn run_inner(&mut self, cx: &CallContext) -> Result<PassOutcome, IndexerError> {
        let mut outcome = self.catch_up(cx).await?;

        let Some(subscriber) = self.subscriber.clone().filter(|_| self.config.live) else {
            return Ok(outcome);
        };
        let mut subscription = cx.call(subscriber.subscribe(&self.topics)).await?;
        // Logs emitted between the end of the pass and the subscription
        // becoming active are picked up here.
        outcome.merge(self.catch_up(cx).await?);

        self.state = IndexerState::Live;
        tracing::info!(source = %self.checkpoint.key(), checkpoint = outcome.checkpoint, "following chain head");
        self.follow(cx, &mut subscription, &mut outcome).await?;
        Ok(outcome)
    }

    async fn catch_up(&mut self, cx: &CallContext) -> Result<PassOutcome, IndexerError> {
        let last = self
            .checkpoint
            .load_or_seed(cx, self.config.seed_checkpoint)
            .await?;
        let height = cx.call(self.chain.current_height()).await?;
        let windows = plan(last, height, self.config.max_window)?;

        let mut outcome = PassOutcome {
            checkpoint: last,
            ..Default::default()
        };
        if windows.remaining() == 0 {
            tracing::debug!(source = %self.checkpoint.key(), height, "up to date");
            return Ok(outcome);
        }
        tracing::info!(
            source = %self.checkpoint.key(),
            from = last + 1,
            to = height,
            windows = windows.remaining(),
            "catching up"
        );

        for window in windows {
            cx.check()?;
            let logs = cx.call(self.chain.events(window, &self.topics)).await?;
            for raw in &logs {
                let applied = self.dispatcher.apply(cx, raw).await?;
                outcome.record(applied);
            }
            self.checkpoint.commit(cx, window.to_block).await?;
            outcome.windows += 1;
            outcome.checkpoint = window.to_block;
            tracing::info!(
                from = window.from_block,
                to = window.to_block,
                blocks = window.block_count(),
                events = logs.len(),
                "window applied"
            );
        }
        Ok(outcome)
    }

    async fn follow(
        &mut self,
        cx: &CallContext,
        subscription: &mut LogSubscription,
        outcome: &mut PassOutcome,
    ) -> Result<(), IndexerError> {
        loop {
            let item = tokio::select! {
                biased;
                _ = cx.token().cancelled() => return Err(IndexerError::Cancelled),
                item = subscription.next() => item,
            };
            let raw = match item {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => return Err(e),
                None => {
                    tracing::info!(source = %self.checkpoint.key(), "subscription closed");
                    return Ok(());
                }
            };

            let last = self.checkpoint.last().unwrap_or(0);
            if raw.block_number <= last {
                tracing::debug!(block = raw.block_number, last, "log already covered, skipping");
                continue;
            }
            let applied = self.dispatcher.apply(cx, &raw).await?;
            outcome.record(applied);
            self.checkpoint.commit(cx, raw.block_number - 1).await?;
            outcome.checkpoint = self.checkpoint.last().unwrap_or(outcome.checkpoint);
        }
    }
}

#[async_trait]
impl IndexPass for CatchUpController {
    async fn run_pass(&mut self, cancel: &CancellationToken) -> Result<PassOutcome, IndexerError> {
        self.run(cancel).await
    }

    fn name(&self) -> String {
        self.checkpoint.key().to_string()
    }
}
