//! Poll scheduler: runs an [`IndexPass`] forever with backoff on failure.
//!
//! - success: sleep `period`, reset the failure count;
//! - transient failure: sleep `backoff.delay(failures)`;
//! - `InvalidCheckpoint`: logged at error level and retried every `backoff.max`;
//! - fatal error (`NoCheckpoint`, `Config`): returned to the caller;
//! - cancellation: returns `Ok(())`.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backoff::BackoffPolicy;
use crate::catch_up::PassOutcome;
use crate::error::IndexerError;

/// One unit of scheduled work.
#[async_trait]
pub trait IndexPass: Send {
    async fn run_pass(&mut self, cancel: &CancellationToken) -> Result<PassOutcome, IndexerError>;

    /// Label used in log lines.
    fn name(&self) -> String {
        "indexer".into()
    }
}

/// Drives one source's passes.
pub struct PollScheduler<P> {
    pass: P,
    period: Duration,
    backoff: BackoffPolicy,
}

impl<P: IndexPass> PollScheduler<P> {
    pub fn new(pass: P, period: Duration, backoff: BackoffPolicy) -> Self {
        Self {
            pass,
            period,
            backoff,
        }
    }

    pub fn pass(&self) -> &P {
        &self.pass
    }

    pub fn into_inner(self) -> P {
        self.pass
    }

    /// Run until cancelled or a fatal error occurs.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), IndexerError> {
        let name = self.pass.name();
        let mut failures: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let delay = match self.pass.run_pass(cancel).await {
                Ok(outcome) => {
                    if failures > 0 {
                        tracing::info!(source = %name, failures, "recovered");
                    }
                    failures = 0;
                    tracing::info!(
                        source = %name,
                        windows = outcome.windows,
                        events = outcome.events,
                        created = outcome.created,
                        duplicates = outcome.duplicates,
                        updated = outcome.updated,
                        skipped = outcome.skipped,
                        checkpoint = outcome.checkpoint,
                        "pass complete"
                    );
                    self.period
                }
                Err(IndexerError::Cancelled) => break,
                Err(e) if e.is_fatal() => {
                    tracing::error!(source = %name, error = %e, "fatal, stopping");
                    return Err(e);
                }
                Err(e @ IndexerError::InvalidCheckpoint { .. }) => {
                    tracing::error!(
                        source = %name,
                        error = %e,
                        retry_in_ms = self.backoff.max.as_millis() as u64,
                        "checkpoint ahead of chain; operator attention needed"
                    );
                    self.backoff.max
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.backoff.delay(failures);
                    tracing::error!(
                        source = %name,
                        error = %e,
                        attempt = failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "pass failed"
                    );
                    delay
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(source = %name, "stopped");
        Ok(())
    }
}
