//! Per-call timeout and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::IndexerError;

/// Wraps every suspending call the engine makes (chain reads, sink writes,
/// checkpoint I/O) with the scheduler's cancellation token and a request
/// timeout.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    timeout: Duration,
}

impl CallContext {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail fast with `Cancelled` if the token has fired.
    pub fn check(&self) -> Result<(), IndexerError> {
        if self.cancel.is_cancelled() {
            Err(IndexerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run `fut` to completion unless the token fires or the timeout elapses.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, IndexerError>
    where
        F: Future<Output = Result<T, IndexerError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IndexerError::Cancelled),
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(IndexerError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                }),
            },
        }
    }
}
