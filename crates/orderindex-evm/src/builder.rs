//! Fluent builder API for assembling an EVM indexer.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use orderindex_core::MemoryCheckpointStore;
//! use orderindex_evm::IndexerBuilder;
//! # fn sink() -> Arc<dyn orderindex_core::EventSink> { unimplemented!() }
//!
//! let controller = IndexerBuilder::new()
//!     .chain_id(97)
//!     .contract("0x5FbDB2315678afecb367f032d93F642f64180aa3")
//!     .rpc_url("https://data-seed-prebsc-1-s1.binance.org:8545")
//!     .max_window(5000)
//!     .seed_checkpoint(29_000_000)
//!     .build(sink(), Arc::new(MemoryCheckpointStore::new()))
//!     .unwrap();
//! ```

use std::sync::Arc;

use orderindex_core::{
    BackoffPolicy, CatchUpController, CheckpointStore, EventDispatcher, EventSink, IndexerConfig, IndexerError,
    UpdateSource,
};

use crate::abi::ContractAbi;
use crate::http::{HttpClientConfig, HttpRpcClient};
use crate::reader::EvmChainReader;
use crate::ws::WsLogSubscriber;

/// Fluent builder for `IndexerConfig` and the controller wired from it.
#[derive(Debug, Clone, Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
    rpc_url: Option<String>,
    ws_url: Option<String>,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: IndexerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn chain_id(mut self, chain_id: i64) -> Self {
        self.config.chain_id = chain_id;
        self
    }

    /// Set the order-book contract address.
    pub fn contract(mut self, address: impl Into<String>) -> Self {
        self.config.contract = address.into();
        self
    }

    /// Widest log query spans `max_window + 1` blocks; `0` = unbounded.
    pub fn max_window(mut self, blocks: u64) -> Self {
        self.config.max_window = blocks;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Checkpoint to persist on first run.
    pub fn seed_checkpoint(mut self, block: u64) -> Self {
        self.config.seed_checkpoint = Some(block);
        self
    }

    pub fn update_source(mut self, source: UpdateSource) -> Self {
        self.config.update_source = source;
        self
    }

    /// Failure backoff bounds in milliseconds.
    pub fn backoff_ms(mut self, min: u64, max: u64) -> Self {
        self.config.backoff_min_ms = min;
        self.config.backoff_max_ms = max;
        self
    }

    /// JSON-RPC HTTP endpoint.
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    /// WebSocket endpoint; enables live mode.
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self.config.live = true;
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// One attempt per call; the scheduler's backoff retries failed passes.
    fn transport_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            retry: BackoffPolicy::default().with_max_retries(0),
            request_timeout: self.config.request_timeout(),
        }
    }

    /// Build just the chain reader (for probes and status queries).
    pub fn reader(&self) -> Result<EvmChainReader<HttpRpcClient>, IndexerError> {
        let url = self
            .rpc_url
            .as_deref()
            .ok_or_else(|| IndexerError::Config("rpc url is required".into()))?;
        let http = HttpRpcClient::new(url, self.transport_config())
            .map_err(|e| IndexerError::Config(e.to_string()))?;
        Ok(EvmChainReader::new(http, self.config.contract.clone()))
    }

    /// Validate the configuration and wire a controller writing to `sink`.
    pub fn build(
        self,
        sink: Arc<dyn EventSink>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<CatchUpController, IndexerError> {
        self.config.validate()?;
        let chain = Arc::new(self.reader()?);
        let dispatcher = EventDispatcher::new(
            chain.clone(),
            sink,
            Arc::new(ContractAbi::new()),
            self.config.chain_id,
        )
        .with_update_source(self.config.update_source);

        let live = self.config.live;
        let contract = self.config.contract.clone();
        let controller = CatchUpController::new(self.config, chain, dispatcher, store);

        match (live, self.ws_url) {
            (true, Some(url)) => {
                Ok(controller.with_subscriber(Arc::new(WsLogSubscriber::new(url, contract))))
            }
            (true, None) => Err(IndexerError::Config("live mode requires a ws url".into())),
            (false, _) => Ok(controller),
        }
    }
}
