//! YAML configuration file.
//!
//! ```yaml
//! log:
//!   level: info
//! collector:
//!   endpoint: http://aggregator:8000/integrations/order-aggregator/
//! checkpoint:
//!   backend: collector        # collector | sqlite | memory
//! networks:
//!   - chain_id: 97
//!     rpc: https://data-seed-prebsc-1-s1.binance.org:8545
//!     contract: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
//!     max_window: 5000
//!     poll_interval_ms: 30000
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use orderindex_core::IndexerConfig;
use orderindex_evm::IndexerBuilder;
use orderindex_storage::CollectorConfig;

use crate::logging::LogConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    pub networks: Vec<NetworkConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    /// `{chainId}/block` on the collector.
    #[default]
    Collector,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    /// Database file for the `sqlite` backend.
    pub path: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::Collector,
            path: "orderindex.db".into(),
        }
    }
}

/// One monitored network.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC HTTP endpoint.
    pub rpc: String,
    /// WebSocket endpoint, required when `live` is set.
    #[serde(default)]
    pub ws: Option<String>,
    #[serde(flatten)]
    pub indexer: IndexerConfig,
}

impl NetworkConfig {
    pub fn builder(&self) -> IndexerBuilder {
        let builder = IndexerBuilder::from_config(self.indexer.clone()).rpc_url(&self.rpc);
        match (&self.ws, self.indexer.live) {
            (Some(ws), true) => builder.ws_url(ws),
            _ => builder,
        }
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("parsing YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            bail!("at least one network is required");
        }
        let mut chains = HashSet::new();
        for (i, net) in self.networks.iter().enumerate() {
            net.indexer
                .validate()
                .with_context(|| format!("networks[{i}]"))?;
            if net.rpc.is_empty() {
                bail!("networks[{i}]: rpc is required");
            }
            if net.indexer.live && net.ws.is_none() {
                bail!("networks[{i}]: live mode requires ws");
            }
            // the collector keys orders and blocks by chain id
            if !chains.insert(net.indexer.chain_id) {
                bail!("networks[{i}]: chain id {} listed twice", net.indexer.chain_id);
            }
        }
        Ok(())
    }
}
