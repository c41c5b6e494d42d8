//! orderindex-evm: EVM side of OrderIndex.
//!
//! - [`rpc`] / [`http`]: JSON-RPC 2.0 wire types and a retrying HTTP transport
//! - [`abi`]: topic hashes, event decoding and getter calls for the order-book contract
//! - [`reader`]: [`ChainReader`](orderindex_core::ChainReader) over any transport
//! - [`ws`]: `eth_subscribe("logs")` backed [`LogSubscriber`](orderindex_core::LogSubscriber)
//! - [`builder`]: fluent assembly of a ready-to-run controller

pub mod abi;
pub mod builder;
pub mod error;
pub mod http;
pub mod reader;
pub mod rpc;
pub mod ws;

pub use abi::ContractAbi;
pub use builder::IndexerBuilder;
pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use reader::{EvmChainReader, RawLog};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, RpcTransport};
pub use ws::WsLogSubscriber;
