//! orderindex-storage: downstream sinks and checkpoint stores for OrderIndex.
//!
//! - [`collector`]: JSON:API client for the order aggregator; both the
//!   [`EventSink`](orderindex_core::EventSink) and a checkpoint store
//! - [`memory`]: in-memory sink + checkpoint store (dry runs, tests)
//! - [`sqlite`]: local checkpoint store via `sqlx` (feature `sqlite`)

pub mod collector;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use collector::{CollectorClient, CollectorConfig};
pub use memory::InMemorySink;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;
