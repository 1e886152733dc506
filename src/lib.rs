//! # IronShard
//!
//! `ironshard` is an in-process key-value store partitioned across a fixed
//! number of independently locked shards.
//!
//! Splitting one map into N shards, each behind its own reader/writer lock,
//! lets writers to different shards proceed in parallel where a single
//! global lock would serialize them.
//!
//! ## Key Features
//!
//! * **Deterministic Routing**: Keys map to shards via a SHA-256 digest, stable across processes.
//! * **Per-Shard Locking**: Readers share a shard; a writer excludes only its own shard.
//! * **Parallel Enumeration**: `keys()` scans every shard on its own thread.
//! * **Bounded Waits**: Optional lock timeout for the `try_*` operations.
//!
//! ## Example
//!
//! ```
//! use ironshard::{ShardedStore, StoreOptions};
//!
//! # fn main() -> ironshard::Result<()> {
//! let store = ShardedStore::new(StoreOptions::new(5))?;
//!
//! store.set("alpha", 1);
//! store.set("beta", 2);
//!
//! assert_eq!(store.get("alpha"), Some(1));
//! assert!(store.delete("beta"));
//! assert_eq!(store.get("beta"), None);
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitations
//!
//! - **Fixed shard count**: Chosen at construction, never resized
//! - **No cross-shard atomicity**: `keys()` and `len()` are consistent per shard only
//! - **In-memory only**: Nothing is persisted

mod config;
mod error;
mod router;
mod shard;
mod store;

// Re-exports for the flat public API
pub use config::{KeyScan, StoreOptions};
pub use error::{Error, Result};
pub use router::{Router, shard_index};
pub use store::ShardedStore;
