//! # Reactive Query Cache
//!
//! A bounded key-value cache whose values are [`ResultCell`]s: the pending,
//! resolved or rejected state of an asynchronous computation. Each key owns a
//! replay-latest [`Subject`](crate::rx::Subject), so every change to a cell is
//! broadcast to whoever subscribed to that key.
//!
//! ## Features
//!
//! - **Lazy Fill**: A read on a missing key stores a pending cell and drives
//!   the fallback loader on the ambient tokio runtime
//! - **Stale Settlement Protection**: A load only settles the cell it created;
//!   writes, clears and evictions in the meantime win
//! - **LRU Eviction**: Least Recently Used eviction bounded by `max_entries`
//! - **Predicate Invalidation**: `clear` evicts every key matching a predicate
//! - **Statistics**: Hit/miss, eviction and settlement counters
//!
//! ## Example
//!
//! ```no_run
//! use futures::FutureExt;
//! use spree::cache::{Cache, CacheConfig, ResultCell};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let cache: Cache<String> = Cache::new(CacheConfig::builder().max_entries(500).build());
//!
//! // First read stores a pending cell and starts the loader
//! if let ResultCell::Pending(load) = cache.read("user:1", || {
//!     async { anyhow::Ok("Ada".to_string()) }.boxed()
//! }) {
//!     load.await?;
//! }
//!
//! // The key now holds the resolved value
//! let cell = cache.peek("user:1");
//! println!("Cached: {:?}", cell);
//! # Ok(())
//! # }
//! ```

pub mod cell;
pub mod config;
pub mod entry;
pub mod store;
pub mod types;

pub use cell::{LoadFuture, ResultCell, ResultStatus};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::EntryMetadata;
pub use store::{Cache, Fallback};
pub use types::{CacheKey, CacheStats};
