//! # Spree
//!
//! A reactive, asynchronous value cache for Rust with race-safe optimistic
//! mutations.
//!
//! ## Features
//!
//! - Results of async loaders memoized per argument tuple
//! - Deterministic keys: arguments are hashed through `serde` with sorted
//!   object keys
//! - Every state change broadcast to subscribers, with the latest state
//!   replayed on subscribe
//! - Cooperative suspension: reads never block, they hand back the pending
//!   future to await
//! - Optimistic mutations that stay consistent when commits overlap
//! - Bounded LRU cache with statistics
//!
//! ## Reading
//!
//! ```no_run
//! use spree::{Query, Suspense};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let todos = Query::new(|user: u32| async move {
//!         anyhow::Ok(vec![format!("todo for {}", user)])
//!     });
//!
//!     let spree = todos.spree(42)?;
//!     match spree.read() {
//!         Suspense::Ready(items) => println!("{:?}", items),
//!         Suspense::NotReady(load) => {
//!             load.await?;
//!         }
//!         Suspense::Failed(e) => return Err(e.into()),
//!     }
//!
//!     // Or simply wait until the entry settles
//!     let items = spree.load().await?;
//!     println!("Loaded {} todos", items.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Subscribing
//!
//! ```no_run
//! use spree::{Query, ResultCell};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let query = Query::new(|id: u32| async move { anyhow::Ok(id * 2) });
//!     let spree = query.spree(21)?;
//!
//!     let subscription = spree.subscribe(|cell: &ResultCell<u32>| {
//!         println!("now {}", cell.status());
//!     });
//!
//!     spree.load().await?;
//!     subscription.unsubscribe();
//!     Ok(())
//! }
//! ```
//!
//! ## Mutating
//!
//! ```no_run
//! use spree::{MutationOptions, Query};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let query = Query::new(|id: u32| async move { anyhow::Ok(format!("todo {}", id)) });
//!     let spree = query.spree(1)?;
//!     spree.load().await?;
//!
//!     // Shown immediately, replaced by the server's answer
//!     let options = MutationOptions::optimistic("todo 1 (saving)".to_string());
//!     spree
//!         .mutate(|| async { anyhow::Ok("todo 1 (saved)".to_string()) }, options)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod hash;
pub mod query;
pub mod rx;
pub mod suspense;

// Re-export main types for convenience
pub use cache::{
    Cache, CacheConfig, CacheConfigBuilder, CacheKey, CacheStats, EntryMetadata, LoadFuture,
    ResultCell, ResultStatus,
};
pub use error::{HashError, Result, SpreeError};
pub use hash::hash;
pub use query::{MutationOptions, Query, RevalidateOptions, Spree, SpreeReference};
pub use rx::{Observer, Subject, Subscription};
pub use suspense::{resolve, Suspense};
