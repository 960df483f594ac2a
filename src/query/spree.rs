//! Handle bound to one argument tuple

use crate::cache::{CacheKey, Fallback, ResultCell};
use crate::error::{Result, SpreeError};
use crate::query::mutation::Drain;
use crate::query::options::{MutationOptions, RevalidateOptions};
use crate::query::QueryInner;
use crate::rx::{Observer, Subscription};
use crate::suspense::{self, Suspense};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Arguments of a handle together with the key they hash to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpreeReference<A> {
    pub args: A,
    pub hash: CacheKey,
}

/// Read, subscribe to and mutate the cache entry of one argument tuple.
///
/// Handles are cheap to clone. Handles created for equal arguments share
/// the entry and the in-flight mutation state.
pub struct Spree<A, V> {
    query: Arc<QueryInner<A, V>>,
    args: A,
    key: CacheKey,
}

impl<A: Clone, V> Clone for Spree<A, V> {
    fn clone(&self) -> Self {
        Self {
            query: Arc::clone(&self.query),
            args: self.args.clone(),
            key: self.key.clone(),
        }
    }
}

impl<A, V> Spree<A, V>
where
    A: Serialize + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(query: Arc<QueryInner<A, V>>, args: A, key: CacheKey) -> Self {
        Self { query, args, key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn args(&self) -> &A {
        &self.args
    }

    pub fn reference(&self) -> SpreeReference<A> {
        SpreeReference {
            args: self.args.clone(),
            hash: self.key.clone(),
        }
    }

    /// Current cell, starting the loader if the entry is missing
    pub fn cell(&self) -> ResultCell<V> {
        self.query.cache.read(&self.key, self.fallback())
    }

    /// Current value as a suspension signal
    pub fn read(&self) -> Suspense<V> {
        suspense::resolve(self.cell())
    }

    /// Start loading without consuming the result
    pub fn preload(&self) {
        self.cell();
    }

    /// Wait for the value, following the suspension protocol until the
    /// entry settles
    pub async fn load(&self) -> Result<V> {
        loop {
            match self.read() {
                Suspense::Ready(value) => return Ok(value),
                Suspense::Failed(error) => return Err(error),
                Suspense::NotReady(future) => {
                    // The outcome is re-read from the cache, which may have
                    // been overwritten meanwhile
                    let _ = future.await;
                }
            }
        }
    }

    /// Call `on_next` with the current cell and every later one
    pub fn subscribe<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(&ResultCell<V>) + Send + Sync + 'static,
    {
        self.subscribe_observer(on_next)
    }

    /// Like [`Spree::subscribe`], with error and completion callbacks
    pub fn subscribe_observer<O>(&self, observer: O) -> Subscription
    where
        O: Observer<ResultCell<V>> + 'static,
    {
        self.query
            .cache
            .subscribe(&self.key, self.fallback(), observer)
    }

    /// Number of mutations currently in flight for this entry
    pub fn pending_mutations(&self) -> usize {
        self.query.mutations.pending(&self.key)
    }

    /// Run the loader again and write its outcome, replacing whatever the
    /// entry holds
    pub async fn revalidate(&self, options: RevalidateOptions) {
        if options.reset_cache {
            self.reset_others();
        }

        debug!("Revalidating {}", self.key);
        let cell = match (self.query.loader)(self.args.clone()).await {
            Ok(value) => ResultCell::Resolved(value),
            Err(e) => {
                warn!("Revalidation failed for {}: {}", self.key, e);
                ResultCell::Rejected(SpreeError::load(e))
            }
        };

        self.query.cache.write(&self.key, cell);
    }

    /// Commit a change and reconcile the entry with it.
    ///
    /// The commit's value is written only when no other mutation on this
    /// entry is in flight at the moment it settles and none has overlapped
    /// with it. Once mutations overlapped or any of them failed, no commit
    /// value is written at all: the last one to settle revalidates once.
    /// Dropping the returned future before the commit settles counts as a
    /// failure; if it was the last one in flight, the revalidation is
    /// spawned on the ambient tokio runtime.
    ///
    /// Returns `true` when this was the last mutation in flight, `false`
    /// when others were still outstanding. A failed commit is never written;
    /// it is returned as [`SpreeError::Mutation`] after the bookkeeping
    /// (including any revalidation) is done.
    pub async fn mutate<C, Fut>(&self, commit: C, options: MutationOptions<V>) -> Result<bool>
    where
        C: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let mut ticket = self.query.mutations.begin(&self.key);
        ticket.on_abandon(|| self.spawn_revalidate());

        if let Some(value) = options.optimistic_update {
            self.query.cache.write(&self.key, ResultCell::Resolved(value));
        }

        if options.reset_cache {
            self.reset_others();
        }

        let failure = match commit().await {
            Ok(value) => {
                if ticket.may_write() {
                    self.query.cache.write(&self.key, ResultCell::Resolved(value));
                } else {
                    debug!("Dropping commit result for {}: batch overlapped or failed", self.key);
                }
                None
            }
            Err(e) => {
                warn!("Mutation failed for {}: {}", self.key, e);
                ticket.fail();
                Some(SpreeError::mutation(e))
            }
        };

        let last = match ticket.finish() {
            Drain::Outstanding => false,
            Drain::Last { revalidate } => {
                if revalidate {
                    self.revalidate(RevalidateOptions::default()).await;
                }
                true
            }
        };

        match failure {
            Some(error) => Err(error),
            None => Ok(last),
        }
    }

    fn spawn_revalidate(&self) {
        let spree = self.clone();
        match Handle::try_current() {
            Ok(runtime) => {
                debug!("Spawning revalidation for abandoned mutation on {}", self.key);
                runtime.spawn(async move {
                    spree.revalidate(RevalidateOptions::default()).await;
                });
            }
            Err(e) => warn!("Cannot revalidate {} outside of a tokio runtime: {}", self.key, e),
        }
    }

    fn fallback(&self) -> impl FnOnce() -> Fallback<V> + '_ {
        move || (self.query.loader)(self.args.clone())
    }

    fn reset_others(&self) {
        let key = self.key.as_str();
        self.query.cache.clear(|other| other != key);
    }
}

impl<A: fmt::Debug, V> fmt::Debug for Spree<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spree")
            .field("args", &self.args)
            .field("key", &self.key)
            .finish()
    }
}
