//! # Queries
//!
//! A [`Query`] binds a loader function to a private [`Cache`]. Calling
//! [`Query::spree`] with an argument tuple hashes it into a key and returns a
//! [`Spree`], the handle through which that entry is read, observed,
//! revalidated and mutated.
//!
//! ## Mutation races
//!
//! Commits on the same entry may overlap and settle in any order. Once an
//! overlap is detected no individual commit result is trusted: the last
//! mutation of the batch to settle fetches ground truth with a single
//! revalidation. A failed commit also ends its batch with a revalidation and
//! is never written into the cache.

mod mutation;
mod options;
mod spree;

pub use options::{MutationOptions, RevalidateOptions};
pub use spree::{Spree, SpreeReference};

use crate::cache::{Cache, CacheConfig, Fallback};
use crate::error::Result;
use crate::hash::hash;
use futures::FutureExt;
use mutation::MutationRegistry;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

type Loader<A, V> = Box<dyn Fn(A) -> Fallback<V> + Send + Sync>;

/// Factory of [`Spree`] handles over one loader and one cache
pub struct Query<A, V> {
    inner: Arc<QueryInner<A, V>>,
}

pub(crate) struct QueryInner<A, V> {
    loader: Loader<A, V>,
    cache: Cache<V>,
    mutations: MutationRegistry,
}

impl<A, V> Clone for Query<A, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, V> Query<A, V>
where
    A: Serialize + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a query with the default cache configuration
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        Self::build(loader, CacheConfig::default())
    }

    /// Create a query whose cache uses `config`
    pub fn with_config<F, Fut>(loader: F, config: CacheConfig) -> Result<Self>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        config.validate()?;
        Ok(Self::build(loader, config))
    }

    fn build<F, Fut>(loader: F, config: CacheConfig) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let loader: Loader<A, V> = Box::new(move |args| loader(args).boxed());

        Self {
            inner: Arc::new(QueryInner {
                loader,
                cache: Cache::new(config),
                mutations: MutationRegistry::default(),
            }),
        }
    }

    /// Handle for `args`. The entry starts loading right away.
    pub fn spree(&self, args: A) -> Result<Spree<A, V>> {
        let key = hash(&args)?;
        debug!("Query handle for key {}", key);

        let spree = Spree::new(Arc::clone(&self.inner), args, key);
        spree.preload();
        Ok(spree)
    }

    /// The cache backing this query
    pub fn cache(&self) -> &Cache<V> {
        &self.inner.cache
    }
}

impl<A, V> fmt::Debug for Query<A, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("cache", &self.inner.cache)
            .finish()
    }
}
