//! Options for revalidation and mutation

/// Options for [`Spree::revalidate`](super::Spree::revalidate)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevalidateOptions {
    /// Evict every other key of the query's cache first
    pub reset_cache: bool,
}

impl RevalidateOptions {
    /// Revalidate after evicting every other key
    pub fn reset_cache() -> Self {
        Self { reset_cache: true }
    }
}

/// Options for [`Spree::mutate`](super::Spree::mutate)
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOptions<V> {
    /// Written as `Resolved` before the commit starts
    pub optimistic_update: Option<V>,

    /// Evict every other key of the query's cache before committing
    pub reset_cache: bool,
}

impl<V> Default for MutationOptions<V> {
    fn default() -> Self {
        Self {
            optimistic_update: None,
            reset_cache: false,
        }
    }
}

impl<V> MutationOptions<V> {
    /// Mutation that shows `value` while the commit is in flight
    pub fn optimistic(value: V) -> Self {
        Self {
            optimistic_update: Some(value),
            reset_cache: false,
        }
    }

    /// Also evict every other key before committing
    pub fn with_reset_cache(mut self) -> Self {
        self.reset_cache = true;
        self
    }
}
