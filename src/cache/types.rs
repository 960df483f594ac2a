//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache key type - canonical string produced by [`crate::hash::hash`]
pub type CacheKey = String;

/// Statistics for cache activity
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that found a live entry
    pub hits: u64,

    /// Reads that had to invoke the fallback loader
    pub misses: u64,

    /// Number of entries currently in cache
    pub entries: usize,

    /// Explicit writes (mutations, revalidations, manual writes)
    pub writes: u64,

    /// Entries evicted by the LRU bound
    pub evictions: u64,

    /// Entries removed by `clear`
    pub invalidations: u64,

    /// Loader futures whose outcome was applied to their cell
    pub settled_loads: u64,

    /// Loader futures whose outcome was discarded because the cell had been
    /// replaced or evicted in the meantime
    pub stale_settlements: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, writes: {}, evictions: {}, invalidations: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.writes,
            self.evictions,
            self.invalidations
        )
    }
}
