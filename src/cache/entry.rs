//! Per-key cache entries and their metadata

use crate::cache::cell::ResultCell;
use crate::rx::Subject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One live key: the subject broadcasting its cell plus bookkeeping
pub(crate) struct CacheEntry<V> {
    pub(crate) subject: Subject<ResultCell<V>>,

    /// Generation of the cell currently held by `subject`. Shared with
    /// in-flight settlements so they can tell whether their cell is still
    /// the active one.
    pub(crate) generation: Arc<AtomicU64>,

    pub(crate) metadata: EntryMetadata,
}

impl<V> CacheEntry<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(cell: ResultCell<V>, generation: u64) -> Self {
        Self {
            subject: Subject::new(cell),
            generation: Arc::new(AtomicU64::new(generation)),
            metadata: EntryMetadata::new(generation),
        }
    }

    pub(crate) fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last read or write
    pub accessed_at: DateTime<Utc>,

    /// Number of reads and writes after creation
    pub access_count: u64,

    /// Generation of the live cell
    pub generation: u64,
}

impl EntryMetadata {
    fn new(generation: u64) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            accessed_at: now,
            access_count: 0,
            generation,
        }
    }

    /// Mark the entry as used (updates access time and count)
    pub fn mark_accessed(&mut self) {
        self.accessed_at = Utc::now();
        self.access_count += 1;
    }
}
