//! Per-key bookkeeping for overlapping mutations

use crate::cache::CacheKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// In-flight mutation state for every key of one query.
///
/// A key is present only while at least one mutation on it is outstanding,
/// so the revalidation flag resets once a batch of overlapping mutations
/// drains.
#[derive(Debug, Default)]
pub(crate) struct MutationRegistry {
    states: Mutex<HashMap<CacheKey, MutationState>>,
}

#[derive(Debug, Default)]
struct MutationState {
    pending: usize,
    revalidate_after_last: bool,
}

/// What a mutation must do once its commit has been accounted for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drain {
    /// Other mutations on the key are still outstanding
    Outstanding,

    /// This was the last one; revalidate if the batch overlapped or failed
    Last { revalidate: bool },
}

impl MutationRegistry {
    /// Register a new in-flight mutation on `key`
    pub(crate) fn begin<'a>(&'a self, key: &'a str) -> MutationTicket<'a> {
        let mut states = self.states.lock();
        let state = states.entry(key.to_string()).or_default();
        state.pending += 1;
        if state.pending > 1 {
            state.revalidate_after_last = true;
            debug!("Overlapping mutation on {} ({} in flight)", key, state.pending);
        }

        MutationTicket {
            registry: self,
            key,
            finished: false,
            on_abandon: None,
        }
    }

    /// Number of mutations in flight for `key`
    pub(crate) fn pending(&self, key: &str) -> usize {
        self.states
            .lock()
            .get(key)
            .map(|state| state.pending)
            .unwrap_or(0)
    }

    fn with_state<R>(&self, key: &str, f: impl FnOnce(&mut MutationState) -> R) -> Option<R> {
        self.states.lock().get_mut(key).map(f)
    }

    fn release(&self, key: &str) -> Drain {
        let mut states = self.states.lock();
        let Some(state) = states.get_mut(key) else {
            return Drain::Last { revalidate: false };
        };

        state.pending = state.pending.saturating_sub(1);
        if state.pending > 0 {
            return Drain::Outstanding;
        }

        let revalidate = state.revalidate_after_last;
        states.remove(key);
        Drain::Last { revalidate }
    }
}

/// One in-flight mutation. Dropping it before [`MutationTicket::finish`]
/// (the mutate future was cancelled) counts as a failed commit; if it was the
/// last mutation in flight, the abandon hook runs to revalidate the entry.
pub(crate) struct MutationTicket<'a> {
    registry: &'a MutationRegistry,
    key: &'a str,
    finished: bool,
    on_abandon: Option<Box<dyn FnOnce() + Send + 'a>>,
}

impl<'a> MutationTicket<'a> {
    /// Whether a successful commit may be written: no other mutation on the
    /// key is in flight and the batch has not overlapped or failed
    pub(crate) fn may_write(&self) -> bool {
        self.registry
            .with_state(self.key, |state| {
                state.pending <= 1 && !state.revalidate_after_last
            })
            .unwrap_or(true)
    }

    /// Record a failed commit: the batch must end with a revalidation
    pub(crate) fn fail(&self) {
        self.registry
            .with_state(self.key, |state| state.revalidate_after_last = true);
    }

    /// Run `hook` if this ticket is dropped unfinished as the last one in
    /// flight
    pub(crate) fn on_abandon(&mut self, hook: impl FnOnce() + Send + 'a) {
        self.on_abandon = Some(Box::new(hook));
    }

    /// Retire this mutation
    pub(crate) fn finish(mut self) -> Drain {
        self.finished = true;
        self.registry.release(self.key)
    }
}

impl Drop for MutationTicket<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        warn!("Mutation on {} dropped before its commit settled", self.key);
        self.fail();
        if let Drain::Last { revalidate: true } = self.registry.release(self.key) {
            if let Some(hook) = self.on_abandon.take() {
                hook();
            }
        }
    }
}
