//! Subscription handles returned by `Subject::subscribe`

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

/// Something an observer can be detached from
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

/// Handle for one observer registered on a subject.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
pub struct Subscription {
    source: Weak<dyn Detach>,
    id: u64,
    closed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(source: Weak<dyn Detach>, id: u64) -> Self {
        Self {
            source,
            id,
            closed: AtomicBool::new(false),
        }
    }

    /// Remove this observer from its subject. Idempotent.
    pub fn unsubscribe(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(source) = self.source.upgrade() {
            source.detach(self.id);
        }
    }

    /// Whether `unsubscribe` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
