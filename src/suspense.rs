//! Translation of cell state into the cooperative-suspension contract
//!
//! Consumers never branch on [`ResultCell`] directly. They call [`resolve`]
//! and either use the value, await the carried future and try again, or
//! surface the failure.

use crate::cache::{LoadFuture, ResultCell};
use crate::error::{Result, SpreeError};
use std::fmt;

/// Outcome of resolving a cell
pub enum Suspense<V> {
    /// The value is available
    Ready(V),

    /// Not ready yet; await the future, then read again
    NotReady(LoadFuture<V>),

    /// The computation failed
    Failed(SpreeError),
}

/// Map a cell to its suspension signal
pub fn resolve<V>(cell: ResultCell<V>) -> Suspense<V> {
    match cell {
        ResultCell::Pending(future) => Suspense::NotReady(future),
        ResultCell::Resolved(value) => Suspense::Ready(value),
        ResultCell::Rejected(error) => Suspense::Failed(error),
    }
}

impl<V> Suspense<V> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Suspense::Ready(_))
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, Suspense::NotReady(_))
    }

    /// Convert into a `Result`, treating not-ready as `None`
    pub fn into_result(self) -> Result<Option<V>> {
        match self {
            Suspense::Ready(value) => Ok(Some(value)),
            Suspense::NotReady(_) => Ok(None),
            Suspense::Failed(error) => Err(error),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Suspense<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspense::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Suspense::NotReady(_) => f.write_str("NotReady"),
            Suspense::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}
