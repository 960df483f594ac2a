//! The state of one cached computation

use crate::error::SpreeError;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Future carried by a pending cell.
///
/// Cloneable; every clone resolves to the same outcome. It resolves only
/// after the outcome has been applied to the owning cell (or discarded as
/// stale), so awaiting it and then reading again observes the settlement.
pub type LoadFuture<V> = Shared<BoxFuture<'static, Result<V, SpreeError>>>;

/// Discriminant of a [`ResultCell`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pending,
    Resolved,
    Rejected,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Pending => write!(f, "pending"),
            ResultStatus::Resolved => write!(f, "resolved"),
            ResultStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Tagged state of one cached computation
#[derive(Clone)]
pub enum ResultCell<V> {
    /// The loader has not settled yet
    Pending(LoadFuture<V>),

    /// A value is available
    Resolved(V),

    /// The loader (or a revalidation) failed
    Rejected(SpreeError),
}

impl<V> ResultCell<V> {
    pub fn status(&self) -> ResultStatus {
        match self {
            ResultCell::Pending(_) => ResultStatus::Pending,
            ResultCell::Resolved(_) => ResultStatus::Resolved,
            ResultCell::Rejected(_) => ResultStatus::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ResultCell::Pending(_))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ResultCell::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ResultCell::Rejected(_))
    }

    /// The resolved value, if any
    pub fn value(&self) -> Option<&V> {
        match self {
            ResultCell::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// The rejection, if any
    pub fn error(&self) -> Option<&SpreeError> {
        match self {
            ResultCell::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

impl<V> From<Result<V, SpreeError>> for ResultCell<V> {
    fn from(outcome: Result<V, SpreeError>) -> Self {
        match outcome {
            Ok(value) => ResultCell::Resolved(value),
            Err(error) => ResultCell::Rejected(error),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for ResultCell<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCell::Pending(_) => f.write_str("Pending"),
            ResultCell::Resolved(value) => f.debug_tuple("Resolved").field(value).finish(),
            ResultCell::Rejected(error) => f.debug_tuple("Rejected").field(error).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn test_status() {
        let pending: ResultCell<i32> = ResultCell::Pending(async { Ok::<_, SpreeError>(1) }.boxed().shared());
        assert_eq!(pending.status(), ResultStatus::Pending);
        assert!(pending.is_pending());
        assert_eq!(pending.value(), None);

        let resolved = ResultCell::Resolved(3);
        assert!(resolved.is_resolved());
        assert_eq!(resolved.value(), Some(&3));

        let rejected: ResultCell<i32> = ResultCell::Rejected(SpreeError::Runtime("x".to_string()));
        assert!(rejected.is_rejected());
        assert!(rejected.error().is_some());
    }

    #[test]
    fn test_from_outcome() {
        let cell: ResultCell<i32> = Ok(5).into();
        assert_eq!(cell.value(), Some(&5));

        let cell: ResultCell<i32> = Err(SpreeError::Aborted("panic".to_string())).into();
        assert_eq!(cell.status(), ResultStatus::Rejected);
    }

    #[test]
    fn test_debug_and_display() {
        let cell: ResultCell<i32> = ResultCell::Resolved(9);
        assert_eq!(format!("{:?}", cell), "Resolved(9)");
        assert_eq!(ResultStatus::Pending.to_string(), "pending");
    }
}
