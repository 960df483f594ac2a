//! Observer trait for subject subscribers

use crate::error::SpreeError;

/// Listens to the values, errors and completion of a [`Subject`](super::Subject).
///
/// Only `next` is required. Closures `Fn(&T)` are observers that ignore
/// errors and completion.
pub trait Observer<T>: Send + Sync {
    /// Receives the next value in the sequence
    fn next(&self, value: &T);

    /// Receives a sequence error
    fn error(&self, _error: &SpreeError) {}

    /// Receives the completion notification
    fn complete(&self) {}
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn next(&self, value: &T) {
        self(value)
    }
}
