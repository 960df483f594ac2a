//! # Hot, replay-latest broadcast
//!
//! A [`Subject`] is both a sink (`next`, `error`, `complete`) and a source
//! (`subscribe`). New subscribers synchronously receive the current value
//! before any later broadcast, which lets them observe in-flight or settled
//! state without racing the moment of subscription.
//!
//! ## Invariants
//!
//! 1. Observers are notified in subscription order.
//! 2. A broadcast is delivered to the observer set as it was when the
//!    broadcast started; observers added or removed from inside a callback
//!    only affect later broadcasts.
//! 3. After `complete()`, `next` and `error` are silent.

pub mod observer;
pub mod subject;
pub mod subscription;

pub use observer::Observer;
pub use subject::Subject;
pub use subscription::Subscription;
