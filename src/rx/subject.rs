//! Replay-latest subject implementation

use crate::error::SpreeError;
use crate::rx::observer::Observer;
use crate::rx::subscription::{Detach, Subscription};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::sync::{Arc, Weak};

/// A hot observable holding exactly one current value.
///
/// Cloning a `Subject` yields another handle to the same value and
/// observer set.
pub struct Subject<T> {
    inner: Arc<SubjectInner<T>>,
}

struct SubjectInner<T> {
    /// Serializes broadcasts and subscriptions across threads. Reentrant so
    /// an observer may call back into the same subject from its callback.
    delivery: ReentrantMutex<()>,

    /// Never held while observers run
    state: Mutex<SubjectState<T>>,
}

struct SubjectState<T> {
    value: T,
    closed: bool,
    observers: Vec<ObserverSlot<T>>,
    next_id: u64,
}

struct ObserverSlot<T> {
    id: u64,
    observer: Arc<dyn Observer<T>>,
}

impl<T> SubjectState<T> {
    fn snapshot(&self) -> Vec<Arc<dyn Observer<T>>> {
        self.observers
            .iter()
            .map(|slot| Arc::clone(&slot.observer))
            .collect()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Subject<T>
where
    T: Clone + Send + 'static,
{
    /// Create a subject seeded with an initial value
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                delivery: ReentrantMutex::new(()),
                state: Mutex::new(SubjectState {
                    value,
                    closed: false,
                    observers: Vec::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// Current value
    pub fn value(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    /// Whether `complete` (or `unsubscribe_all`) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.inner.state.lock().observers.len()
    }

    /// Hold the delivery lock so several operations reach observers as one
    /// uninterrupted sequence
    pub(crate) fn lock_delivery(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.delivery.lock()
    }

    /// Replace the current value and broadcast it. No-op once closed.
    pub fn next(&self, value: T) {
        self.next_if(value, || true);
    }

    /// Replace the current value and broadcast it, but only if `guard`
    /// (evaluated under the delivery lock) returns true. Returns whether the
    /// value was applied.
    pub(crate) fn next_if(&self, value: T, guard: impl FnOnce() -> bool) -> bool {
        let _delivery = self.inner.delivery.lock();

        let observers = {
            let mut state = self.inner.state.lock();
            if state.closed || !guard() {
                return false;
            }
            state.value = value.clone();
            state.snapshot()
        };

        for observer in &observers {
            observer.next(&value);
        }
        true
    }

    /// Broadcast an error. Does not close the subject. No-op once closed.
    pub fn error(&self, error: SpreeError) {
        let _delivery = self.inner.delivery.lock();

        let observers = {
            let state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.snapshot()
        };

        for observer in &observers {
            observer.error(&error);
        }
    }

    /// Close the subject permanently and notify current observers
    pub fn complete(&self) {
        let _delivery = self.inner.delivery.lock();

        let observers = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.snapshot()
        };

        for observer in &observers {
            observer.complete();
        }
    }

    /// Close the subject and drop every observer without notifying them
    pub fn unsubscribe_all(&self) {
        let _delivery = self.inner.delivery.lock();
        let mut state = self.inner.state.lock();
        state.closed = true;
        state.observers.clear();
    }

    /// Register an observer. It first receives the current value; on a
    /// closed subject that replay is all it ever receives.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T> + 'static,
    {
        let _delivery = self.inner.delivery.lock();

        let (value, closed) = {
            let state = self.inner.state.lock();
            (state.value.clone(), state.closed)
        };

        let observer: Arc<dyn Observer<T>> = Arc::new(observer);
        observer.next(&value);

        let id = {
            let mut state = self.inner.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            if !closed {
                state.observers.push(ObserverSlot { id, observer });
            }
            id
        };

        let source: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription::new(source, id)
    }
}

impl<T: Send + 'static> Detach for SubjectInner<T> {
    fn detach(&self, id: u64) {
        self.state.lock().observers.retain(|slot| slot.id != id);
    }
}

impl<T: fmt::Debug> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Subject")
            .field("value", &state.value)
            .field("closed", &state.closed)
            .field("observers", &state.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Recorder {
        values: Arc<Mutex<Vec<i32>>>,
        errors: Arc<Mutex<Vec<String>>>,
        completions: Arc<AtomicUsize>,
    }

    impl Recorder {
        fn values(&self) -> Vec<i32> {
            self.values.lock().clone()
        }
    }

    impl Observer<i32> for Recorder {
        fn next(&self, value: &i32) {
            self.values.lock().push(*value);
        }

        fn error(&self, error: &SpreeError) {
            self.errors.lock().push(error.to_string());
        }

        fn complete(&self) {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_replay_latest() {
        let subject = Subject::new(0);
        let early = Recorder::default();
        subject.subscribe(early.clone());

        subject.next(1);
        subject.next(2);

        let late = Recorder::default();
        subject.subscribe(late.clone());

        assert_eq!(early.values(), vec![0, 1, 2]);
        assert_eq!(late.values(), vec![2]);
        assert_eq!(subject.value(), 2);
    }

    #[test]
    fn test_observers_notified_in_subscription_order() {
        let subject = Subject::new(0);
        let log: Arc<Mutex<Vec<(&str, i32)>>> = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = log.clone();
            subject.subscribe(move |value: &i32| log.lock().push((name, *value)));
        }
        log.lock().clear();

        subject.next(1);
        subject.next(2);

        assert_eq!(
            *log.lock(),
            vec![
                ("first", 1),
                ("second", 1),
                ("third", 1),
                ("first", 2),
                ("second", 2),
                ("third", 2),
            ]
        );
    }

    #[test]
    fn test_replay_repeats_same_value() {
        let subject = Subject::new(7);
        let first = Recorder::default();
        let second = Recorder::default();
        subject.subscribe(first.clone());
        subject.subscribe(second.clone());

        assert_eq!(first.values(), vec![7]);
        assert_eq!(second.values(), vec![7]);
    }

    #[test]
    fn test_error_does_not_close() {
        let subject = Subject::new(0);
        let recorder = Recorder::default();
        subject.subscribe(recorder.clone());

        subject.error(SpreeError::Runtime("boom".to_string()));
        subject.next(1);

        assert_eq!(recorder.errors.lock().len(), 1);
        assert_eq!(recorder.values(), vec![0, 1]);
        assert!(!subject.is_closed());
    }

    #[test]
    fn test_complete_silences_subject() {
        let subject = Subject::new(0);
        let recorder = Recorder::default();
        subject.subscribe(recorder.clone());

        subject.complete();
        subject.next(1);
        subject.error(SpreeError::Runtime("ignored".to_string()));

        assert_eq!(recorder.values(), vec![0]);
        assert!(recorder.errors.lock().is_empty());
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 1);
        assert_eq!(subject.value(), 0);
    }

    #[test]
    fn test_subscribe_after_complete_replays_once() {
        let subject = Subject::new(0);
        subject.next(5);
        subject.complete();

        let late = Recorder::default();
        subject.subscribe(late.clone());
        subject.next(6);

        assert_eq!(late.values(), vec![5]);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn test_unsubscribe_isolation() {
        let subject = Subject::new(0);
        let leaving = Recorder::default();
        let staying = Recorder::default();
        let subscription = subject.subscribe(leaving.clone());
        subject.subscribe(staying.clone());

        subject.next(1);
        subscription.unsubscribe();
        subject.next(2);

        assert!(subscription.is_closed());
        assert_eq!(leaving.values(), vec![0, 1]);
        assert_eq!(staying.values(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let subject = Subject::new(0);
        let a = subject.subscribe(Recorder::default());
        subject.subscribe(Recorder::default());

        a.unsubscribe();
        a.unsubscribe();

        assert_eq!(subject.observer_count(), 1);
    }

    #[test]
    fn test_observer_added_during_broadcast_misses_it() {
        let subject = Subject::new(0);
        let late = Recorder::default();
        let added = Arc::new(AtomicUsize::new(0));

        let inner_subject = subject.clone();
        let inner_late = late.clone();
        let inner_added = added.clone();
        subject.subscribe(move |value: &i32| {
            if *value == 1 && inner_added.fetch_add(1, Ordering::SeqCst) == 0 {
                inner_subject.subscribe(inner_late.clone());
            }
        });

        subject.next(1);
        subject.next(2);

        // Replay of 1 on subscribe, not the in-flight broadcast, then 2
        assert_eq!(late.values(), vec![1, 2]);
    }

    #[test]
    fn test_observer_removed_during_broadcast_still_receives_it() {
        let subject = Subject::new(0);
        let victim = Recorder::default();

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner_slot = slot.clone();
        subject.subscribe(move |value: &i32| {
            if *value == 1 {
                if let Some(subscription) = inner_slot.lock().as_ref() {
                    subscription.unsubscribe();
                }
            }
        });
        *slot.lock() = Some(subject.subscribe(victim.clone()));

        subject.next(1);
        subject.next(2);

        assert_eq!(victim.values(), vec![0, 1]);
    }

    #[test]
    fn test_unsubscribe_all_closes() {
        let subject = Subject::new(0);
        let recorder = Recorder::default();
        subject.subscribe(recorder.clone());

        subject.unsubscribe_all();
        subject.next(1);

        assert!(subject.is_closed());
        assert_eq!(subject.observer_count(), 0);
        assert_eq!(recorder.values(), vec![0]);
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_next_if_guard() {
        let subject = Subject::new(0);
        assert!(!subject.next_if(1, || false));
        assert_eq!(subject.value(), 0);
        assert!(subject.next_if(2, || true));
        assert_eq!(subject.value(), 2);
    }
}
