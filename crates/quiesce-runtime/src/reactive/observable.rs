#![forbid(unsafe_code)]

//! Plain observable value holder and the value capability trait.
//!
//! [`Observable<T>`] notifies synchronously on every effective mutation:
//! invalidation listeners first, then change listeners, each group in
//! registration order. It is the storage that the inhibitory wrappers sit on.
//!
//! # Invariants
//!
//! 1. `set` with a value equal to the current one is a no-op (no version
//!    bump, no notifications).
//! 2. Version increments exactly once per stored mutation.
//! 3. Listeners run with no internal borrow held, so they can read (and
//!    write) the observable.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use super::listener::{Listener, ListenerSet, Subscription};

/// Read side of any observable scalar.
pub trait ObservableValue<T> {
    fn get(&self) -> T;

    fn add_listener(&self, listener: Listener<T>) -> Subscription;

    fn on_invalidate(&self, f: impl Fn() + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.add_listener(Listener::invalidation(f))
    }

    fn on_change(&self, f: impl Fn(&T, &T) + 'static) -> Subscription
    where
        Self: Sized,
        T: 'static,
    {
        self.add_listener(Listener::change(f))
    }
}

struct ObservableState<T> {
    value: T,
    version: u64,
}

struct ObservableCore<T> {
    state: RefCell<ObservableState<T>>,
    listeners: ListenerSet<dyn Fn(&T, &T)>,
    /// Upstream subscriptions this observable depends on (eager derivations).
    held: RefCell<Vec<Subscription>>,
}

/// A shared, version-tracked value with synchronous notification.
///
/// Cloning an `Observable` creates a new handle to the **same** value.
pub struct Observable<T> {
    core: Rc<ObservableCore<T>>,
}

/// Non-owning handle to an [`Observable`].
pub struct WeakObservable<T> {
    core: Weak<ObservableCore<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T> Clone for WeakObservable<T> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

impl<T> WeakObservable<T> {
    #[must_use]
    pub fn upgrade(&self) -> Option<Observable<T>> {
        self.core.upgrade().map(|core| Observable { core })
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.borrow();
        f.debug_struct("Observable")
            .field("value", &state.value)
            .field("version", &state.version)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            core: Rc::new(ObservableCore {
                state: RefCell::new(ObservableState { value, version: 0 }),
                listeners: ListenerSet::new(),
                held: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.core.state.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` mutates this observable (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.core.state.borrow().value)
    }

    /// Store `value` and notify, unless it equals the current value.
    pub fn set(&self, value: T) {
        let old = {
            let mut state = self.core.state.borrow_mut();
            if state.value == value {
                return;
            }
            state.version += 1;
            mem::replace(&mut state.value, value)
        };
        self.notify(Some(&old));
    }

    /// Store `value` and notify invalidation listeners even when it equals
    /// the current value. Change listeners still only hear real changes.
    pub fn refresh(&self, value: T) {
        let old = {
            let mut state = self.core.state.borrow_mut();
            state.version += 1;
            mem::replace(&mut state.value, value)
        };
        let changed = self.core.state.borrow().value != old;
        self.notify(changed.then_some(&old));
    }

    /// Mutate in place through a closure.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Number of stored mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.core.state.borrow().version
    }

    /// Subscribe to new values. Shorthand for a change listener that ignores
    /// the old value.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        self.core
            .listeners
            .add(Listener::change(move |_old, new| f(new)))
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.core.listeners.len()
    }

    /// Keep `subscription` alive for as long as this observable exists.
    pub fn hold(&self, subscription: Subscription) {
        self.core.held.borrow_mut().push(subscription);
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakObservable<T> {
        WeakObservable {
            core: Rc::downgrade(&self.core),
        }
    }

    fn notify(&self, changed_from: Option<&T>) {
        self.core.listeners.notify_invalidated();
        if let Some(old) = changed_from
            && self.core.listeners.has_change_listeners()
        {
            let new = self.get();
            self.core.listeners.for_each_change(|f| f(old, &new));
        }
    }
}

impl<T: Clone + PartialEq + 'static> ObservableValue<T> for Observable<T> {
    fn get(&self) -> T {
        Observable::get(self)
    }

    fn add_listener(&self, listener: Listener<T>) -> Subscription {
        self.core.listeners.add(listener)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
