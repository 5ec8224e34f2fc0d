#![forbid(unsafe_code)]

//! Listener registration shared by every observable in this crate.
//!
//! A [`Callback`] is either an invalidation callback (no payload) or a change
//! callback whose shape depends on the observable: `Fn(&T, &T)` for values,
//! `Fn(&ListChange<E>)` for lists. A [`ListenerSet`] keeps them in
//! registration order as `Weak` pointers; the matching [`Subscription`] owns
//! the strong pointer, so dropping it unregisters the callback. Dead entries
//! are pruned lazily whenever the set is walked.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use quiesce_core::ListChange;

/// One registered callback.
pub enum Callback<C: ?Sized> {
    /// "May have changed; re-read if needed."
    Invalidation(Rc<dyn Fn()>),
    /// Change with payload.
    Change(Rc<C>),
}

/// Listener for scalar observables; change callbacks receive `(old, new)`.
pub type Listener<T> = Callback<dyn Fn(&T, &T)>;

/// Listener for observable sequences.
pub type ListListener<E> = Callback<dyn Fn(&ListChange<E>)>;

impl<C: ?Sized> Callback<C> {
    pub fn invalidation(f: impl Fn() + 'static) -> Self {
        Self::Invalidation(Rc::new(f))
    }

    #[must_use]
    pub fn is_invalidation(&self) -> bool {
        matches!(self, Self::Invalidation(_))
    }
}

impl<T: 'static> Callback<dyn Fn(&T, &T)> {
    pub fn change(f: impl Fn(&T, &T) + 'static) -> Self {
        Self::Change(Rc::new(f))
    }
}

impl<E: 'static> Callback<dyn Fn(&ListChange<E>)> {
    pub fn list_change(f: impl Fn(&ListChange<E>) + 'static) -> Self {
        Self::Change(Rc::new(f))
    }
}

impl<C: ?Sized> fmt::Debug for Callback<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalidation(_) => f.write_str("Callback::Invalidation"),
            Self::Change(_) => f.write_str("Callback::Change"),
        }
    }
}

enum WeakCallback<C: ?Sized> {
    Invalidation(Weak<dyn Fn()>),
    Change(Weak<C>),
}

impl<C: ?Sized> WeakCallback<C> {
    fn is_alive(&self) -> bool {
        match self {
            Self::Invalidation(w) => w.strong_count() > 0,
            Self::Change(w) => w.strong_count() > 0,
        }
    }
}

/// Ordered listener registry.
pub struct ListenerSet<C: ?Sized> {
    entries: RefCell<Vec<WeakCallback<C>>>,
}

impl<C: ?Sized> Default for ListenerSet<C> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<C: ?Sized + 'static> ListenerSet<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. It stays registered while the returned
    /// subscription is alive.
    pub fn add(&self, callback: Callback<C>) -> Subscription {
        let (weak, strong): (WeakCallback<C>, Box<dyn Any>) = match callback {
            Callback::Invalidation(f) => {
                (WeakCallback::Invalidation(Rc::downgrade(&f)), Box::new(f))
            }
            Callback::Change(f) => (WeakCallback::Change(Rc::downgrade(&f)), Box::new(f)),
        };
        let mut entries = self.entries.borrow_mut();
        entries.retain(WeakCallback::is_alive);
        entries.push(weak);
        Subscription {
            _callback: Some(strong),
        }
    }

    /// Live listener count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().iter().filter(|e| e.is_alive()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn has_change_listeners(&self) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| matches!(e, WeakCallback::Change(w) if w.strong_count() > 0))
    }

    fn invalidation_targets(&self) -> Vec<Rc<dyn Fn()>> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(WeakCallback::is_alive);
        entries
            .iter()
            .filter_map(|e| match e {
                WeakCallback::Invalidation(w) => w.upgrade(),
                WeakCallback::Change(_) => None,
            })
            .collect()
    }

    fn change_targets(&self) -> Vec<Rc<C>> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(WeakCallback::is_alive);
        entries
            .iter()
            .filter_map(|e| match e {
                WeakCallback::Change(w) => w.upgrade(),
                WeakCallback::Invalidation(_) => None,
            })
            .collect()
    }

    /// Call every invalidation listener in registration order.
    ///
    /// The registry is not borrowed while callbacks run, so callbacks may
    /// register or drop listeners; changes take effect on the next cycle.
    pub fn notify_invalidated(&self) {
        for callback in self.invalidation_targets() {
            callback();
        }
    }

    /// Hand every change listener, in registration order, to `call`.
    pub fn for_each_change(&self, mut call: impl FnMut(&C)) {
        for callback in self.change_targets() {
            call(&callback);
        }
    }
}

impl<C: ?Sized + 'static> fmt::Debug for ListenerSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

/// Deregistration handle returned by every `add_listener`-style call.
///
/// Dropping it unregisters the listener before the next notification.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    _callback: Option<Box<dyn Any>>,
}

impl Subscription {
    /// A subscription that holds nothing.
    pub fn empty() -> Self {
        Self { _callback: None }
    }

    /// Unregister now. Same as dropping.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self._callback.is_some())
            .finish()
    }
}
