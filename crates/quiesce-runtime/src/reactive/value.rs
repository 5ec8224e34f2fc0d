#![forbid(unsafe_code)]

//! Scalar observable whose notifications can be held back.
//!
//! # Design
//!
//! [`InhibitoryValue<T>`] sits in front of an [`Observable<T>`]. Writes go
//! straight through to the source, so `get()` is current at every moment.
//! Only the *notifications* are gated: while suspended, a source notification
//! merely sets a pending flag. On the outermost release the pending flag is
//! turned into one invalidation followed by at most one change event, whose
//! old value is the value listeners last heard about.
//!
//! # Invariants
//!
//! 1. `get()` never lags behind the source.
//! 2. A suspension delivers at most one invalidation and one change event per
//!    listener, however many writes happened.
//! 3. A release with no suspended write delivers nothing.
//! 4. With `suppress_noop`, a release whose final value equals the
//!    pre-suspension value delivers nothing.
//!
//! # Failure Modes
//!
//! - **Guard never released**: listeners never hear from this value again.
//!   Reads still work.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use quiesce_core::suspend::resume;
use quiesce_core::{SuspendConfig, SuspendCounter, SuspendHost, Suspendable, SuspensionGuard};

use super::listener::{Listener, ListenerSet, Subscription};
use super::observable::{Observable, ObservableValue};

struct ValueCore<T> {
    source: Observable<T>,
    /// Value as of the last delivered notification.
    last: RefCell<T>,
    counter: SuspendCounter,
    pending: Cell<bool>,
    listeners: ListenerSet<dyn Fn(&T, &T)>,
    config: SuspendConfig,
    source_sub: RefCell<Option<Subscription>>,
}

impl<T: Clone + PartialEq + 'static> ValueCore<T> {
    fn on_source_invalidated(&self) {
        if self.counter.is_suspended() {
            self.pending.set(true);
            return;
        }
        self.deliver();
    }

    fn deliver(&self) {
        self.listeners.notify_invalidated();
        let new = self.source.get();
        let old = mem::replace(&mut *self.last.borrow_mut(), new.clone());
        if old != new {
            self.listeners.for_each_change(|f| f(&old, &new));
        }
    }
}

impl<T: Clone + PartialEq + 'static> SuspendHost for ValueCore<T> {
    fn counter(&self) -> &SuspendCounter {
        &self.counter
    }

    fn flush(&self) {
        if !self.pending.replace(false) {
            return;
        }
        let unchanged = *self.last.borrow() == self.source.get();
        if unchanged && self.config.suppress_noop {
            tracing::debug!(message = "value.flush", suppressed = true);
            return;
        }
        tracing::debug!(message = "value.flush", changed = !unchanged);
        self.deliver();
    }
}

/// An observable value with suspendable, coalesced notifications.
///
/// Cloning creates a new handle to the **same** value and suspension state.
pub struct InhibitoryValue<T> {
    core: Rc<ValueCore<T>>,
}

impl<T> Clone for InhibitoryValue<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for InhibitoryValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InhibitoryValue")
            .field("value", &*self.core.last.borrow())
            .field("depth", &self.core.counter.depth())
            .field("pending", &self.core.pending.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> InhibitoryValue<T> {
    /// Create a value backed by a fresh [`Observable`].
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::wrap(&Observable::new(value))
    }

    #[must_use]
    pub fn with_config(value: T, config: SuspendConfig) -> Self {
        Self::wrap_with_config(&Observable::new(value), config)
    }

    /// Gate the notifications of an existing observable.
    ///
    /// Writes made directly on `source` are seen here like writes made
    /// through [`set`](Self::set).
    #[must_use]
    pub fn wrap(source: &Observable<T>) -> Self {
        Self::wrap_with_config(source, SuspendConfig::default())
    }

    #[must_use]
    pub fn wrap_with_config(source: &Observable<T>, config: SuspendConfig) -> Self {
        let core = Rc::new(ValueCore {
            source: source.clone(),
            last: RefCell::new(source.get()),
            counter: SuspendCounter::new(),
            pending: Cell::new(false),
            listeners: ListenerSet::new(),
            config,
            source_sub: RefCell::new(None),
        });
        let weak: Weak<ValueCore<T>> = Rc::downgrade(&core);
        let sub = source.on_invalidate(move || {
            if let Some(core) = weak.upgrade() {
                core.on_source_invalidated();
            }
        });
        *core.source_sub.borrow_mut() = Some(sub);
        Self { core }
    }

    #[must_use]
    pub fn get(&self) -> T {
        self.core.source.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.core.source.with(f)
    }

    /// Write through to the source. Notifies now, or on release.
    pub fn set(&self, value: T) {
        self.core.source.set(value);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.core.source.update(f);
    }

    /// The observable this value gates.
    #[must_use]
    pub fn source(&self) -> &Observable<T> {
        &self.core.source
    }

    /// Whether a suspended write is waiting for release.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.core.pending.get()
    }

    /// Forget a pending notification. The current value becomes the baseline
    /// for the next change event.
    pub fn discard_pending(&self) {
        self.core.pending.set(false);
        *self.core.last.borrow_mut() = self.core.source.get();
    }

    #[must_use]
    pub fn config(&self) -> SuspendConfig {
        self.core.config
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.core.listeners.len()
    }
}

impl<T: Clone + PartialEq + 'static> ObservableValue<T> for InhibitoryValue<T> {
    fn get(&self) -> T {
        InhibitoryValue::get(self)
    }

    fn add_listener(&self, listener: Listener<T>) -> Subscription {
        self.core.listeners.add(listener)
    }
}

impl<T: Clone + PartialEq + 'static> Suspendable for InhibitoryValue<T> {
    fn block(&self) -> SuspensionGuard {
        SuspensionGuard::acquire(&self.core)
    }

    fn release(&self) {
        resume(&*self.core);
    }

    fn suspension_depth(&self) -> usize {
        self.core.counter.depth()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
