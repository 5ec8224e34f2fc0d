#![forbid(unsafe_code)]

//! Lazy binding over an eager observable, with suspendable invalidation.
//!
//! # Design
//!
//! An eager expression (see [`eager_map2`](super::eager_map2)) invalidates on
//! every input mutation. [`InhibitoryBinding<T>`] subscribes once to that
//! source and re-exposes it as a lazily evaluated, memoised value:
//!
//! - unsuspended, each source invalidation marks the cache dirty and is
//!   forwarded at once;
//! - suspended, source invalidations only mark the cache dirty and set a
//!   pending marker;
//! - on the outermost release a pending marker becomes one invalidation, plus
//!   one change event (value at suspension start → value now) when change
//!   listeners exist and the value differs.
//!
//! # Invariants
//!
//! 1. `get()` returns the source's current value whenever the source has
//!    invalidated since the last read (dirty flag), and the cached one
//!    otherwise.
//! 2. `version()` increments by exactly 1 per evaluation of the source.
//! 3. N source invalidations inside one suspension reach each listener as at
//!    most one invalidation.
//!
//! # Failure Modes
//!
//! - **Source dropped**: the binding keeps its own handle to the source, so
//!   this only happens if the source's own inputs go away; the binding then
//!   simply never invalidates again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use quiesce_core::suspend::resume;
use quiesce_core::{SuspendConfig, SuspendCounter, SuspendHost, Suspendable, SuspensionGuard};

use super::listener::{Listener, ListenerSet, Subscription};
use super::observable::ObservableValue;

struct BindingState<T> {
    /// None only before the first evaluation.
    cached: Option<T>,
    dirty: bool,
    version: u64,
}

struct BindingCore<T> {
    source: Box<dyn ObservableValue<T>>,
    state: RefCell<BindingState<T>>,
    /// Value at suspension start. Captured eagerly only when a release may
    /// need it, otherwise from the clean cache at the first suspended
    /// invalidation.
    snapshot: RefCell<Option<T>>,
    counter: SuspendCounter,
    pending: Cell<bool>,
    listeners: ListenerSet<dyn Fn(&T, &T)>,
    config: SuspendConfig,
    source_sub: RefCell<Option<Subscription>>,
}

impl<T: Clone + PartialEq + 'static> BindingCore<T> {
    fn value(&self) -> T {
        {
            let state = self.state.borrow();
            if !state.dirty
                && let Some(v) = &state.cached
            {
                return v.clone();
            }
        }
        let fresh = self.source.get();
        let mut state = self.state.borrow_mut();
        state.cached = Some(fresh.clone());
        state.dirty = false;
        state.version += 1;
        fresh
    }

    fn mark_dirty(&self) {
        self.state.borrow_mut().dirty = true;
    }

    fn on_source_invalidated(&self) {
        if self.counter.is_suspended() {
            if self.snapshot.borrow().is_none() {
                let start = {
                    let state = self.state.borrow();
                    if state.dirty { None } else { state.cached.clone() }
                };
                *self.snapshot.borrow_mut() = start;
            }
            self.mark_dirty();
            self.pending.set(true);
            return;
        }
        let old = if self.listeners.has_change_listeners() {
            self.state.borrow().cached.clone()
        } else {
            None
        };
        self.mark_dirty();
        self.notify(old);
    }

    /// A change listener registered mid-suspension still needs the value at
    /// suspension start. Before any invalidation that is the current value.
    fn prepare_change_listener(&self) {
        let current = self.value();
        if self.counter.is_suspended() && !self.pending.get() {
            let mut snapshot = self.snapshot.borrow_mut();
            if snapshot.is_none() {
                *snapshot = Some(current);
            }
        }
    }

    /// One invalidation, then a change event if `old` is known and differs.
    fn notify(&self, old: Option<T>) {
        self.listeners.notify_invalidated();
        if let Some(old) = old
            && self.listeners.has_change_listeners()
        {
            let new = self.value();
            if old != new {
                self.listeners.for_each_change(|f| f(&old, &new));
            }
        }
    }
}

impl<T: Clone + PartialEq + 'static> SuspendHost for BindingCore<T> {
    fn counter(&self) -> &SuspendCounter {
        &self.counter
    }

    fn on_suspend(&self) {
        let snapshot = (self.config.suppress_noop || self.listeners.has_change_listeners())
            .then(|| self.value());
        *self.snapshot.borrow_mut() = snapshot;
    }

    fn flush(&self) {
        let snapshot = self.snapshot.borrow_mut().take();
        if !self.pending.replace(false) {
            return;
        }
        if self.config.suppress_noop
            && let Some(before) = &snapshot
            && *before == self.value()
        {
            tracing::debug!(message = "binding.flush", suppressed = true);
            return;
        }
        tracing::debug!(message = "binding.flush", suppressed = false);
        self.mark_dirty();
        self.notify(snapshot);
    }
}

/// Memoised view of an eager observable whose invalidations can be
/// coalesced by suspension.
///
/// Cloning creates a new handle to the **same** binding.
pub struct InhibitoryBinding<T> {
    core: Rc<BindingCore<T>>,
}

impl<T> Clone for InhibitoryBinding<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for InhibitoryBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.borrow();
        f.debug_struct("InhibitoryBinding")
            .field("cached", &state.cached)
            .field("dirty", &state.dirty)
            .field("version", &state.version)
            .field("depth", &self.core.counter.depth())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> InhibitoryBinding<T> {
    /// Wrap an eager observable.
    #[must_use]
    pub fn wrap<A>(source: &A) -> Self
    where
        A: ObservableValue<T> + Clone + 'static,
    {
        Self::wrap_with_config(source, SuspendConfig::default())
    }

    #[must_use]
    pub fn wrap_with_config<A>(source: &A, config: SuspendConfig) -> Self
    where
        A: ObservableValue<T> + Clone + 'static,
    {
        let core = Rc::new(BindingCore {
            source: Box::new(source.clone()),
            state: RefCell::new(BindingState {
                cached: None,
                dirty: true,
                version: 0,
            }),
            snapshot: RefCell::new(None),
            counter: SuspendCounter::new(),
            pending: Cell::new(false),
            listeners: ListenerSet::new(),
            config,
            source_sub: RefCell::new(None),
        });
        let weak: Weak<BindingCore<T>> = Rc::downgrade(&core);
        let sub = source.on_invalidate(move || {
            if let Some(core) = weak.upgrade() {
                core.on_source_invalidated();
            }
        });
        *core.source_sub.borrow_mut() = Some(sub);
        Self { core }
    }

    /// Current value, re-read from the source if it invalidated since the
    /// last read.
    #[must_use]
    pub fn get(&self) -> T {
        self.core.value()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.core.state.borrow().dirty
    }

    /// Number of source evaluations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.core.state.borrow().version
    }

    /// Treat the source as invalidated, as if it had fired.
    pub fn invalidate(&self) {
        self.core.on_source_invalidated();
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.core.pending.get()
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

impl<T: Clone + PartialEq + 'static> ObservableValue<T> for InhibitoryBinding<T> {
    fn get(&self) -> T {
        InhibitoryBinding::get(self)
    }

    /// Adding a change listener evaluates the binding, so the next event has
    /// an old value to report.
    fn add_listener(&self, listener: Listener<T>) -> Subscription {
        if !listener.is_invalidation() {
            self.core.prepare_change_listener();
        }
        self.core.listeners.add(listener)
    }
}

impl<T: Clone + PartialEq + 'static> Suspendable for InhibitoryBinding<T> {
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
