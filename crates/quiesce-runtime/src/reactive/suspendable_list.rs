#![forbid(unsafe_code)]

//! Observable sequence whose structural changes can be held back and merged.
//!
//! # Design
//!
//! [`SuspendableList<E>`] subscribes once to a source sequence. Reads always
//! go to the source. Unsuspended, each source change is forwarded as is.
//! Suspended, each source change is broken into elemental edits and recorded
//! in a [`ChangeAccumulator`] whose snapshot length is taken when the
//! suspension starts. On the outermost release the accumulator is drained
//! into one [`ListChange`] against that snapshot and delivered once.
//!
//! # Invariants
//!
//! 1. Applying the delivered change to the pre-suspension content yields the
//!    post-suspension content.
//! 2. One suspension delivers at most one invalidation and one change event
//!    per listener; none at all if nothing was recorded or the edits
//!    cancelled out.
//! 3. Merged spans are sorted, disjoint, and non-adjacent, indexing the
//!    pre-suspension snapshot. With [`MergePolicy::SingleSpan`] there is at
//!    most one span.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use quiesce_core::suspend::resume;
use quiesce_core::{
    AccumulatorSize, ChangeAccumulator, ListChange, MergePolicy, SuspendConfig, SuspendCounter,
    SuspendHost, Suspendable, SuspensionGuard,
};

use super::list::ObservableSequence;
use super::listener::{ListListener, ListenerSet, Subscription};

struct SuspendableListCore<E> {
    source: Box<dyn ObservableSequence<E>>,
    accumulator: RefCell<ChangeAccumulator<E>>,
    counter: SuspendCounter,
    listeners: ListenerSet<dyn Fn(&ListChange<E>)>,
    config: SuspendConfig,
    source_sub: RefCell<Option<Subscription>>,
}

impl<E: Clone + PartialEq + 'static> SuspendableListCore<E> {
    fn on_source_change(&self, change: &ListChange<E>) {
        if !self.counter.is_suspended() {
            self.deliver(change);
            return;
        }
        let mut accumulator = self.accumulator.borrow_mut();
        for edit in change.sequential_edits() {
            if let Err(err) = accumulator.record(edit) {
                tracing::warn!(message = "list.record_rejected", error = %err);
            }
        }
    }

    fn deliver(&self, change: &ListChange<E>) {
        self.listeners.notify_invalidated();
        self.listeners.for_each_change(|f| f(change));
    }

    fn apply_policy(&self, change: ListChange<E>) -> ListChange<E> {
        if self.config.merge_policy != MergePolicy::SingleSpan || change.spans().len() < 2 {
            return change;
        }
        match change.widened(&self.source.to_vec()) {
            Ok(wide) => wide,
            Err(err) => {
                tracing::warn!(message = "list.widen_rejected", error = %err);
                change
            }
        }
    }
}

impl<E: Clone + PartialEq + 'static> SuspendHost for SuspendableListCore<E> {
    fn counter(&self) -> &SuspendCounter {
        &self.counter
    }

    fn on_suspend(&self) {
        self.accumulator.borrow_mut().reset(self.source.len());
    }

    fn flush(&self) {
        let Some(change) = self.accumulator.borrow_mut().take() else {
            return;
        };
        if self.config.suppress_noop && change.is_identity() {
            tracing::debug!(message = "list.flush", suppressed = true);
            return;
        }
        let change = self.apply_policy(change);
        tracing::debug!(
            message = "list.flush",
            spans = change.spans().len(),
            removed = change.removed_len(),
            added = change.added_len(),
        );
        self.deliver(&change);
    }
}

/// Wrapper around an observable sequence that coalesces structural changes
/// while suspended.
///
/// Cloning creates a new handle to the **same** wrapper.
pub struct SuspendableList<E> {
    core: Rc<SuspendableListCore<E>>,
}

impl<E> Clone for SuspendableList<E> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<E> fmt::Debug for SuspendableList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accumulator = self.core.accumulator.borrow();
        f.debug_struct("SuspendableList")
            .field("len", &self.core.source.len())
            .field("depth", &self.core.counter.depth())
            .field("pending", &accumulator.size())
            .finish()
    }
}

impl<E: Clone + PartialEq + 'static> SuspendableList<E> {
    #[must_use]
    pub fn wrap<S>(source: &S) -> Self
    where
        S: ObservableSequence<E> + Clone + 'static,
    {
        Self::wrap_with_config(source, SuspendConfig::default())
    }

    #[must_use]
    pub fn wrap_with_config<S>(source: &S, config: SuspendConfig) -> Self
    where
        S: ObservableSequence<E> + Clone + 'static,
    {
        let core = Rc::new(SuspendableListCore {
            source: Box::new(source.clone()),
            accumulator: RefCell::new(ChangeAccumulator::new(source.len())),
            counter: SuspendCounter::new(),
            listeners: ListenerSet::new(),
            config,
            source_sub: RefCell::new(None),
        });
        let weak: Weak<SuspendableListCore<E>> = Rc::downgrade(&core);
        let sub = source.on_list_change(move |change| {
            if let Some(core) = weak.upgrade() {
                core.on_source_change(change);
            }
        });
        *core.source_sub.borrow_mut() = Some(sub);
        Self { core }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<E> {
        self.core.source.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.core.source.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.source.is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.core.source.to_vec()
    }

    /// Classification of the edits recorded during the current suspension.
    #[must_use]
    pub fn pending_size(&self) -> AccumulatorSize {
        self.core.accumulator.borrow().size()
    }

    /// Drop the recorded edits. The current content becomes the snapshot the
    /// next recorded edit is measured against.
    pub fn discard_pending(&self) {
        self.core.accumulator.borrow_mut().discard();
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

impl<E: Clone + PartialEq + 'static> ObservableSequence<E> for SuspendableList<E> {
    fn get(&self, index: usize) -> Option<E> {
        SuspendableList::get(self, index)
    }

    fn len(&self) -> usize {
        SuspendableList::len(self)
    }

    fn to_vec(&self) -> Vec<E> {
        SuspendableList::to_vec(self)
    }

    fn add_list_listener(&self, listener: ListListener<E>) -> Subscription {
        self.core.listeners.add(listener)
    }
}

impl<E: Clone + PartialEq + 'static> Suspendable for SuspendableList<E> {
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
