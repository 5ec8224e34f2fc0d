#![forbid(unsafe_code)]

//! Keep a suspendable target suspended while a boolean condition holds.
//!
//! [`SuspendWhen`] holds at most one [`SuspensionGuard`] on its target. When
//! the condition turns true it acquires one; when it turns false it releases
//! it, which flushes the target if nothing else holds it. Dropping the
//! `SuspendWhen` stops watching the condition and releases any held guard.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use quiesce_core::{Suspendable, SuspensionGuard};

use super::listener::Subscription;
use super::observable::ObservableValue;

type GuardSlot = Rc<RefCell<Option<SuspensionGuard>>>;

/// Condition-driven suspension of one target.
#[must_use = "dropping SuspendWhen releases the target immediately"]
pub struct SuspendWhen {
    guard: GuardSlot,
    _subscription: Subscription,
}

fn sync<S: Suspendable>(slot: &GuardSlot, target: &S, active: bool) {
    let held = slot.borrow().is_some();
    if active && !held {
        let guard = target.block();
        *slot.borrow_mut() = Some(guard);
    } else if !active && held {
        // Released outside the borrow: the flush may re-enter through the
        // condition.
        let guard = slot.borrow_mut().take();
        drop(guard);
    }
}

impl SuspendWhen {
    /// Watch `condition` and suspend `target` whenever it is true. If the
    /// condition is already true, the target is suspended before this
    /// returns.
    pub fn new<C, S>(condition: &C, target: &S) -> Self
    where
        C: ObservableValue<bool> + Clone + 'static,
        S: Suspendable + Clone + 'static,
    {
        let slot: GuardSlot = Rc::new(RefCell::new(None));
        sync(&slot, target, condition.get());

        let watched = condition.clone();
        let target = target.clone();
        let listener_slot = Rc::clone(&slot);
        let subscription = condition.on_invalidate(move || {
            sync(&listener_slot, &target, watched.get());
        });
        Self {
            guard: slot,
            _subscription: subscription,
        }
    }

    /// Whether the target is currently held suspended by this watcher.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.guard.borrow().is_some()
    }
}

impl Drop for SuspendWhen {
    fn drop(&mut self) {
        let guard = self.guard.borrow_mut().take();
        drop(guard);
    }
}

impl fmt::Debug for SuspendWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendWhen")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
