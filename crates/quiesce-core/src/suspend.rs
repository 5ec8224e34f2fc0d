#![forbid(unsafe_code)]

//! Nested suspension counting and scoped guards.
//!
//! # Design
//!
//! Every suspendable entity owns one [`SuspendCounter`] inside its shared
//! core and implements [`SuspendHost`] for that core. Acquiring a
//! [`SuspensionGuard`] increments the counter; releasing it decrements the
//! counter and, on the transition back to zero, asks the host to flush
//! whatever notification it deferred.
//!
//! ```text
//!           block()                  block()
//! UNSUSPENDED ─────▶ SUSPENDED(1) ─────────▶ SUSPENDED(2)
//!      ▲   on_suspend()   │   ▲                  │
//!      │                  │   └──────────────────┘
//!      └──────────────────┘        release()
//!     release() + flush()
//! ```
//!
//! # Invariants
//!
//! 1. The counter never goes below zero; releasing at zero is a no-op.
//! 2. `on_suspend` fires exactly on the 0 → 1 transition and `flush` exactly
//!    on the 1 → 0 transition. Inner releases never flush.
//! 3. A guard decrements the counter at most once, however many times it is
//!    released (explicitly, by `Drop`, or both).
//! 4. A guard never keeps its entity alive; releasing a guard whose entity is
//!    gone does nothing.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Result of a single counter release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The counter was already zero; nothing changed.
    Unbalanced,
    /// Still suspended at the given depth.
    Nested { depth: usize },
    /// The outermost suspension ended.
    Resumed,
}

/// Non-negative nesting counter.
#[derive(Debug, Default)]
pub struct SuspendCounter {
    depth: Cell<usize>,
}

impl SuspendCounter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: Cell::new(0),
        }
    }

    /// Increment and return the new depth.
    pub fn acquire(&self) -> usize {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        depth
    }

    pub fn release(&self) -> ReleaseOutcome {
        match self.depth.get() {
            0 => ReleaseOutcome::Unbalanced,
            1 => {
                self.depth.set(0);
                ReleaseOutcome::Resumed
            }
            n => {
                self.depth.set(n - 1);
                ReleaseOutcome::Nested { depth: n - 1 }
            }
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.depth.get() > 0
    }
}

/// The shared core of a suspendable entity.
///
/// Implementations must not hold any `RefCell` borrow of their own state
/// while calling out to listeners from [`flush`](SuspendHost::flush), since
/// listeners are free to read the entity.
pub trait SuspendHost {
    fn counter(&self) -> &SuspendCounter;

    /// Called once when the entity goes from unsuspended to suspended.
    fn on_suspend(&self) {}

    /// Called once when the outermost suspension is released.
    fn flush(&self);
}

/// Increment `host`'s counter, running `on_suspend` on the first level.
pub fn suspend(host: &dyn SuspendHost) -> usize {
    let depth = host.counter().acquire();
    if depth == 1 {
        host.on_suspend();
    }
    tracing::trace!(message = "suspend.acquire", depth);
    depth
}

/// Decrement `host`'s counter, flushing on the outermost release.
pub fn resume(host: &dyn SuspendHost) -> ReleaseOutcome {
    let outcome = host.counter().release();
    match outcome {
        ReleaseOutcome::Resumed => {
            tracing::trace!(message = "suspend.resume");
            host.flush();
        }
        ReleaseOutcome::Nested { depth } => {
            tracing::trace!(message = "suspend.release", depth);
        }
        ReleaseOutcome::Unbalanced => {
            tracing::debug!(message = "suspend.release_unbalanced");
        }
    }
    outcome
}

/// Capability exposed by every entity whose notifications can be deferred.
pub trait Suspendable {
    /// Suspend notifications until the returned guard is released.
    fn block(&self) -> SuspensionGuard;

    /// Release one level of suspension directly. No-op when not suspended.
    fn release(&self);

    /// Current nesting depth.
    fn suspension_depth(&self) -> usize;

    fn is_suspended(&self) -> bool {
        self.suspension_depth() > 0
    }

    /// Run `action` while suspended and return its result.
    ///
    /// The suspension is released before the result is handed back, so an
    /// `Err` returned by `action` reaches the caller after the flush. A panic
    /// in `action` still releases through the guard's `Drop`.
    fn block_while<R>(&self, action: impl FnOnce() -> R) -> R
    where
        Self: Sized,
    {
        let mut guard = self.block();
        let result = action();
        guard.release();
        result
    }
}

/// Scoped token for one held suspension.
#[must_use = "dropping the guard ends the suspension immediately"]
pub struct SuspensionGuard {
    host: Option<Weak<dyn SuspendHost>>,
}

impl SuspensionGuard {
    /// Suspend `host` and tie the matching release to the returned guard.
    pub fn acquire<H: SuspendHost + 'static>(host: &Rc<H>) -> Self {
        suspend(&**host);
        let weak: Weak<H> = Rc::downgrade(host);
        let weak: Weak<dyn SuspendHost> = weak;
        Self { host: Some(weak) }
    }

    /// A guard that holds nothing. Releasing it does nothing.
    pub fn released() -> Self {
        Self { host: None }
    }

    /// Release the suspension. Only the first call has an effect.
    pub fn release(&mut self) {
        if let Some(host) = self.host.take().and_then(|weak| weak.upgrade()) {
            resume(&*host);
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.host.is_none()
    }

    /// Combine guards into one that releases them in reverse order.
    pub fn multi(guards: impl IntoIterator<Item = SuspensionGuard>) -> MultiGuard {
        MultiGuard {
            guards: guards.into_iter().collect(),
        }
    }
}

impl Drop for SuspensionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SuspensionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspensionGuard")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Several guards released together, last acquired first.
#[must_use = "dropping the guard ends the suspension immediately"]
#[derive(Debug, Default)]
pub struct MultiGuard {
    guards: Vec<SuspensionGuard>,
}

impl MultiGuard {
    pub fn push(&mut self, guard: SuspensionGuard) {
        self.guards.push(guard);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn release(&mut self) {
        while let Some(mut guard) = self.guards.pop() {
            guard.release();
        }
    }
}

impl Drop for MultiGuard {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Probe {
        counter: SuspendCounter,
        log: RefCell<Vec<&'static str>>,
    }

    impl SuspendHost for Probe {
        fn counter(&self) -> &SuspendCounter {
            &self.counter
        }

        fn on_suspend(&self) {
            self.log.borrow_mut().push("suspend");
        }

        fn flush(&self) {
            self.log.borrow_mut().push("flush");
        }
    }

    struct Entity {
        core: Rc<Probe>,
    }

    impl Suspendable for Entity {
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

    fn entity() -> Entity {
        Entity {
            core: Rc::new(Probe::default()),
        }
    }

    fn log(e: &Entity) -> Vec<&'static str> {
        e.core.log.borrow().clone()
    }

    #[test]
    fn counter_transitions() {
        let counter = SuspendCounter::new();
        assert!(!counter.is_suspended());
        assert_eq!(counter.acquire(), 1);
        assert_eq!(counter.acquire(), 2);
        assert_eq!(counter.release(), ReleaseOutcome::Nested { depth: 1 });
        assert_eq!(counter.release(), ReleaseOutcome::Resumed);
        assert_eq!(counter.release(), ReleaseOutcome::Unbalanced);
        assert_eq!(counter.depth(), 0);
    }

    #[test]
    fn guard_flushes_on_drop() {
        let e = entity();
        {
            let _guard = e.block();
            assert!(e.is_suspended());
            assert_eq!(log(&e), vec!["suspend"]);
        }
        assert!(!e.is_suspended());
        assert_eq!(log(&e), vec!["suspend", "flush"]);
    }

    #[test]
    fn guard_release_is_idempotent() {
        let e = entity();
        let outer = e.block();
        let mut inner = e.block();
        inner.release();
        inner.release();
        inner.release();
        assert!(inner.is_released());
        // The outer level is still held: repeated inner releases must not
        // have eaten it.
        assert_eq!(e.suspension_depth(), 1);
        assert_eq!(log(&e), vec!["suspend"]);
        drop(inner);
        drop(outer);
        assert_eq!(log(&e), vec!["suspend", "flush"]);
    }

    #[test]
    fn nested_release_does_not_flush() {
        let e = entity();
        let g1 = e.block();
        let g2 = e.block();
        drop(g2);
        assert!(e.is_suspended());
        assert_eq!(log(&e), vec!["suspend"]);
        drop(g1);
        assert_eq!(log(&e), vec!["suspend", "flush"]);
    }

    #[test]
    fn direct_release_at_zero_is_noop() {
        let e = entity();
        e.release();
        e.release();
        assert_eq!(e.suspension_depth(), 0);
        assert!(log(&e).is_empty());
    }

    #[test]
    fn block_while_returns_action_value() {
        let e = entity();
        let value = e.block_while(|| {
            assert!(e.is_suspended());
            7
        });
        assert_eq!(value, 7);
        assert!(!e.is_suspended());
        assert_eq!(log(&e), vec!["suspend", "flush"]);
    }

    #[test]
    fn block_while_propagates_error_after_release() {
        let e = entity();
        let result: Result<(), String> = e.block_while(|| Err("boom".to_string()));
        assert_eq!(result, Err("boom".to_string()));
        assert!(!e.is_suspended());
        assert_eq!(log(&e), vec!["suspend", "flush"]);
    }

    #[test]
    fn block_while_releases_on_panic() {
        let e = entity();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            e.block_while(|| {
                if e.is_suspended() {
                    panic!("action failed");
                }
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(e.suspension_depth(), 0);
    }

    #[test]
    fn guard_outliving_entity_is_inert() {
        let e = entity();
        let mut guard = e.block();
        drop(e);
        guard.release();
        assert!(guard.is_released());
    }

    #[test]
    fn multi_guard_releases_in_reverse_order() {
        let a = entity();
        let b = entity();
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Tagged {
            counter: SuspendCounter,
            tag: &'static str,
            order: Rc<RefCell<Vec<&'static str>>>,
        }
        impl SuspendHost for Tagged {
            fn counter(&self) -> &SuspendCounter {
                &self.counter
            }
            fn flush(&self) {
                self.order.borrow_mut().push(self.tag);
            }
        }

        let first = Rc::new(Tagged {
            counter: SuspendCounter::new(),
            tag: "first",
            order: Rc::clone(&order),
        });
        let second = Rc::new(Tagged {
            counter: SuspendCounter::new(),
            tag: "second",
            order: Rc::clone(&order),
        });

        let guard = SuspensionGuard::multi([
            SuspensionGuard::acquire(&first),
            SuspensionGuard::acquire(&second),
            a.block(),
            b.block(),
        ]);
        assert_eq!(guard.len(), 4);
        drop(guard);
        assert_eq!(*order.borrow(), vec!["second", "first"]);
        assert!(!a.is_suspended());
        assert!(!b.is_suspended());
    }

    #[test]
    fn released_guard_is_empty() {
        let mut guard = SuspensionGuard::released();
        assert!(guard.is_released());
        guard.release();
    }
}
