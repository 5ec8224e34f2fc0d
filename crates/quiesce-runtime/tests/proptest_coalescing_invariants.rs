//! Property-based invariant tests for suspended notification delivery.
//!
//! These tests verify properties that must hold for **any** burst of
//! mutations made while an entity is suspended:
//!
//! 1. Each listener hears at most one invalidation and one change event.
//! 2. Releasing more often than blocking never notifies again or underflows.
//! 3. Only the outermost release flushes.
//! 4. The merged list change replays the snapshot to the final content.
//! 5. With no-op suppression, a burst ending where it started is silent.

#![forbid(unsafe_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use quiesce_core::{
    AccumulatorSize, ListChange, SuspendConfig, Suspendable, SuspensionGuard,
};
use quiesce_runtime::{
    InhibitoryBinding, InhibitoryValue, ObservableList, ObservableSequence, ObservableValue,
    Subscription, SuspendableList, eager_map2,
};

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum ListOp {
    Push(u8),
    Insert(usize, u8),
    Remove(usize),
    Set(usize, u8),
    Splice(usize, usize, Vec<u8>),
    RetainEven,
    Sort,
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        4 => any::<u8>().prop_map(ListOp::Push),
        4 => (0usize..32, any::<u8>()).prop_map(|(i, v)| ListOp::Insert(i, v)),
        4 => (0usize..32).prop_map(ListOp::Remove),
        3 => (0usize..32, any::<u8>()).prop_map(|(i, v)| ListOp::Set(i, v)),
        2 => (0usize..32, 0usize..4, proptest::collection::vec(any::<u8>(), 0..4))
            .prop_map(|(i, n, items)| ListOp::Splice(i, n, items)),
        1 => Just(ListOp::RetainEven),
        1 => Just(ListOp::Sort),
    ]
}

/// Apply `op` to `list`, clamping indices to the live length.
fn perform(list: &ObservableList<u8>, op: &ListOp) {
    let len = list.len();
    let result = match op {
        ListOp::Push(v) => {
            list.push(*v);
            Ok(())
        }
        ListOp::Insert(i, v) => list.insert(i % (len + 1), *v),
        ListOp::Remove(i) if len > 0 => list.remove(i % len).map(|_| ()),
        ListOp::Set(i, v) if len > 0 => list.set(i % len, *v).map(|_| ()),
        ListOp::Remove(_) | ListOp::Set(..) => Ok(()),
        ListOp::Splice(i, n, items) => {
            let at = i % (len + 1);
            let end = (at + n).min(len);
            list.splice(at..end, items.clone()).map(|_| ())
        }
        ListOp::RetainEven => {
            list.retain(|v| v % 2 == 0);
            Ok(())
        }
        ListOp::Sort => {
            list.sort_by(Ord::cmp);
            Ok(())
        }
    };
    result.expect("clamped edits are in bounds");
}

struct Counts {
    invalidations: Rc<Cell<u32>>,
    changes: Rc<Cell<u32>>,
    _subs: (Subscription, Subscription),
}

fn count_value<V: ObservableValue<i32>>(target: &V) -> Counts {
    let invalidations = Rc::new(Cell::new(0));
    let changes = Rc::new(Cell::new(0));
    let (i, c) = (Rc::clone(&invalidations), Rc::clone(&changes));
    let subs = (
        target.on_invalidate(move || i.set(i.get() + 1)),
        target.on_change(move |_, _| c.set(c.get() + 1)),
    );
    Counts {
        invalidations,
        changes,
        _subs: subs,
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Coalescing bound
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn value_burst_notifies_at_most_once(writes in proptest::collection::vec(-5i32..5, 0..40)) {
        let value = InhibitoryValue::new(0);
        let counts = count_value(&value);
        value.block_while(|| {
            for w in &writes {
                value.set(*w);
            }
        });
        let last = writes.last().copied().unwrap_or(0);
        prop_assert!(counts.invalidations.get() <= 1);
        prop_assert!(counts.changes.get() <= 1);
        prop_assert_eq!(counts.changes.get(), u32::from(last != 0));
        prop_assert_eq!(value.get(), last);
    }

    #[test]
    fn binding_burst_notifies_at_most_once(
        writes in proptest::collection::vec((any::<bool>(), -5i32..5), 0..40),
    ) {
        let a = InhibitoryValue::new(0);
        let b = InhibitoryValue::new(0);
        let sum = eager_map2(a.source(), b.source(), |x: &i32, y: &i32| x + y);
        let binding = InhibitoryBinding::wrap(&sum);
        let counts = count_value(&binding);
        {
            let _guard = SuspensionGuard::multi([binding.block(), a.block(), b.block()]);
            for (first, w) in &writes {
                if *first { a.set(*w) } else { b.set(*w) }
                prop_assert_eq!(binding.get(), a.get() + b.get());
            }
            prop_assert_eq!(counts.invalidations.get(), 0);
        }
        prop_assert!(counts.invalidations.get() <= 1);
        prop_assert!(counts.changes.get() <= 1);
        prop_assert_eq!(binding.get(), a.get() + b.get());
    }

    #[test]
    fn list_burst_notifies_at_most_once(
        initial in proptest::collection::vec(any::<u8>(), 0..16),
        ops in proptest::collection::vec(list_op(), 0..24),
    ) {
        let source = ObservableList::new(initial);
        let list = SuspendableList::wrap(&source);
        let events = Rc::new(Cell::new(0u32));
        let e = Rc::clone(&events);
        let _sub = list.on_list_change(move |_| e.set(e.get() + 1));
        list.block_while(|| ops.iter().for_each(|op| perform(&source, op)));
        prop_assert!(events.get() <= 1);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Idempotent release
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn extra_releases_are_inert(extra in 0usize..8, writes in 1usize..8) {
        let value = InhibitoryValue::new(0);
        let counts = count_value(&value);
        let mut guard = value.block();
        for n in 1..=writes {
            value.set(n as i32);
        }
        guard.release();
        for _ in 0..extra {
            guard.release();
            value.release();
        }
        drop(guard);
        prop_assert_eq!(counts.invalidations.get(), 1);
        prop_assert_eq!(value.suspension_depth(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Nesting
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn only_outermost_release_flushes(depth in 1usize..10) {
        let value = InhibitoryValue::new(0);
        let counts = count_value(&value);
        let mut guards: Vec<_> = (0..depth).map(|_| value.block()).collect();
        value.set(1);
        while guards.len() > 1 {
            drop(guards.pop());
            prop_assert_eq!(counts.invalidations.get(), 0);
            prop_assert!(value.is_suspended());
        }
        guards.clear();
        prop_assert_eq!(counts.invalidations.get(), 1);
        prop_assert_eq!(value.suspension_depth(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. List merge fidelity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn merged_change_replays_snapshot(
        initial in proptest::collection::vec(any::<u8>(), 0..16),
        ops in proptest::collection::vec(list_op(), 0..24),
    ) {
        let source = ObservableList::new(initial);
        let list = SuspendableList::wrap(&source);
        let delivered: Rc<RefCell<Option<ListChange<u8>>>> = Rc::new(RefCell::new(None));
        let d = Rc::clone(&delivered);
        let _sub = list.on_list_change(move |c| *d.borrow_mut() = Some(c.clone()));

        let snapshot = list.to_vec();
        let guard = list.block();
        ops.iter().for_each(|op| perform(&source, op));
        let pending = list.pending_size();
        drop(guard);

        if pending == AccumulatorSize::Zero {
            prop_assert!(delivered.borrow().is_none());
        }
        let mut replay = snapshot;
        if let Some(change) = delivered.borrow().as_ref() {
            change.apply(&mut replay).expect("merged change fits the snapshot");
        }
        prop_assert_eq!(replay, list.to_vec());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. No-op suppression
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn round_trip_is_silent_when_suppressed(
        start in -5i32..5,
        detour in proptest::collection::vec(-5i32..5, 0..10),
    ) {
        let config = SuspendConfig::default().with_suppress_noop(true);
        let value = InhibitoryValue::with_config(start, config);
        let counts = count_value(&value);
        value.block_while(|| {
            for w in &detour {
                value.set(*w);
            }
            value.set(start);
        });
        prop_assert_eq!(counts.invalidations.get(), 0);
        prop_assert_eq!(counts.changes.get(), 0);
    }
}
