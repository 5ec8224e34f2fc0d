#![forbid(unsafe_code)]

//! Eagerly recomputed derived values.
//!
//! An eager derivation recomputes the moment any input invalidates and then
//! invalidates its own listeners, even when the result did not change. That
//! makes it the noisy kind of source [`InhibitoryBinding`] exists to tame:
//! N input mutations produce N invalidations here.
//!
//! Inputs are read through [`ObservableValue::get`] at recompute time, never
//! from the notification payload, so a recompute triggered by one input sees
//! the current value of every other input.
//!
//! [`InhibitoryBinding`]: super::InhibitoryBinding

use std::rc::Rc;

use super::observable::{Observable, ObservableValue};

/// Derive an observable from one input.
pub fn eager_map<S, T, A>(source: &A, map: impl Fn(&S) -> T + 'static) -> Observable<T>
where
    S: 'static,
    T: Clone + PartialEq + 'static,
    A: ObservableValue<S> + Clone + 'static,
{
    let out = Observable::new(map(&source.get()));
    let weak = out.downgrade();
    let src = source.clone();
    let sub = source.on_invalidate(move || {
        if let Some(out) = weak.upgrade() {
            out.refresh(map(&src.get()));
        }
    });
    out.hold(sub);
    out
}

/// Derive an observable from two inputs, e.g. `a AND b`.
pub fn eager_map2<S1, S2, T, A, B>(
    a: &A,
    b: &B,
    map: impl Fn(&S1, &S2) -> T + 'static,
) -> Observable<T>
where
    S1: 'static,
    S2: 'static,
    T: Clone + PartialEq + 'static,
    A: ObservableValue<S1> + Clone + 'static,
    B: ObservableValue<S2> + Clone + 'static,
{
    let out = Observable::new(map(&a.get(), &b.get()));
    let recompute: Rc<dyn Fn()> = {
        let weak = out.downgrade();
        let a = a.clone();
        let b = b.clone();
        Rc::new(move || {
            if let Some(out) = weak.upgrade() {
                out.refresh(map(&a.get(), &b.get()));
            }
        })
    };
    let on_a = Rc::clone(&recompute);
    out.hold(a.on_invalidate(move || on_a()));
    out.hold(b.on_invalidate(move || recompute()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn map_tracks_source() {
        let src = Observable::new(3);
        let doubled = eager_map(&src, |v: &i32| v * 2);
        assert_eq!(doubled.get(), 6);
        src.set(10);
        assert_eq!(doubled.get(), 20);
    }

    #[test]
    fn map2_and_gate() {
        let a = Observable::new(false);
        let b = Observable::new(false);
        let and = eager_map2(&a, &b, |x: &bool, y: &bool| *x && *y);
        assert!(!and.get());
        a.set(true);
        assert!(!and.get());
        b.set(true);
        assert!(and.get());
    }

    #[test]
    fn invalidates_on_every_input_mutation() {
        let a = Observable::new(0);
        let b = Observable::new(0);
        let max = eager_map2(&a, &b, |x: &i32, y: &i32| *x.max(y));
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = max.on_invalidate(move || c.set(c.get() + 1));

        a.set(5);
        b.set(1); // max unchanged, still invalidates
        b.set(2);
        assert_eq!(count.get(), 3);
        assert_eq!(max.get(), 5);
    }

    #[test]
    fn dropping_derivation_unsubscribes() {
        let src = Observable::new(1);
        let derived = eager_map(&src, |v: &i32| v + 1);
        assert_eq!(src.listener_count(), 1);
        drop(derived);
        src.set(2);
        assert_eq!(src.listener_count(), 0);
    }
}
