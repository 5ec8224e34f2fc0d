#![forbid(unsafe_code)]

//! Observable sequences.
//!
//! [`ObservableList<E>`] is a `Vec<E>` that reports every structural mutation
//! as one [`ListChange`]. Storage is updated before listeners run, so a
//! listener reading the list sees the post-change content. Mutations that
//! change nothing (an empty splice, clearing an empty list, sorting a sorted
//! list) are not reported.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use quiesce_core::{ChangeSpan, ListChange, ListEdit, Permutation, QuiesceError, Result};

use super::listener::{ListListener, ListenerSet, Subscription};

/// Read side of any observable sequence.
pub trait ObservableSequence<E> {
    fn get(&self, index: usize) -> Option<E>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_vec(&self) -> Vec<E>;

    fn add_list_listener(&self, listener: ListListener<E>) -> Subscription;

    fn on_invalidate(&self, f: impl Fn() + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.add_list_listener(ListListener::invalidation(f))
    }

    fn on_list_change(&self, f: impl Fn(&ListChange<E>) + 'static) -> Subscription
    where
        Self: Sized,
        E: 'static,
    {
        self.add_list_listener(ListListener::list_change(f))
    }
}

struct ListCore<E> {
    items: RefCell<Vec<E>>,
    listeners: ListenerSet<dyn Fn(&ListChange<E>)>,
}

/// A shared list with synchronous structural-change notification.
///
/// Cloning creates a new handle to the **same** list.
pub struct ObservableList<E> {
    core: Rc<ListCore<E>>,
}

impl<E> Clone for ObservableList<E> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for ObservableList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("items", &*self.core.items.borrow())
            .finish()
    }
}

impl<E: Clone + 'static> Default for ObservableList<E> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<E: Clone + 'static> ObservableList<E> {
    #[must_use]
    pub fn new(items: Vec<E>) -> Self {
        Self {
            core: Rc::new(ListCore {
                items: RefCell::new(items),
                listeners: ListenerSet::new(),
            }),
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<E> {
        self.core.items.borrow().get(index).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.core.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.items.borrow().is_empty()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<E> {
        self.core.items.borrow().clone()
    }

    /// Borrow the contents without cloning.
    ///
    /// # Panics
    ///
    /// Panics if `f` mutates this list.
    pub fn with<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        f(&self.core.items.borrow())
    }

    pub fn push(&self, item: E) {
        let at = {
            let mut items = self.core.items.borrow_mut();
            items.push(item.clone());
            items.len() - 1
        };
        self.emit(ListChange::single(ChangeSpan::insertion(at, vec![item]).into()));
    }

    pub fn insert(&self, index: usize, item: E) -> Result<()> {
        self.splice(index..index, vec![item]).map(|_| ())
    }

    /// Remove and return the element at `index`.
    pub fn remove(&self, index: usize) -> Result<E> {
        let mut removed = self.splice(index..index + 1, Vec::new())?;
        removed
            .pop()
            .ok_or_else(|| QuiesceError::out_of_bounds(index, 1, self.len()))
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&self, index: usize, item: E) -> Result<E> {
        let mut removed = self.splice(index..index + 1, vec![item])?;
        removed
            .pop()
            .ok_or_else(|| QuiesceError::out_of_bounds(index, 1, self.len()))
    }

    /// Replace `range` with `items`, returning what was removed.
    pub fn splice(&self, range: Range<usize>, items: Vec<E>) -> Result<Vec<E>> {
        let removed: Vec<E> = {
            let mut list = self.core.items.borrow_mut();
            if range.start > range.end || range.end > list.len() {
                return Err(QuiesceError::out_of_bounds(
                    range.start,
                    range.end.saturating_sub(range.start),
                    list.len(),
                ));
            }
            list.splice(range.clone(), items.iter().cloned()).collect()
        };
        let span = ChangeSpan::new(range.start, removed.clone(), items);
        if !span.is_empty() {
            self.emit(ListChange::single(span.into()));
        }
        Ok(removed)
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.core.items.borrow_mut());
        if !removed.is_empty() {
            self.emit(ListChange::single(ChangeSpan::removal(0, removed).into()));
        }
    }

    /// Keep only the elements matching `keep`. Every removed run becomes one
    /// span of a single change.
    pub fn retain(&self, mut keep: impl FnMut(&E) -> bool) {
        let spans = {
            let mut items = self.core.items.borrow_mut();
            let mut spans: Vec<ChangeSpan<E>> = Vec::new();
            let mut kept = Vec::with_capacity(items.len());
            for (index, item) in items.drain(..).enumerate() {
                if keep(&item) {
                    kept.push(item);
                    continue;
                }
                match spans.last_mut() {
                    Some(run) if run.removed_end() == index => run.removed.push(item),
                    _ => spans.push(ChangeSpan::removal(index, vec![item])),
                }
            }
            *items = kept;
            spans
        };
        if spans.is_empty() {
            return;
        }
        match ListChange::from_spans(spans) {
            Ok(change) => self.emit(change),
            Err(err) => tracing::warn!(message = "list.retain_rejected", error = %err),
        }
    }

    /// Stable sort, reported as a permutation.
    pub fn sort_by(&self, mut compare: impl FnMut(&E, &E) -> Ordering) {
        let before = self.to_vec();
        let mut order: Vec<usize> = (0..before.len()).collect();
        order.sort_by(|&i, &j| compare(&before[i], &before[j]));
        if order.iter().enumerate().all(|(k, &i)| k == i) {
            return;
        }
        let mut mapping = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            mapping[old] = new;
        }
        *self.core.items.borrow_mut() = order.iter().map(|&i| before[i].clone()).collect();
        // `mapping` inverts a permutation of 0..len, so it is a bijection.
        if let Ok(perm) = Permutation::new(0, mapping, before) {
            self.emit(ListChange::single(ListEdit::Permute(perm)));
        }
    }

    /// Reorder the whole list: the element at `i` moves to `mapping[i]`.
    pub fn permute(&self, mapping: Vec<usize>) -> Result<()> {
        let perm = Permutation::new(0, mapping, self.to_vec())?;
        *self.core.items.borrow_mut() = perm.after();
        self.emit(ListChange::single(ListEdit::Permute(perm)));
        Ok(())
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.core.listeners.len()
    }

    fn emit(&self, change: ListChange<E>) {
        self.core.listeners.notify_invalidated();
        self.core.listeners.for_each_change(|f| f(&change));
    }
}

impl<E: Clone + 'static> ObservableSequence<E> for ObservableList<E> {
    fn get(&self, index: usize) -> Option<E> {
        ObservableList::get(self, index)
    }

    fn len(&self) -> usize {
        ObservableList::len(self)
    }

    fn to_vec(&self) -> Vec<E> {
        ObservableList::to_vec(self)
    }

    fn add_list_listener(&self, listener: ListListener<E>) -> Subscription {
        self.core.listeners.add(listener)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(
        list: &ObservableList<char>,
    ) -> (Rc<RefCell<Vec<ListChange<char>>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = list.on_list_change(move |c| l.borrow_mut().push(c.clone()));
        (log, sub)
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn push_insert_remove_set() {
        let list = ObservableList::new(chars("ab"));
        let (log, _sub) = recording(&list);

        list.push('c');
        list.insert(0, 'z').expect("in bounds");
        assert_eq!(list.remove(1), Ok('a'));
        assert_eq!(list.set(0, 'y'), Ok('z'));
        assert_eq!(list.to_vec(), chars("ybc"));

        let log = log.borrow();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].spans(), &[ChangeSpan::insertion(2, vec!['c'])]);
        assert_eq!(log[2].spans(), &[ChangeSpan::removal(1, vec!['a'])]);
        assert_eq!(log[3].spans(), &[ChangeSpan::new(0, vec!['z'], vec!['y'])]);
    }

    #[test]
    fn out_of_bounds_is_an_error_and_silent() {
        let list = ObservableList::new(chars("ab"));
        let (log, _sub) = recording(&list);
        assert!(list.insert(3, 'x').is_err());
        assert!(list.remove(2).is_err());
        assert!(list.splice(1..5, vec![]).is_err());
        assert!(log.borrow().is_empty());
        assert_eq!(list.to_vec(), chars("ab"));
    }

    #[test]
    fn empty_mutations_are_not_reported() {
        let list: ObservableList<char> = ObservableList::default();
        let (log, _sub) = recording(&list);
        list.clear();
        list.splice(0..0, vec![]).expect("empty splice");
        list.sort_by(Ord::cmp);
        list.retain(|_| true);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn retain_reports_removed_runs() {
        let list = ObservableList::new(chars("aXXbXc"));
        let (log, _sub) = recording(&list);
        list.retain(|c| *c != 'X');
        assert_eq!(list.to_vec(), chars("abc"));
        let log = log.borrow();
        assert_eq!(
            log[0].spans(),
            &[
                ChangeSpan::removal(1, chars("XX")),
                ChangeSpan::removal(4, chars("X"))
            ]
        );
    }

    #[test]
    fn sort_reports_permutation() {
        let list = ObservableList::new(chars("cab"));
        let (log, _sub) = recording(&list);
        list.sort_by(Ord::cmp);
        assert_eq!(list.to_vec(), chars("abc"));
        let log = log.borrow();
        let perm = log[0].permutation().expect("sort is a permutation");
        assert_eq!(perm.mapping, vec![2, 0, 1]);
        assert_eq!(perm.after(), chars("abc"));
    }

    #[test]
    fn permute_validates_mapping() {
        let list = ObservableList::new(chars("abc"));
        assert!(list.permute(vec![0, 0, 1]).is_err());
        list.permute(vec![2, 1, 0]).expect("valid mapping");
        assert_eq!(list.to_vec(), chars("cba"));
    }

    #[test]
    fn listener_sees_updated_storage() {
        let list = ObservableList::new(vec![1, 2]);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let reader = list.clone();
        let _sub = list.on_invalidate(move || *s.borrow_mut() = reader.to_vec());
        list.push(3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn change_replays_against_snapshot() {
        let list = ObservableList::new(chars("hello"));
        let (log, _sub) = recording(&list);
        let mut mirror = list.to_vec();
        list.splice(1..4, chars("ipp")).expect("in bounds");
        list.retain(|c| *c != 'p');
        for change in log.borrow().iter() {
            change.apply(&mut mirror).expect("change fits mirror");
        }
        assert_eq!(mirror, list.to_vec());
    }
}
