#![forbid(unsafe_code)]

//! Reactive values and lists with suspendable notifications.
//!
//! - [`Observable`]: a shared, version-tracked value that notifies on every
//!   effective mutation.
//! - [`eager_map`] / [`eager_map2`]: derived observables recomputed on every
//!   input notification.
//! - [`ObservableList`]: a shared list reporting structural changes.
//! - [`InhibitoryValue`], [`InhibitoryBinding`], [`SuspendableList`]: the
//!   gated counterparts, implementing [`Suspendable`].
//! - [`SuspendWhen`]: suspend a target while a condition holds.
//!
//! # Architecture
//!
//! Every entity is a thin handle around an `Rc` core. Listeners are stored as
//! `Weak` pointers and owned by the [`Subscription`] handed back on
//! registration. The gated entities subscribe once to their source; while
//! suspended they record that something happened instead of forwarding it,
//! and the core's `flush` turns the record into one delivery.
//!
//! # Invariants
//!
//! 1. Reads are never delayed by suspension.
//! 2. Invalidation listeners run before change listeners, each group in
//!    registration order.
//! 3. Between one outermost `block()` and its release, each listener hears
//!    at most one invalidation and one change event.
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//!
//! [`Suspendable`]: quiesce_core::Suspendable

pub mod binding;
pub mod eager;
pub mod list;
pub mod listener;
pub mod observable;
pub mod suspend_when;
pub mod suspendable_list;
pub mod value;

pub use binding::InhibitoryBinding;
pub use eager::{eager_map, eager_map2};
pub use list::{ObservableList, ObservableSequence};
pub use listener::{Callback, ListListener, Listener, ListenerSet, Subscription};
pub use observable::{Observable, ObservableValue, WeakObservable};
pub use suspend_when::SuspendWhen;
pub use suspendable_list::SuspendableList;
pub use value::InhibitoryValue;
