#![forbid(unsafe_code)]

//! Runtime: single-threaded observables whose notifications can be
//! suspended and coalesced.

pub mod reactive;

pub use reactive::{
    InhibitoryBinding, InhibitoryValue, ListListener, Listener, Observable, ObservableList,
    ObservableSequence, ObservableValue, SuspendWhen, SuspendableList, Subscription, eager_map,
    eager_map2,
};
