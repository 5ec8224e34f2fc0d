#![forbid(unsafe_code)]

//! quiesce public facade crate.
//!
//! Suspend the notifications of observable values and lists, then deliver
//! one coalesced notification when the outermost suspension ends:
//!
//! ```
//! use quiesce::prelude::*;
//!
//! let value = InhibitoryValue::new(0);
//! let _sub = value.on_change(|old, new| println!("{old} -> {new}"));
//! value.block_while(|| {
//!     value.set(1);
//!     value.set(2);
//! }); // prints "0 -> 2" once
//! ```

pub mod prelude {
    pub use quiesce_core as core;
    #[cfg(feature = "runtime")]
    pub use quiesce_runtime as runtime;

    pub use quiesce_core::{
        AccumulatorSize, ChangeAccumulator, ChangeSpan, ListChange, ListEdit, MergePolicy,
        MultiGuard, Permutation, QuiesceError, SuspendConfig, Suspendable, SuspensionGuard,
    };
    #[cfg(feature = "runtime")]
    pub use quiesce_runtime::{
        InhibitoryBinding, InhibitoryValue, Observable, ObservableList, ObservableSequence,
        ObservableValue, SuspendWhen, SuspendableList, Subscription, eager_map, eager_map2,
    };
}
