#![forbid(unsafe_code)]

//! Core: suspension counting, scoped guards, and list change accumulation.
//!
//! Nothing here knows about observables. [`suspend`] defines the nesting
//! protocol every suspendable entity shares; [`change`] and [`accumulator`]
//! describe and merge structural list edits.

pub mod accumulator;
pub mod change;
pub mod config;
pub mod error;
pub mod suspend;

pub use accumulator::{AccumulatorSize, ChangeAccumulator, merge_edits};
pub use change::{ChangeSpan, ListChange, ListEdit, Permutation};
pub use config::{MergePolicy, SuspendConfig};
pub use error::{QuiesceError, Result};
pub use suspend::{
    MultiGuard, ReleaseOutcome, SuspendCounter, SuspendHost, Suspendable, SuspensionGuard,
};
