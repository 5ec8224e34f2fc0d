#![forbid(unsafe_code)]

//! Error type shared by the quiesce crates.
//!
//! Only misuse is an error: negative sizes handed to the size classifier and
//! change logs that do not describe a valid sequence of edits. Releasing a
//! suspension more often than it was acquired is deliberately *not* an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuiesceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuiesceError {
    #[error("size cannot be negative: {0}")]
    NegativeSize(i64),

    #[error("edit at {from} removing {removed} element(s) exceeds list length {len}")]
    EditOutOfBounds {
        from: usize,
        removed: usize,
        len: usize,
    },

    #[error("invalid permutation at {from}: {reason}")]
    InvalidPermutation { from: usize, reason: String },

    #[error("change spans overlap or are out of order at span {index}")]
    UnorderedSpans { index: usize },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl QuiesceError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn out_of_bounds(from: usize, removed: usize, len: usize) -> Self {
        Self::EditOutOfBounds { from, removed, len }
    }
}
