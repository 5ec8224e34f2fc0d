#![forbid(unsafe_code)]

//! Accumulation of list edits while a sequence is suspended.
//!
//! # Design
//!
//! [`ChangeAccumulator`] keeps the raw log of elemental edits and the list
//! length before and after them. Its [`size`](ChangeAccumulator::size) tells
//! the flush path whether there is nothing to report, one edit to forward as
//! is, or many edits that must be folded into a single [`ListChange`].
//!
//! # Merge
//!
//! The fold keeps a sorted set of spans in *snapshot* coordinates (indices of
//! the list before the first edit). For each incoming edit, expressed in
//! *current* coordinates, a span's current position is its snapshot position
//! shifted by the net delta of every span before it. Spans the edit overlaps
//! or touches are fused with it; untouched elements the edit removes are, by
//! construction, still snapshot elements and go straight into `removed`.
//!
//! # Invariants
//!
//! 1. Applying the merged change to the snapshot yields exactly the list
//!    obtained by replaying the log in order.
//! 2. Merged spans are sorted, disjoint, non-adjacent, and non-empty.
//! 3. A log of one edit is returned unchanged (permutations included).

use std::mem;

use crate::change::{ChangeSpan, ListChange, ListEdit};
use crate::error::{QuiesceError, Result};

/// Coarse size of a pending change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccumulatorSize {
    /// Nothing pending.
    Zero,
    /// Exactly one pending change, deliverable as is.
    One,
    /// Several pending changes that must be combined.
    Many,
}

impl AccumulatorSize {
    #[must_use]
    pub const fn from_count(n: usize) -> Self {
        match n {
            0 => Self::Zero,
            1 => Self::One,
            _ => Self::Many,
        }
    }
}

impl TryFrom<i64> for AccumulatorSize {
    type Error = QuiesceError;

    fn try_from(n: i64) -> Result<Self> {
        if n < 0 {
            return Err(QuiesceError::NegativeSize(n));
        }
        Ok(Self::from_count(usize::try_from(n).unwrap_or(usize::MAX)))
    }
}

impl TryFrom<i32> for AccumulatorSize {
    type Error = QuiesceError;

    fn try_from(n: i32) -> Result<Self> {
        Self::try_from(i64::from(n))
    }
}

/// Pending edit log for one suspension.
#[derive(Debug, Clone)]
pub struct ChangeAccumulator<E> {
    log: Vec<ListEdit<E>>,
    len_before: usize,
    len_now: usize,
}

impl<E> Default for ChangeAccumulator<E> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<E> ChangeAccumulator<E> {
    /// Empty accumulator for a list currently `len_before` long.
    #[must_use]
    pub fn new(len_before: usize) -> Self {
        Self {
            log: Vec::new(),
            len_before,
            len_now: len_before,
        }
    }

    /// Accumulator pre-filled with `log`. Every edit must be valid against
    /// the list length produced by the edits before it.
    pub fn from_log(len_before: usize, log: Vec<ListEdit<E>>) -> Result<Self> {
        let mut len_now = len_before;
        for edit in &log {
            edit.validate(len_now)?;
            len_now = edit.len_after(len_now);
        }
        Ok(Self {
            log,
            len_before,
            len_now,
        })
    }

    /// Append one edit, rejecting it if it does not fit the current length.
    pub fn record(&mut self, edit: ListEdit<E>) -> Result<()> {
        edit.validate(self.len_now)?;
        self.len_now = edit.len_after(self.len_now);
        self.log.push(edit);
        Ok(())
    }

    #[must_use]
    pub fn size(&self) -> AccumulatorSize {
        AccumulatorSize::from_count(self.log.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    #[must_use]
    pub fn log(&self) -> &[ListEdit<E>] {
        &self.log
    }

    /// Length of the snapshot the log starts from.
    #[must_use]
    pub fn len_before(&self) -> usize {
        self.len_before
    }

    /// Length after replaying the whole log.
    #[must_use]
    pub fn current_len(&self) -> usize {
        self.len_now
    }

    /// Drop the log and start over from a list `len_before` long.
    pub fn reset(&mut self, len_before: usize) {
        self.log.clear();
        self.len_before = len_before;
        self.len_now = len_before;
    }

    /// Drop the log, keeping the current length as the new snapshot length.
    pub fn discard(&mut self) {
        self.log.clear();
        self.len_before = self.len_now;
    }
}

impl<E: Clone> ChangeAccumulator<E> {
    /// Drain the log into one change.
    ///
    /// Returns `None` when nothing is pending, or when the edits cancel out
    /// structurally (for example an insert later removed again).
    pub fn take(&mut self) -> Option<ListChange<E>> {
        let log = mem::take(&mut self.log);
        self.len_before = self.len_now;
        match AccumulatorSize::from_count(log.len()) {
            AccumulatorSize::Zero => None,
            AccumulatorSize::One => log.into_iter().next().map(ListChange::single),
            AccumulatorSize::Many => {
                let edits = log.len();
                let spans = merge_edits(log);
                tracing::debug!(message = "accumulator.merge", edits, spans = spans.len());
                if spans.is_empty() {
                    return None;
                }
                // merge_edits only produces sorted, disjoint, non-empty spans.
                ListChange::from_spans(spans).ok()
            }
        }
    }
}

/// Fold elemental edits into snapshot-indexed spans.
pub fn merge_edits<E: Clone>(edits: impl IntoIterator<Item = ListEdit<E>>) -> Vec<ChangeSpan<E>> {
    let mut spans = Vec::new();
    for edit in edits {
        fold_span(&mut spans, edit.into_span());
    }
    spans
}

fn shifted(index: usize, delta: isize) -> usize {
    (index as isize + delta) as usize
}

fn fold_span<E: Clone>(spans: &mut Vec<ChangeSpan<E>>, edit: ChangeSpan<E>) {
    let at = edit.from;
    let end = edit.removed_end();

    // Skip spans that end strictly before the edit.
    let mut delta: isize = 0;
    let mut first = 0;
    while first < spans.len() {
        let span = &spans[first];
        if shifted(span.from, delta) + span.added.len() >= at {
            break;
        }
        delta += span.delta();
        first += 1;
    }
    let delta_before = delta;

    // Collect spans that start at or before the edit's end.
    let mut starts = Vec::new();
    let mut stop = first;
    while stop < spans.len() {
        let start = shifted(spans[stop].from, delta);
        if start > end {
            break;
        }
        starts.push(start);
        delta += spans[stop].delta();
        stop += 1;
    }

    if starts.is_empty() {
        if !edit.is_empty() {
            let from = shifted(at, -delta_before);
            spans.insert(first, ChangeSpan::new(from, edit.removed, edit.added));
        }
        return;
    }

    let touched: Vec<ChangeSpan<E>> = spans.drain(first..stop).collect();
    let head = &touched[0];
    let tail = &touched[touched.len() - 1];
    let head_start = starts[0];
    let tail_start = starts[starts.len() - 1];
    let tail_end = tail_start + tail.added.len();

    let from = if at < head_start {
        shifted(at, -delta_before)
    } else {
        head.from
    };

    let mut removed = Vec::new();
    if at < head_start {
        removed.extend_from_slice(&edit.removed[..head_start - at]);
    }
    for (k, span) in touched.iter().enumerate() {
        removed.extend_from_slice(&span.removed);
        if let Some(&next_start) = starts.get(k + 1) {
            let gap_start = starts[k] + span.added.len();
            removed.extend_from_slice(&edit.removed[gap_start - at..next_start - at]);
        }
    }
    if end > tail_end {
        removed.extend_from_slice(&edit.removed[tail_end - at..]);
    }

    let mut added = Vec::new();
    if head_start < at {
        added.extend_from_slice(&head.added[..at - head_start]);
    }
    added.extend(edit.added);
    if tail_end > end {
        added.extend_from_slice(&tail.added[end - tail_start..]);
    }

    let merged = ChangeSpan::new(from, removed, added);
    if !merged.is_empty() {
        spans.insert(first, merged);
    }
}

impl<E: Clone> ListChange<E> {
    /// Widen a multi-span change into one span covering the first through
    /// the last touched index. `current` is the list after the change; the
    /// untouched elements between spans are read from it.
    pub fn widened(&self, current: &[E]) -> Result<ListChange<E>> {
        let spans = self.spans();
        if spans.len() < 2 {
            return Ok(self.clone());
        }
        let mut removed = Vec::new();
        let mut delta: isize = 0;
        for (k, span) in spans.iter().enumerate() {
            removed.extend_from_slice(&span.removed);
            delta += span.delta();
            if let Some(next) = spans.get(k + 1) {
                let gap_start = shifted(span.removed_end(), delta);
                let gap_end = shifted(next.from, delta);
                let gap = current.get(gap_start..gap_end).ok_or_else(|| {
                    QuiesceError::out_of_bounds(gap_start, gap_end - gap_start, current.len())
                })?;
                removed.extend_from_slice(gap);
            }
        }
        let from = spans[0].from;
        let end = shifted(spans[spans.len() - 1].removed_end(), delta);
        let added = current
            .get(from..end)
            .ok_or_else(|| QuiesceError::out_of_bounds(from, end - from, current.len()))?
            .to_vec();
        ListChange::from_spans(vec![ChangeSpan::new(from, removed, added)])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
