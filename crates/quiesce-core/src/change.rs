#![forbid(unsafe_code)]

//! Structural change descriptions for observable sequences.
//!
//! # Coordinates
//!
//! A [`ListEdit`] is *elemental*: its indices refer to the list exactly as it
//! was right before that edit. A [`ListChange`] is what listeners receive. It
//! holds either a single permutation or a set of [`ChangeSpan`]s that are
//! sorted, disjoint, and non-adjacent, every `from` indexing the list as it
//! was before the whole change. [`ListChange::apply`] therefore splices from
//! the back, and [`ListChange::sequential_edits`] converts to elemental form.

use crate::error::{QuiesceError, Result};

/// Replace `removed.len()` elements starting at `from` with `added`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSpan<E> {
    pub from: usize,
    pub removed: Vec<E>,
    pub added: Vec<E>,
}

impl<E> ChangeSpan<E> {
    #[must_use]
    pub fn new(from: usize, removed: Vec<E>, added: Vec<E>) -> Self {
        Self {
            from,
            removed,
            added,
        }
    }

    #[must_use]
    pub fn insertion(from: usize, added: Vec<E>) -> Self {
        Self::new(from, Vec::new(), added)
    }

    #[must_use]
    pub fn removal(from: usize, removed: Vec<E>) -> Self {
        Self::new(from, removed, Vec::new())
    }

    /// End of the removed range, exclusive. Saturates, so an end past
    /// `usize::MAX` still compares as out of bounds.
    #[must_use]
    pub fn removed_end(&self) -> usize {
        self.from.saturating_add(self.removed.len())
    }

    /// Net change in list length.
    #[must_use]
    pub fn delta(&self) -> isize {
        self.added.len() as isize - self.removed.len() as isize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    #[must_use]
    pub fn is_identity(&self) -> bool
    where
        E: PartialEq,
    {
        self.removed == self.added
    }
}

impl<E: Clone> ChangeSpan<E> {
    /// Splice this span into `list`, treating `from` as an index into `list`.
    pub fn apply_to(&self, list: &mut Vec<E>) -> Result<()> {
        if self.removed_end() > list.len() {
            return Err(QuiesceError::out_of_bounds(
                self.from,
                self.removed.len(),
                list.len(),
            ));
        }
        list.splice(self.from..self.removed_end(), self.added.iter().cloned());
        Ok(())
    }
}

/// Reordering of `before.len()` elements starting at `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation<E> {
    pub from: usize,
    /// `mapping[i]` is the new offset (relative to `from`) of the element
    /// that was at `from + i`.
    pub mapping: Vec<usize>,
    /// The reordered window as it was before the permutation.
    pub before: Vec<E>,
}

impl<E> Permutation<E> {
    /// Build a permutation, checking that `mapping` is a bijection on
    /// `0..before.len()`.
    pub fn new(from: usize, mapping: Vec<usize>, before: Vec<E>) -> Result<Self> {
        if mapping.len() != before.len() {
            return Err(QuiesceError::InvalidPermutation {
                from,
                reason: format!(
                    "mapping covers {} element(s) but window has {}",
                    mapping.len(),
                    before.len()
                ),
            });
        }
        let mut seen = vec![false; mapping.len()];
        for &target in &mapping {
            match seen.get_mut(target) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(QuiesceError::InvalidPermutation {
                        from,
                        reason: format!("offset {target} is targeted twice"),
                    });
                }
                None => {
                    return Err(QuiesceError::InvalidPermutation {
                        from,
                        reason: format!("offset {target} is outside the window"),
                    });
                }
            }
        }
        Ok(Self {
            from,
            mapping,
            before,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.before.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
    }

    /// New index of the element that was at `index`. Indices outside the
    /// window map to themselves.
    #[must_use]
    pub fn new_index(&self, index: usize) -> usize {
        match index.checked_sub(self.from) {
            Some(offset) if offset < self.mapping.len() => self.from + self.mapping[offset],
            _ => index,
        }
    }
}

impl<E: Clone> Permutation<E> {
    /// The reordered window.
    #[must_use]
    pub fn after(&self) -> Vec<E> {
        let mut slots: Vec<Option<E>> = vec![None; self.before.len()];
        for (offset, item) in self.before.iter().enumerate() {
            slots[self.mapping[offset]] = Some(item.clone());
        }
        slots.into_iter().flatten().collect()
    }

    /// Equivalent replace span over the same window.
    #[must_use]
    pub fn to_span(&self) -> ChangeSpan<E> {
        ChangeSpan::new(self.from, self.before.clone(), self.after())
    }
}

/// One elemental structural change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEdit<E> {
    Splice(ChangeSpan<E>),
    Permute(Permutation<E>),
}

impl<E> ListEdit<E> {
    #[must_use]
    pub fn start(&self) -> usize {
        match self {
            Self::Splice(span) => span.from,
            Self::Permute(perm) => perm.from,
        }
    }

    /// Number of elements of the prior list this edit reads or replaces.
    #[must_use]
    pub fn removed_len(&self) -> usize {
        match self {
            Self::Splice(span) => span.removed.len(),
            Self::Permute(perm) => perm.len(),
        }
    }

    #[must_use]
    pub fn added_len(&self) -> usize {
        match self {
            Self::Splice(span) => span.added.len(),
            Self::Permute(perm) => perm.len(),
        }
    }

    /// Check this edit against a list of length `len`.
    pub fn validate(&self, len: usize) -> Result<()> {
        let end = self.start().checked_add(self.removed_len());
        if end.is_none_or(|end| end > len) {
            return Err(QuiesceError::out_of_bounds(
                self.start(),
                self.removed_len(),
                len,
            ));
        }
        Ok(())
    }

    /// Length of a list of length `len` after this edit.
    #[must_use]
    pub fn len_after(&self, len: usize) -> usize {
        len + self.added_len() - self.removed_len()
    }
}

impl<E: Clone> ListEdit<E> {
    #[must_use]
    pub fn into_span(self) -> ChangeSpan<E> {
        match self {
            Self::Splice(span) => span,
            Self::Permute(perm) => perm.to_span(),
        }
    }
}

impl<E> From<ChangeSpan<E>> for ListEdit<E> {
    fn from(span: ChangeSpan<E>) -> Self {
        Self::Splice(span)
    }
}

impl<E> From<Permutation<E>> for ListEdit<E> {
    fn from(perm: Permutation<E>) -> Self {
        Self::Permute(perm)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChangeBody<E> {
    Spans(Vec<ChangeSpan<E>>),
    Permutation(Permutation<E>),
}

/// A structural change delivered to list listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChange<E> {
    body: ChangeBody<E>,
}

impl<E> ListChange<E> {
    /// Change made of a single elemental edit.
    #[must_use]
    pub fn single(edit: ListEdit<E>) -> Self {
        let body = match edit {
            ListEdit::Splice(span) => ChangeBody::Spans(vec![span]),
            ListEdit::Permute(perm) => ChangeBody::Permutation(perm),
        };
        Self { body }
    }

    /// Build a multi-span change. Spans must be sorted by `from` with no
    /// overlap and no adjacency in pre-change coordinates; empty spans are
    /// rejected.
    pub fn from_spans(spans: Vec<ChangeSpan<E>>) -> Result<Self> {
        let mut prev_end: Option<usize> = None;
        for (index, span) in spans.iter().enumerate() {
            if span.is_empty() {
                return Err(QuiesceError::invalid(format!("span {index} is empty")));
            }
            if let Some(end) = prev_end
                && span.from <= end
            {
                return Err(QuiesceError::UnorderedSpans { index });
            }
            prev_end = Some(span.removed_end());
        }
        Ok(Self {
            body: ChangeBody::Spans(spans),
        })
    }

    /// Spans of a splice change; empty for a permutation.
    #[must_use]
    pub fn spans(&self) -> &[ChangeSpan<E>] {
        match &self.body {
            ChangeBody::Spans(spans) => spans,
            ChangeBody::Permutation(_) => &[],
        }
    }

    #[must_use]
    pub fn permutation(&self) -> Option<&Permutation<E>> {
        match &self.body {
            ChangeBody::Permutation(perm) => Some(perm),
            ChangeBody::Spans(_) => None,
        }
    }

    #[must_use]
    pub fn is_permutation(&self) -> bool {
        matches!(self.body, ChangeBody::Permutation(_))
    }

    #[must_use]
    pub fn removed_len(&self) -> usize {
        match &self.body {
            ChangeBody::Spans(spans) => spans.iter().map(|s| s.removed.len()).sum(),
            ChangeBody::Permutation(perm) => perm.len(),
        }
    }

    #[must_use]
    pub fn added_len(&self) -> usize {
        match &self.body {
            ChangeBody::Spans(spans) => spans.iter().map(|s| s.added.len()).sum(),
            ChangeBody::Permutation(perm) => perm.len(),
        }
    }

    /// True when applying the change leaves the list as it was.
    #[must_use]
    pub fn is_identity(&self) -> bool
    where
        E: PartialEq,
    {
        match &self.body {
            ChangeBody::Spans(spans) => spans.iter().all(ChangeSpan::is_identity),
            ChangeBody::Permutation(perm) => perm
                .mapping
                .iter()
                .enumerate()
                .all(|(offset, &target)| {
                    offset == target || perm.before[offset] == perm.before[target]
                }),
        }
    }
}

impl<E: Clone> ListChange<E> {
    /// The change as elemental edits, each indexed against the list produced
    /// by the edits before it.
    #[must_use]
    pub fn sequential_edits(&self) -> Vec<ListEdit<E>> {
        match &self.body {
            ChangeBody::Permutation(perm) => vec![ListEdit::Permute(perm.clone())],
            ChangeBody::Spans(spans) => {
                let mut shift: isize = 0;
                spans
                    .iter()
                    .map(|span| {
                        let from = (span.from as isize + shift) as usize;
                        shift += span.delta();
                        ListEdit::Splice(ChangeSpan::new(
                            from,
                            span.removed.clone(),
                            span.added.clone(),
                        ))
                    })
                    .collect()
            }
        }
    }

    /// Apply to the pre-change snapshot.
    pub fn apply(&self, list: &mut Vec<E>) -> Result<()> {
        match &self.body {
            ChangeBody::Permutation(perm) => perm.to_span().apply_to(list),
            ChangeBody::Spans(spans) => {
                if let Some(last) = spans.last()
                    && last.removed_end() > list.len()
                {
                    return Err(QuiesceError::out_of_bounds(
                        last.from,
                        last.removed.len(),
                        list.len(),
                    ));
                }
                for span in spans.iter().rev() {
                    span.apply_to(list)?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
