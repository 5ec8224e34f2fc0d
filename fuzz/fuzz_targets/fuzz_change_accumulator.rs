#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quiesce_core::{ChangeAccumulator, ChangeSpan, ListEdit, MergePolicy, Permutation};

#[derive(Arbitrary, Debug)]
enum FuzzEdit {
    Insert { at: u8, items: Vec<u8> },
    Remove { at: u8, count: u8 },
    Replace { at: u8, count: u8, items: Vec<u8> },
    Rotate { at: u8, count: u8, by: u8 },
    /// Raw edit that may be out of bounds; must be rejected, never panic.
    Raw { at: u16, removed: u8 },
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    initial: Vec<u8>,
    edits: Vec<FuzzEdit>,
    single_span: bool,
}

/// Apply `edit` to `list` and return the matching elemental edit, or `None`
/// for edits that are expected to be rejected.
fn perform(list: &mut Vec<u8>, edit: &FuzzEdit) -> Option<ListEdit<u8>> {
    let len = list.len();
    let clamp = |at: u8| usize::from(at) % (len + 1);
    match edit {
        FuzzEdit::Insert { at, items } => {
            let at = clamp(*at);
            let items: Vec<u8> = items.iter().take(8).copied().collect();
            list.splice(at..at, items.iter().copied());
            Some(ChangeSpan::insertion(at, items).into())
        }
        FuzzEdit::Remove { at, count } => {
            let at = clamp(*at);
            let n = usize::from(*count).min(len - at);
            let removed: Vec<u8> = list.drain(at..at + n).collect();
            Some(ChangeSpan::removal(at, removed).into())
        }
        FuzzEdit::Replace { at, count, items } => {
            let at = clamp(*at);
            let n = usize::from(*count).min(len - at);
            let items: Vec<u8> = items.iter().take(8).copied().collect();
            let removed: Vec<u8> = list.splice(at..at + n, items.iter().copied()).collect();
            Some(ChangeSpan::new(at, removed, items).into())
        }
        FuzzEdit::Rotate { at, count, by } => {
            let at = clamp(*at);
            let n = usize::from(*count).min(len - at);
            if n == 0 {
                return None;
            }
            let shift = usize::from(*by) % n;
            let before = list[at..at + n].to_vec();
            list[at..at + n].rotate_right(shift);
            let mapping = (0..n).map(|i| (i + shift) % n).collect();
            Permutation::new(at, mapping, before).ok().map(ListEdit::from)
        }
        FuzzEdit::Raw { .. } => None,
    }
}

fuzz_target!(|input: FuzzInput| {
    if input.initial.len() > 256 || input.edits.len() > 64 {
        return;
    }
    let snapshot = input.initial.clone();
    let mut list = input.initial;
    let mut acc = ChangeAccumulator::new(list.len());

    for edit in &input.edits {
        if let FuzzEdit::Raw { at, removed } = edit {
            let span = ChangeSpan::removal(usize::from(*at), vec![0; usize::from(*removed)]);
            if span.removed_end() > list.len() {
                assert!(acc.record(span.into()).is_err());
            }
            continue;
        }
        if let Some(recorded) = perform(&mut list, edit) {
            acc.record(recorded).expect("live edits are in bounds");
        }
    }

    let policy = if input.single_span {
        MergePolicy::SingleSpan
    } else {
        MergePolicy::Faithful
    };
    let Some(change) = acc.take() else {
        assert_eq!(snapshot, list);
        return;
    };
    let change = match policy {
        MergePolicy::SingleSpan => change.widened(&list).expect("widen against final list"),
        MergePolicy::Faithful => change,
    };
    let mut replay = snapshot;
    change.apply(&mut replay).expect("merged change fits snapshot");
    assert_eq!(replay, list);
});
