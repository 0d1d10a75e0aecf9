//! Symmetry reduction
//!
//! A thread spawned as a mirror of a sibling runs the same code on the same
//! argument. While its history mirrors the sibling's (same labels, same
//! reads-from), anything it does the sibling has already done at the same
//! position, and exploring both orders is redundant.

use crate::domain::event::{EventId, ThreadId};
use crate::domain::graph::{ExecutionGraph, WriteRef};

/// Whether events `1..upto` of `thread` mirror those of its symmetric
/// sibling, and the sibling has already reached position `upto`.
pub fn is_prefix_symmetric(graph: &ExecutionGraph, thread: ThreadId, upto: usize) -> bool {
    let Some(sibling) = graph.symmetric_to(thread) else {
        return false;
    };
    if sibling == thread || !graph.has_thread(sibling) {
        return false;
    }
    let mine = graph.thread_events(thread);
    let theirs = graph.thread_events(sibling);
    if mine.len() <= upto || theirs.len() <= upto {
        return false;
    }
    mine[1..upto]
        .iter()
        .zip(&theirs[1..upto])
        .all(|(a, b)| a.label.mirrors(&b.label) && a.rf == b.rf)
        && mine[upto].label.mirrors(&theirs[upto].label)
}

/// The sibling's counterpart of `id`, when the prefixes mirror
pub fn mirrored_event(graph: &ExecutionGraph, id: EventId) -> Option<EventId> {
    let sibling = graph.symmetric_to(id.thread)?;
    is_prefix_symmetric(graph, id.thread, id.index).then(|| EventId::new(sibling, id.index))
}

/// Writes of a thread still mirroring its sibling do not revisit: the
/// sibling's identical write already did.
pub fn skip_backward_revisits(graph: &ExecutionGraph, write: EventId) -> bool {
    mirrored_event(graph, write).is_some()
}

/// Drop candidates whose mirrored counterpart is an equally valid, earlier
/// candidate. `fully_valid` decides validity of the counterpart including
/// any write part.
pub fn filter_candidates(
    graph: &ExecutionGraph,
    candidates: &mut Vec<WriteRef>,
    mut fully_valid: impl FnMut(WriteRef) -> bool,
) {
    let snapshot = candidates.clone();
    candidates.retain(|c| {
        let WriteRef::Event(w) = *c else {
            return true;
        };
        let Some(twin) = mirrored_event(graph, w) else {
            return true;
        };
        let earlier = graph
            .get(twin)
            .zip(graph.get(w))
            .map_or(false, |(t, e)| t.stamp < e.stamp);
        let twin = WriteRef::Event(twin);
        !(earlier && snapshot.contains(&twin) && fully_valid(twin))
    });
}
