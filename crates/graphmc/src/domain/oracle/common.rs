//! Axioms shared by every memory model.

use super::Inconsistency;
use crate::domain::event::{Annotation, EventId};
use crate::domain::graph::{ExecutionGraph, WriteRef};

/// A successful RMW sits immediately after its reads-from source.
pub fn check_atomicity(graph: &ExecutionGraph) -> Result<(), Inconsistency> {
    for e in graph.events() {
        if !(graph.is_read(e) && graph.is_write(e)) {
            continue;
        }
        let (Some(loc), Some(source)) = (e.label.location(), e.rf) else {
            continue;
        };
        let order = graph.coherence(loc.addr);
        let Some(i) = order.iter().position(|w| *w == e.id) else {
            continue;
        };
        let predecessor = if i == 0 { WriteRef::Init } else { WriteRef::Event(order[i - 1]) };
        if predecessor != source {
            return Err(Inconsistency::Atomicity(e.id));
        }
    }
    Ok(())
}

/// A write marked `FinalWrite` stays coherence-maximal.
pub fn check_final_writes(graph: &ExecutionGraph) -> Result<(), Inconsistency> {
    for e in graph.events() {
        if graph.preceding_annotation(e.id) != Some(&Annotation::FinalWrite) || !graph.is_write(e) {
            continue;
        }
        if let Some(loc) = e.label.location() {
            let order = graph.coherence(loc.addr);
            if order.contains(&e.id) && order.last() != Some(&e.id) {
                return Err(Inconsistency::FinalWrite(e.id));
            }
        }
    }
    Ok(())
}

/// Key and role of a helped/helping RMW
fn helping_role(graph: &ExecutionGraph, id: EventId) -> Option<(u32, bool)> {
    match graph.preceding_annotation(id)? {
        Annotation::HelpedCas(key) => Some((*key, false)),
        Annotation::HelpingCas(key) => Some((*key, true)),
        _ => None,
    }
}

/// The successful complementary RMW that `id` may merge into.
pub fn helped_partner(graph: &ExecutionGraph, id: EventId) -> Option<EventId> {
    let (key, helping) = helping_role(graph, id)?;
    graph
        .events()
        .filter(|e| e.id.thread != id.thread && e.label.rmw_op().is_some() && graph.is_write(e))
        .find(|e| helping_role(graph, e.id) == Some((key, !helping)))
        .map(|e| e.id)
}

/// A merged RMW still reads the same write as its successful partner.
pub fn check_helped(graph: &ExecutionGraph) -> Result<(), Inconsistency> {
    for e in graph.events() {
        let Some(partner) = e.merged_with else {
            continue;
        };
        let intact = graph
            .get(partner)
            .map_or(false, |p| graph.is_write(p) && p.rf == e.rf);
        if !intact {
            return Err(Inconsistency::HelpedCas(e.id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{Address, EventLabel, Location, MemoryOrder, RmwOp, ThreadId, Value};
    use crate::domain::graph::{Global, MemoryLayout};
    use std::rc::Rc;

    const X: Address = Address(0x10);

    fn graph() -> ExecutionGraph {
        let layout = MemoryLayout::new([Global { addr: X, size: 8, init: 0, persistent: false }]);
        ExecutionGraph::new(Rc::new(layout), false)
    }

    fn store(g: &mut ExecutionGraph, t: ThreadId, value: Value, after: WriteRef) -> EventId {
        let id = g.append(t, EventLabel::Write { loc: Location::new(X, 8), value, order: MemoryOrder::Relaxed });
        g.set_written(id, Some(value));
        g.place_after(id, after, g.event(id).stamp);
        id
    }

    fn cas(g: &mut ExecutionGraph, t: ThreadId, source: WriteRef, after: WriteRef) -> EventId {
        let op = RmwOp::CompareExchange { expected: 0, new: 1 };
        let id = g.append(t, EventLabel::ReadModifyWrite { loc: Location::new(X, 8), op, order: MemoryOrder::SeqCst });
        g.set_read(id, source);
        g.set_written(id, Some(1));
        g.place_after(id, after, g.event(id).stamp);
        id
    }

    #[test]
    fn test_rmw_must_follow_its_source() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let rmw = cas(&mut g, t0, WriteRef::Init, WriteRef::Init);
        store(&mut g, t1, 2, WriteRef::Event(rmw));
        assert_eq!(check_atomicity(&g), Ok(()));

        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let w = store(&mut g, t1, 2, WriteRef::Init);
        let rmw = cas(&mut g, t0, WriteRef::Init, WriteRef::Event(w));
        assert_eq!(check_atomicity(&g), Err(Inconsistency::Atomicity(rmw)));
    }

    #[test]
    fn test_final_write_stays_last() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        g.append(t0, EventLabel::Annotation(Annotation::FinalWrite));
        let last = store(&mut g, t0, 1, WriteRef::Init);
        store(&mut g, t1, 2, WriteRef::Init);
        assert_eq!(g.coherence(X).last(), Some(&last));
        assert_eq!(check_final_writes(&g), Ok(()));

        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        g.append(t0, EventLabel::Annotation(Annotation::FinalWrite));
        let pinned = store(&mut g, t0, 1, WriteRef::Init);
        store(&mut g, t1, 2, WriteRef::Event(pinned));
        assert_eq!(check_final_writes(&g), Err(Inconsistency::FinalWrite(pinned)));
    }

    #[test]
    fn test_helped_cas_pairs_and_merges() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        g.append(t0, EventLabel::Annotation(Annotation::HelpedCas(7)));
        let helped = cas(&mut g, t0, WriteRef::Init, WriteRef::Init);
        g.append(t1, EventLabel::Annotation(Annotation::HelpingCas(7)));
        let helping = g.append(
            t1,
            EventLabel::ReadModifyWrite {
                loc: Location::new(X, 8),
                op: RmwOp::CompareExchange { expected: 0, new: 1 },
                order: MemoryOrder::SeqCst,
            },
        );
        g.set_read(helping, WriteRef::Init);

        assert_eq!(helped_partner(&g, helping), Some(helped));
        assert_eq!(helped_partner(&g, helped), None);

        g.set_merged(helping, Some(helped));
        assert_eq!(check_helped(&g), Ok(()));

        let w = store(&mut g, t1, 5, WriteRef::Event(helped));
        g.set_read(helping, WriteRef::Event(w));
        assert_eq!(check_helped(&g), Err(Inconsistency::HelpedCas(helping)));
    }
}
