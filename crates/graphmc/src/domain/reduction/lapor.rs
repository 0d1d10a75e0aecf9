//! Lock-aware partial-order reduction
//!
//! With the reduction on, lock events are not memory accesses. Critical
//! sections on one lock are ordered only when something forces it: an hb or
//! eco edge from an event of one section to an event of the other. The
//! derived release→acquire edges are fed back into happens-before until a
//! fixpoint is reached; contradicting orders make the graph inconsistent.
//!
//! Complete executions are additionally searched for lock-order inversions:
//! nested acquisitions on unordered critical sections that form a cycle
//! across threads.

use crate::domain::event::{Address, EventId, EventLabel, ThreadId};
use crate::domain::graph::{Event, ExecutionGraph};
use crate::domain::oracle::weak::eco_edges;
use crate::domain::oracle::{HappensBefore, Inconsistency, Synchronization};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// One critical section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticalSection {
    /// Lock word
    pub lock: Address,
    /// Opening acquisition
    pub acquire: EventId,
    /// Closing release, if it happened yet
    pub release: Option<EventId>,
}

impl CriticalSection {
    /// Events of the section, acquisition and release included
    pub fn members<'g>(&self, graph: &'g ExecutionGraph) -> &'g [Event] {
        let events = graph.thread_events(self.acquire.thread);
        let end = self.release.map_or(events.len(), |r| r.index + 1);
        &events[self.acquire.index..end.min(events.len())]
    }

    /// Whether `id` lies inside the section
    pub fn contains(&self, id: EventId) -> bool {
        id.thread == self.acquire.thread
            && id.index >= self.acquire.index
            && self.release.map_or(true, |r| id.index <= r.index)
    }

    fn precedes(&self, other: &Self, hb: &HappensBefore) -> bool {
        self.release.map_or(false, |r| r == other.acquire || hb.before(r, other.acquire))
    }
}

/// Critical sections of every thread in program order
pub fn critical_sections(graph: &ExecutionGraph) -> Vec<CriticalSection> {
    let mut sections = Vec::new();
    for t in graph.threads() {
        let mut open: HashMap<Address, EventId> = HashMap::new();
        for e in graph.thread_events(t) {
            match e.label {
                EventLabel::LockAcquire { addr } => {
                    open.entry(addr).or_insert(e.id);
                }
                EventLabel::LockRelease { addr } => {
                    if let Some(acquire) = open.remove(&addr) {
                        sections.push(CriticalSection { lock: addr, acquire, release: Some(e.id) });
                    }
                }
                _ => {}
            }
        }
        let mut still_open: Vec<CriticalSection> = open
            .into_iter()
            .map(|(lock, acquire)| CriticalSection { lock, acquire, release: None })
            .collect();
        still_open.sort_by_key(|cs| cs.acquire);
        sections.extend(still_open);
    }
    sections
}

fn depends(
    graph: &ExecutionGraph,
    hb: &HappensBefore,
    eco: &HashSet<(EventId, EventId)>,
    from: &CriticalSection,
    to: &CriticalSection,
) -> bool {
    let targets = to.members(graph);
    from.members(graph).iter().any(|e| {
        targets
            .iter()
            .any(|f| hb.before(e.id, f.id) || eco.contains(&(e.id, f.id)))
    })
}

/// Release→acquire edges forced between critical sections
pub fn lock_edges(graph: &ExecutionGraph, sync: Synchronization) -> Result<Vec<(EventId, EventId)>, Inconsistency> {
    let sections = critical_sections(graph);
    let mut edges = Vec::new();
    if sections.len() < 2 {
        return Ok(edges);
    }
    let eco: HashSet<(EventId, EventId)> = eco_edges(graph).into_iter().collect();
    let mut ordered: HashSet<(usize, usize)> = HashSet::new();

    loop {
        let hb = HappensBefore::compute(graph, sync, &edges)?;
        let mut changed = false;
        for (i, a) in sections.iter().enumerate() {
            for (j, b) in sections.iter().enumerate() {
                if i == j || a.lock != b.lock || a.acquire.thread == b.acquire.thread || ordered.contains(&(i, j)) {
                    continue;
                }
                if !depends(graph, &hb, &eco, a, b) {
                    continue;
                }
                if ordered.contains(&(j, i)) {
                    return Err(Inconsistency::LockOrder(a.lock));
                }
                // An open section will release after its newest event, so
                // that event already has to precede the other acquisition.
                let Some(from) = a.release.or_else(|| a.members(graph).last().map(|e| e.id)) else {
                    continue;
                };
                trace!(%from, to = %b.acquire, "critical section order");
                ordered.insert((i, j));
                edges.push((from, b.acquire));
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for (i, a) in sections.iter().enumerate() {
        for b in &sections[i + 1..] {
            let both_held = a.release.is_none() && b.release.is_none();
            if a.lock == b.lock
                && both_held
                && graph.is_finished(a.acquire.thread)
                && graph.is_finished(b.acquire.thread)
            {
                return Err(Inconsistency::LockOrder(a.lock));
            }
        }
    }
    Ok(edges)
}

/// A nested acquisition: `inner` taken while `outer` is held
#[derive(Debug, Clone, Copy)]
struct Nesting {
    thread: ThreadId,
    outer: CriticalSection,
    inner_lock: Address,
}

struct InversionSearch<'a> {
    nestings: Vec<Nesting>,
    hb: &'a HappensBefore,
}

impl InversionSearch<'_> {
    fn compatible(&self, path: &[usize], next: usize) -> bool {
        let candidate = &self.nestings[next];
        path.iter().all(|&i| {
            let n = &self.nestings[i];
            n.thread != candidate.thread
                && !n.outer.precedes(&candidate.outer, self.hb)
                && !candidate.outer.precedes(&n.outer, self.hb)
        })
    }

    fn find_cycles(&self) -> Option<Vec<ThreadId>> {
        for start in 0..self.nestings.len() {
            let mut visited = vec![false; self.nestings.len()];
            let mut path = Vec::new();
            if self.dfs_cycle(start, start, &mut visited, &mut path, true) {
                return Some(path.iter().map(|&i| self.nestings[i].thread).collect());
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        current: usize,
        target: usize,
        visited: &mut [bool],
        path: &mut Vec<usize>,
        is_start: bool,
    ) -> bool {
        if !is_start && current == target {
            return true;
        }
        if visited[current] || !self.compatible(path, current) {
            return false;
        }
        visited[current] = true;
        path.push(current);

        let wanted = self.nestings[current].inner_lock;
        for next in 0..self.nestings.len() {
            if self.nestings[next].outer.lock == wanted
                && self.dfs_cycle(next, target, visited, path, false)
            {
                return true;
            }
        }

        path.pop();
        false
    }
}

/// Threads forming a lock-order inversion in a complete graph
pub fn lock_inversion(graph: &ExecutionGraph, hb: &HappensBefore) -> Option<Vec<ThreadId>> {
    let sections = critical_sections(graph);
    let mut nestings = Vec::new();
    for outer in &sections {
        for inner in &sections {
            if inner.lock != outer.lock
                && inner.acquire.thread == outer.acquire.thread
                && inner.acquire != outer.acquire
                && outer.contains(inner.acquire)
            {
                nestings.push(Nesting {
                    thread: outer.acquire.thread,
                    outer: *outer,
                    inner_lock: inner.lock,
                });
            }
        }
    }
    if nestings.len() < 2 {
        return None;
    }
    InversionSearch { nestings, hb }.find_cycles()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::MemoryLayout;
    use std::rc::Rc;

    const A: Address = Address(0x100);
    const B: Address = Address(0x101);

    fn locked(g: &mut ExecutionGraph, t: ThreadId, first: Address, second: Address) {
        g.append(t, EventLabel::LockAcquire { addr: first });
        g.append(t, EventLabel::LockAcquire { addr: second });
        g.append(t, EventLabel::LockRelease { addr: second });
        g.append(t, EventLabel::LockRelease { addr: first });
        g.append(t, EventLabel::ThreadFinish);
    }

    #[test]
    fn test_sections_are_paired() {
        let mut g = ExecutionGraph::new(Rc::new(MemoryLayout::default()), true);
        let t = g.add_thread(0, 0, None, None);
        locked(&mut g, t, A, B);
        let sections = critical_sections(&g);
        assert_eq!(sections.len(), 2);
        assert!(sections.iter().all(|cs| cs.release.is_some()));
        let outer = sections.iter().find(|cs| cs.lock == A).unwrap();
        assert_eq!(outer.members(&g).len(), 4);
    }

    #[test]
    fn test_independent_sections_stay_unordered() {
        let mut g = ExecutionGraph::new(Rc::new(MemoryLayout::default()), true);
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        for t in [t0, t1] {
            g.append(t, EventLabel::LockAcquire { addr: A });
            g.append(t, EventLabel::LockRelease { addr: A });
        }
        let edges = lock_edges(&g, Synchronization::ReleaseAcquire).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn test_open_section_orders_dependent_acquisition() {
        use crate::domain::event::{Location, MemoryOrder};
        use crate::domain::graph::{Global, WriteRef};
        use crate::domain::oracle::race::find_race;

        const X: Address = Address(0x200);
        let layout = MemoryLayout::new([Global { addr: X, size: 8, init: 0, persistent: false }]);
        let mut g = ExecutionGraph::new(Rc::new(layout), true);
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let loc = Location::new(X, 8);

        g.append(t0, EventLabel::LockAcquire { addr: A });
        let w = g.append(t0, EventLabel::Write { loc, value: 1, order: MemoryOrder::Plain });
        g.set_written(w, Some(1));
        g.place_after(w, WriteRef::Init, g.event(w).stamp);
        let acquire = g.append(t1, EventLabel::LockAcquire { addr: A });
        let r = g.append(t1, EventLabel::Read { loc, order: MemoryOrder::Plain });
        g.set_read(r, WriteRef::Event(w));

        let edges = lock_edges(&g, Synchronization::ReleaseAcquire).unwrap();
        assert_eq!(edges, vec![(w, acquire)]);
        let hb = HappensBefore::compute(&g, Synchronization::ReleaseAcquire, &edges).unwrap();
        assert!(hb.before(w, r));
        assert!(find_race(&g, &hb).is_none());
    }

    #[test]
    fn test_abba_inversion_found() {
        let mut g = ExecutionGraph::new(Rc::new(MemoryLayout::default()), true);
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        locked(&mut g, t0, A, B);
        locked(&mut g, t1, B, A);
        let hb = HappensBefore::compute(&g, Synchronization::ReleaseAcquire, &[]).unwrap();
        let threads = lock_inversion(&g, &hb).unwrap();
        assert_eq!(threads.len(), 2);
    }

    #[test]
    fn test_consistent_nesting_is_not_inversion() {
        let mut g = ExecutionGraph::new(Rc::new(MemoryLayout::default()), true);
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        locked(&mut g, t0, A, B);
        locked(&mut g, t1, A, B);
        let hb = HappensBefore::compute(&g, Synchronization::ReleaseAcquire, &[]).unwrap();
        assert!(lock_inversion(&g, &hb).is_none());
    }
}
