//! Happens-before
//!
//! hb = (po ∪ create ∪ join ∪ sw ∪ lock)⁺ where sw links the message of a
//! write to the acquire read (or later acquire fence) that observes it.
//!
//! The message of a write is the view it publishes:
//! - a release write publishes its own view;
//! - a non-release write publishes the view of the latest release fence
//!   before it in program order;
//! - an RMW additionally forwards the message of the write it read from,
//!   which is how release sequences extend through RMW chains.

use super::Inconsistency;
use crate::domain::event::{EventId, EventLabel, ThreadId};
use crate::domain::graph::{Event, ExecutionGraph, VectorClock, Views, WriteRef};
use std::collections::{HashMap, HashSet};

/// Which accesses synchronise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synchronization {
    /// Every atomic access and fence synchronises (SC, TSO)
    AllAtomics,
    /// Only release/acquire tagged accesses and fences synchronise
    ReleaseAcquire,
}

/// Happens-before views of every event
#[derive(Debug, Clone, Default)]
pub struct HappensBefore {
    views: Views,
}

impl HappensBefore {
    /// Compute hb for `graph`, with `lock_edges` as extra release→acquire
    /// synchronisation.
    pub fn compute(
        graph: &ExecutionGraph,
        sync: Synchronization,
        lock_edges: &[(EventId, EventId)],
    ) -> Result<Self, Inconsistency> {
        let mut lock_in: HashMap<EventId, Vec<EventId>> = HashMap::new();
        for (release, acquire) in lock_edges {
            lock_in.entry(*acquire).or_default().push(*release);
        }
        let mut builder = Builder {
            graph,
            sync,
            lock_in,
            views: (0..graph.thread_slots())
                .map(|t| vec![None; graph.thread_len(ThreadId(t))])
                .collect(),
            active: HashSet::new(),
        };
        for e in graph.events() {
            builder.visit(e.id)?;
        }
        Ok(Self {
            views: Views::from_parts(
                builder
                    .views
                    .into_iter()
                    .map(|t| t.into_iter().map(Option::unwrap_or_default).collect())
                    .collect(),
            ),
        })
    }

    /// `a` happens before `b`
    #[inline]
    pub fn before(&self, a: EventId, b: EventId) -> bool {
        self.views.before(a, b)
    }

    /// Either order holds
    #[inline]
    pub fn ordered(&self, a: EventId, b: EventId) -> bool {
        self.before(a, b) || self.before(b, a)
    }

    /// View of `id`
    pub fn view(&self, id: EventId) -> Option<&VectorClock> {
        self.views.get(id)
    }
}

struct Builder<'g> {
    graph: &'g ExecutionGraph,
    sync: Synchronization,
    lock_in: HashMap<EventId, Vec<EventId>>,
    views: Vec<Vec<Option<VectorClock>>>,
    active: HashSet<EventId>,
}

impl Builder<'_> {
    fn done(&self, id: EventId) -> Option<&VectorClock> {
        self.views.get(id.thread.as_usize())?.get(id.index)?.as_ref()
    }

    fn acquires(&self, e: &Event) -> bool {
        self.graph.is_read(e)
            && e.label.order().map_or(false, |o| match self.sync {
                Synchronization::AllAtomics => o.is_atomic(),
                Synchronization::ReleaseAcquire => o.is_acquire(),
            })
    }

    fn releases(&self, e: &Event) -> bool {
        e.label.order().map_or(false, |o| match self.sync {
            Synchronization::AllAtomics => o.is_atomic(),
            Synchronization::ReleaseAcquire => o.is_release(),
        })
    }

    fn fence(&self, e: &Event, acquire: bool) -> bool {
        match (&e.label, self.sync) {
            (EventLabel::Fence(kind), Synchronization::ReleaseAcquire) => {
                if acquire {
                    kind.is_acquire()
                } else {
                    kind.is_release()
                }
            }
            (EventLabel::Fence(kind), Synchronization::AllAtomics) => kind.is_acquire() || kind.is_release(),
            _ => false,
        }
    }

    fn visit(&mut self, id: EventId) -> Result<(), Inconsistency> {
        if self.done(id).is_some() {
            return Ok(());
        }
        if !self.active.insert(id) {
            return Err(Inconsistency::HbCycle);
        }
        let graph = self.graph;
        let e = graph.event(id);
        let mut view = VectorClock::new(graph.thread_slots());

        for p in graph.structural_preds(e) {
            if graph.contains(p) {
                self.visit(p)?;
                if let Some(pv) = self.done(p) {
                    view.merge(pv);
                }
            }
        }
        if self.acquires(e) {
            if let Some(WriteRef::Event(w)) = e.rf {
                let msg = self.message(w, 0)?;
                view.merge(&msg);
            }
        }
        if self.fence(e, true) {
            for prior in &graph.thread_events(id.thread)[..id.index] {
                if graph.is_read(prior) {
                    if let Some(WriteRef::Event(w)) = prior.rf {
                        let msg = self.message(w, 0)?;
                        view.merge(&msg);
                    }
                }
            }
        }
        if let Some(releases) = self.lock_in.get(&id).cloned() {
            for release in releases {
                self.visit(release)?;
                if let Some(rv) = self.done(release) {
                    view.merge(rv);
                }
            }
        }

        view.include(id);
        self.active.remove(&id);
        self.views[id.thread.as_usize()][id.index] = Some(view);
        Ok(())
    }

    fn message(&mut self, w: EventId, depth: usize) -> Result<VectorClock, Inconsistency> {
        if depth > self.graph.len() {
            return Err(Inconsistency::HbCycle);
        }
        self.visit(w)?;
        let graph = self.graph;
        let e = graph.event(w);
        let mut msg = if self.releases(e) {
            self.done(w).cloned().unwrap_or_default()
        } else {
            graph.thread_events(w.thread)[..w.index]
                .iter()
                .rev()
                .find(|f| self.fence(f, false))
                .and_then(|f| self.done(f.id).cloned())
                .unwrap_or_default()
        };
        if graph.is_read(e) {
            if let Some(WriteRef::Event(source)) = e.rf {
                let forwarded = self.message(source, depth + 1)?;
                msg.merge(&forwarded);
            }
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{Address, Location, MemoryOrder, ThreadId, Value};
    use crate::domain::graph::{Global, MemoryLayout};
    use std::rc::Rc;

    const X: Address = Address(0x10);
    const Y: Address = Address(0x18);

    fn graph() -> ExecutionGraph {
        let layout = MemoryLayout::new([
            Global { addr: X, size: 8, init: 0, persistent: false },
            Global { addr: Y, size: 8, init: 0, persistent: false },
        ]);
        ExecutionGraph::new(Rc::new(layout), false)
    }

    fn store(g: &mut ExecutionGraph, t: ThreadId, addr: Address, value: Value, order: MemoryOrder) -> EventId {
        let id = g.append(t, EventLabel::Write { loc: Location::new(addr, 8), value, order });
        g.set_written(id, Some(value));
        g.place_after(id, g.co_max(addr), g.event(id).stamp);
        id
    }

    fn load(g: &mut ExecutionGraph, t: ThreadId, addr: Address, from: WriteRef, order: MemoryOrder) -> EventId {
        let id = g.append(t, EventLabel::Read { loc: Location::new(addr, 8), order });
        g.set_read(id, from);
        id
    }

    #[test]
    fn test_release_acquire_synchronises() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let wx = store(&mut g, t0, X, 1, MemoryOrder::Plain);
        let wy = store(&mut g, t0, Y, 1, MemoryOrder::Release);
        let ry = load(&mut g, t1, Y, WriteRef::Event(wy), MemoryOrder::Acquire);
        let rx = load(&mut g, t1, X, WriteRef::Init, MemoryOrder::Plain);

        let hb = HappensBefore::compute(&g, Synchronization::ReleaseAcquire, &[]).unwrap();
        assert!(hb.before(wx, ry));
        assert!(hb.before(wx, rx));
        assert!(!hb.before(rx, wx));
    }

    #[test]
    fn test_relaxed_does_not_synchronise() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let wx = store(&mut g, t0, X, 1, MemoryOrder::Plain);
        let wy = store(&mut g, t0, Y, 1, MemoryOrder::Relaxed);
        let ry = load(&mut g, t1, Y, WriteRef::Event(wy), MemoryOrder::Relaxed);

        let hb = HappensBefore::compute(&g, Synchronization::ReleaseAcquire, &[]).unwrap();
        assert!(!hb.before(wx, ry));

        let hb = HappensBefore::compute(&g, Synchronization::AllAtomics, &[]).unwrap();
        assert!(hb.before(wx, ry));
    }

    #[test]
    fn test_fences_synchronise() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let wx = store(&mut g, t0, X, 1, MemoryOrder::Plain);
        g.append(t0, EventLabel::Fence(crate::domain::event::FenceKind::Memory(MemoryOrder::Release)));
        let wy = store(&mut g, t0, Y, 1, MemoryOrder::Relaxed);
        load(&mut g, t1, Y, WriteRef::Event(wy), MemoryOrder::Relaxed);
        let fence = g.append(t1, EventLabel::Fence(crate::domain::event::FenceKind::Memory(MemoryOrder::Acquire)));

        let hb = HappensBefore::compute(&g, Synchronization::ReleaseAcquire, &[]).unwrap();
        assert!(hb.before(wx, fence));
    }

    #[test]
    fn test_lock_edges_order_sections() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let wx = store(&mut g, t0, X, 1, MemoryOrder::Plain);
        let rel = g.append(t0, EventLabel::ThreadFinish);
        let acq = g.append(t1, EventLabel::Fence(crate::domain::event::FenceKind::RcuReadLock));

        let hb = HappensBefore::compute(&g, Synchronization::ReleaseAcquire, &[(rel, acq)]).unwrap();
        assert!(hb.before(wx, acq));
    }
}
