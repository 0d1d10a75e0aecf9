//! Execution graph with program order, reads-from and coherence.
//!
//! # Invariants
//!
//! - every thread's events form a contiguous program-order prefix starting
//!   with `ThreadStart`;
//! - every committed read has exactly one reads-from source, a write to the
//!   same address or `Init`;
//! - coherence lists contain each placed write exactly once;
//! - stamps are unique and grow with insertion.

use super::layout::MemoryLayout;
use super::undo::{UndoEntry, UndoLog};
use super::vector_clock::VectorClock;
use crate::domain::event::{
    Address, Annotation, EventId, EventLabel, Location, Stamp, ThreadId, Value,
};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Source of a read: the initial value or a write event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteRef {
    /// The location's initial value
    Init,
    /// A write event
    Event(EventId),
}

impl WriteRef {
    /// The write event, unless `Init`
    pub const fn event(self) -> Option<EventId> {
        match self {
            Self::Init => None,
            Self::Event(id) => Some(id),
        }
    }
}

impl fmt::Display for WriteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Event(id) => write!(f, "{id}"),
        }
    }
}

/// A committed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Position
    pub id: EventId,
    /// Kind and operands
    pub label: EventLabel,
    /// Insertion order
    pub stamp: Stamp,
    /// Reads-from source of read-like events
    pub rf: Option<WriteRef>,
    /// Value returned to the source
    pub value: Value,
    /// Value written by write-like events; `None` for failed RMWs
    pub written: Option<Value>,
    /// Partner whose atomic step absorbed this helped RMW
    pub merged_with: Option<EventId>,
    /// May still be re-targeted by a backward revisit
    pub revisitable: bool,
}

impl Event {
    fn new(id: EventId, label: EventLabel, stamp: Stamp) -> Self {
        Self {
            id,
            label,
            stamp,
            rf: None,
            value: 0,
            written: None,
            merged_with: None,
            revisitable: true,
        }
    }
}

#[derive(Debug, Clone)]
struct ThreadSlot {
    entry: usize,
    arg: Value,
    symmetric_to: Option<ThreadId>,
    events: Vec<Event>,
}

/// One vector clock per event
#[derive(Debug, Clone, Default)]
pub struct Views {
    views: Vec<Vec<VectorClock>>,
}

impl Views {
    /// Build from per-thread view lists
    pub(crate) fn from_parts(views: Vec<Vec<VectorClock>>) -> Self {
        Self { views }
    }

    /// View of `id`
    pub fn get(&self, id: EventId) -> Option<&VectorClock> {
        self.views.get(id.thread.as_usize())?.get(id.index)
    }

    /// Whether `a` is strictly before `b`
    pub fn before(&self, a: EventId, b: EventId) -> bool {
        a != b && self.get(b).map_or(false, |view| view.contains(a))
    }
}

/// Execution graph
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    layout: Rc<MemoryLayout>,
    lock_aware: bool,
    threads: Vec<Option<ThreadSlot>>,
    coherence: BTreeMap<Address, Vec<EventId>>,
    log: UndoLog,
    next_stamp: Stamp,
    porf: OnceCell<Option<Views>>,
}

impl ExecutionGraph {
    /// Empty graph over `layout`.
    ///
    /// With `lock_aware` set, lock events take no part in reads-from and
    /// coherence.
    pub fn new(layout: Rc<MemoryLayout>, lock_aware: bool) -> Self {
        Self {
            layout,
            lock_aware,
            threads: Vec::new(),
            coherence: BTreeMap::new(),
            log: UndoLog::default(),
            next_stamp: 0,
            porf: OnceCell::new(),
        }
    }

    /// Declared globals
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Shared handle to the layout
    pub fn layout_handle(&self) -> Rc<MemoryLayout> {
        Rc::clone(&self.layout)
    }

    /// Whether lock events are kept out of reads-from and coherence
    pub const fn is_lock_aware(&self) -> bool {
        self.lock_aware
    }

    fn invalidate(&mut self) {
        self.porf.take();
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Threads and events
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Open the lowest free thread slot and append its `ThreadStart`.
    pub fn add_thread(
        &mut self,
        entry: usize,
        arg: Value,
        parent: Option<EventId>,
        symmetric_to: Option<ThreadId>,
    ) -> ThreadId {
        let slot = self
            .threads
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.threads.len());
        if slot == self.threads.len() {
            self.threads.push(None);
        }
        let thread = ThreadId(slot);
        let stamp = self.next_stamp;
        self.threads[slot] = Some(ThreadSlot {
            entry,
            arg,
            symmetric_to,
            events: Vec::new(),
        });
        self.log.push(UndoEntry::Spawn { thread, stamp });
        self.append(thread, EventLabel::ThreadStart { parent });
        thread
    }

    /// Append an event to `thread` and give it the next stamp.
    ///
    /// # Panics
    ///
    /// Panics if the thread slot is empty.
    pub fn append(&mut self, thread: ThreadId, label: EventLabel) -> EventId {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        let slot = self.threads[thread.as_usize()]
            .as_mut()
            .unwrap_or_else(|| panic!("append to unknown thread {thread}"));
        let id = EventId::new(thread, slot.events.len());
        slot.events.push(Event::new(id, label, stamp));
        self.log.push(UndoEntry::Append { id, stamp });
        self.invalidate();
        id
    }

    /// Event at `id`, if present
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.threads.get(id.thread.as_usize())?.as_ref()?.events.get(id.index)
    }

    /// Event at `id`
    ///
    /// # Panics
    ///
    /// Panics if the event is not in the graph.
    pub fn event(&self, id: EventId) -> &Event {
        self.get(id).unwrap_or_else(|| panic!("no event {id}"))
    }

    fn event_mut(&mut self, id: EventId) -> &mut Event {
        self.threads[id.thread.as_usize()]
            .as_mut()
            .and_then(|slot| slot.events.get_mut(id.index))
            .unwrap_or_else(|| panic!("no event {id}"))
    }

    /// Whether `id` is in the graph
    pub fn contains(&self, id: EventId) -> bool {
        self.get(id).is_some()
    }

    /// Number of thread slots, free ones included
    pub fn thread_slots(&self) -> usize {
        self.threads.len()
    }

    /// Live threads in id order
    pub fn threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| ThreadId(i))
    }

    /// Whether the slot of `thread` is occupied
    pub fn has_thread(&self, thread: ThreadId) -> bool {
        matches!(self.threads.get(thread.as_usize()), Some(Some(_)))
    }

    /// Events of `thread` in program order
    pub fn thread_events(&self, thread: ThreadId) -> &[Event] {
        match self.threads.get(thread.as_usize()) {
            Some(Some(slot)) => &slot.events,
            _ => &[],
        }
    }

    /// Number of events in `thread`
    pub fn thread_len(&self, thread: ThreadId) -> usize {
        self.thread_events(thread).len()
    }

    /// Entry point and argument of `thread`
    pub fn thread_entry(&self, thread: ThreadId) -> Option<(usize, Value)> {
        match self.threads.get(thread.as_usize()) {
            Some(Some(slot)) => Some((slot.entry, slot.arg)),
            _ => None,
        }
    }

    /// Symmetric sibling declared at spawn time
    pub fn symmetric_to(&self, thread: ThreadId) -> Option<ThreadId> {
        match self.threads.get(thread.as_usize()) {
            Some(Some(slot)) => slot.symmetric_to,
            _ => None,
        }
    }

    /// Newest event of `thread`
    pub fn last_event(&self, thread: ThreadId) -> Option<&Event> {
        self.thread_events(thread).last()
    }

    /// The `ThreadFinish` of `thread`, if it finished
    pub fn finish_event(&self, thread: ThreadId) -> Option<EventId> {
        self.last_event(thread)
            .filter(|e| matches!(e.label, EventLabel::ThreadFinish))
            .map(|e| e.id)
    }

    /// Whether `thread` has finished
    pub fn is_finished(&self, thread: ThreadId) -> bool {
        self.finish_event(thread).is_some()
    }

    /// All events, thread by thread
    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.threads.iter().flatten().flat_map(|slot| slot.events.iter())
    }

    /// All events in insertion order
    pub fn events_by_stamp(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events().collect();
        events.sort_by_key(|e| e.stamp);
        events
    }

    /// Total number of events
    pub fn len(&self) -> usize {
        self.threads.iter().flatten().map(|slot| slot.events.len()).sum()
    }

    /// Whether the graph has no events
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stamp the next appended event will get
    pub const fn next_stamp(&self) -> Stamp {
        self.next_stamp
    }

    /// Values the source saw for events `1..upto` of `thread`
    pub fn returns(&self, thread: ThreadId, upto: usize) -> Vec<Value> {
        self.thread_events(thread)
            .iter()
            .take(upto)
            .skip(1)
            .filter(|e| !e.label.is_internal())
            .map(|e| e.value)
            .collect()
    }

    /// Values read by `thread`, in program order
    pub fn read_values(&self, thread: ThreadId) -> Vec<Value> {
        self.thread_events(thread)
            .iter()
            .filter(|e| matches!(e.label, EventLabel::Read { .. } | EventLabel::ReadModifyWrite { .. }))
            .map(|e| e.value)
            .collect()
    }

    /// The annotation immediately before `id` in program order
    pub fn preceding_annotation(&self, id: EventId) -> Option<&Annotation> {
        self.get(id.prev()?)?.label.annotation()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Memory classification
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Location of a memory access; `None` for lock events when lock-aware
    pub fn access_location(&self, e: &Event) -> Option<Location> {
        match e.label {
            EventLabel::LockAcquire { .. } | EventLabel::LockRelease { .. } if self.lock_aware => None,
            _ => e.label.location(),
        }
    }

    /// Read-like events: reads, RMWs and (unless lock-aware) lock acquisitions
    pub fn is_read(&self, e: &Event) -> bool {
        match e.label {
            EventLabel::Read { .. } | EventLabel::ReadModifyWrite { .. } => true,
            EventLabel::LockAcquire { .. } => !self.lock_aware,
            _ => false,
        }
    }

    /// Write-like events that actually store a value
    pub fn is_write(&self, e: &Event) -> bool {
        match e.label {
            EventLabel::Write { .. } => true,
            EventLabel::LockRelease { .. } => !self.lock_aware,
            EventLabel::ReadModifyWrite { .. } => e.written.is_some(),
            EventLabel::LockAcquire { .. } => !self.lock_aware && e.written.is_some(),
            _ => false,
        }
    }

    /// Value the store of a plain write-like event writes
    pub const fn store_value(label: &EventLabel) -> Option<Value> {
        match label {
            EventLabel::Write { value, .. } => Some(*value),
            EventLabel::LockRelease { .. } => Some(0),
            _ => None,
        }
    }

    /// Value carried by a reads-from source for `addr`
    pub fn value_of(&self, source: WriteRef, addr: Address) -> Value {
        match source {
            WriteRef::Init => self.layout.init_value(addr).unwrap_or(0),
            WriteRef::Event(w) => self.get(w).and_then(|e| e.written).unwrap_or(0),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Reads-from and values
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Make `id` read from `source` and record the value it returns
    pub fn set_read(&mut self, id: EventId, source: WriteRef) {
        let addr = self.event(id).label.location().map_or(Address(0), |l| l.addr);
        let value = self.value_of(source, addr);
        let event = self.event_mut(id);
        event.rf = Some(source);
        event.value = value;
        self.invalidate();
    }

    /// Forget the read part and any write part of `id`
    pub fn clear_read(&mut self, id: EventId) {
        let event = self.event_mut(id);
        event.rf = None;
        event.value = 0;
        event.written = None;
        event.merged_with = None;
        self.invalidate();
    }

    /// Record the value stored by `id`; `None` makes it read-only
    pub fn set_written(&mut self, id: EventId, written: Option<Value>) {
        self.event_mut(id).written = written;
        self.invalidate();
    }

    /// Record that `id` was absorbed into its partner's atomic step
    pub fn set_merged(&mut self, id: EventId, partner: Option<EventId>) {
        self.event_mut(id).merged_with = partner;
    }

    /// Record the value returned to the source
    pub fn set_value(&mut self, id: EventId, value: Value) {
        self.event_mut(id).value = value;
    }

    /// Exclude `id` from future backward revisits
    pub fn mark_non_revisitable(&mut self, id: EventId) {
        self.event_mut(id).revisitable = false;
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Coherence
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Placed writes to `addr` in coherence order (`Init` implicit first)
    pub fn coherence(&self, addr: Address) -> &[EventId] {
        self.coherence.get(&addr).map_or(&[], Vec::as_slice)
    }

    /// Every location with at least one placed write
    pub fn coherence_orders(&self) -> impl Iterator<Item = (Address, &[EventId])> + '_ {
        self.coherence.iter().map(|(a, ws)| (*a, ws.as_slice()))
    }

    /// Position of a write in coherence: `Init` is 0, placed writes follow
    pub fn co_position(&self, source: WriteRef, addr: Address) -> Option<usize> {
        match source {
            WriteRef::Init => Some(0),
            WriteRef::Event(w) => self.coherence(addr).iter().position(|x| *x == w).map(|i| i + 1),
        }
    }

    /// Whether `id` sits in a coherence order
    pub fn is_placed(&self, id: EventId) -> bool {
        self.get(id)
            .and_then(|e| e.label.location())
            .map_or(false, |loc| self.coherence(loc.addr).contains(&id))
    }

    /// Coherence-maximal write to `addr`
    pub fn co_max(&self, addr: Address) -> WriteRef {
        self.coherence(addr).last().map_or(WriteRef::Init, |w| WriteRef::Event(*w))
    }

    /// Final value of `addr` in this graph
    pub fn final_value(&self, addr: Address) -> Value {
        self.value_of(self.co_max(addr), addr)
    }

    /// Insert `id` immediately after `after` in the coherence order of its
    /// address, logging the inverse under `stamp`.
    pub fn place_after(&mut self, id: EventId, after: WriteRef, stamp: Stamp) {
        let Some(loc) = self.event(id).label.location() else {
            return;
        };
        let position = self.co_position(after, loc.addr).unwrap_or(0);
        self.coherence.entry(loc.addr).or_default().insert(position, id);
        self.log.push(UndoEntry::Place { addr: loc.addr, id, stamp });
        self.invalidate();
    }

    /// Take `id` out of coherence and drop the matching log entry
    pub fn unplace(&mut self, id: EventId) {
        if let Some(loc) = self.get(id).and_then(|e| e.label.location()) {
            self.remove_from_coherence(loc.addr, id);
            self.log.forget_placement(id);
            self.invalidate();
        }
    }

    fn remove_from_coherence(&mut self, addr: Address, id: EventId) {
        if let Some(order) = self.coherence.get_mut(&addr) {
            order.retain(|w| *w != id);
            if order.is_empty() {
                self.coherence.remove(&addr);
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Undo and restriction
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn undo(&mut self, entry: UndoEntry) {
        match entry {
            UndoEntry::Spawn { thread, .. } => {
                self.threads[thread.as_usize()] = None;
                while matches!(self.threads.last(), Some(None)) {
                    self.threads.pop();
                }
            }
            UndoEntry::Append { id, .. } => {
                if let Some(Some(slot)) = self.threads.get_mut(id.thread.as_usize()) {
                    let popped = slot.events.pop();
                    debug_assert_eq!(popped.map(|e| e.id), Some(id));
                }
            }
            UndoEntry::Place { addr, id, .. } => self.remove_from_coherence(addr, id),
        }
    }

    /// Undo every mutation made after `stamp`
    pub fn cut_to_stamp(&mut self, stamp: Stamp) {
        while let Some(entry) = self.log.pop_above(stamp) {
            self.undo(entry);
        }
        self.next_stamp = stamp + 1;
        self.invalidate();
    }

    /// Undo the commit of `id` (its placements and read choice) while
    /// keeping the event itself. `id` must carry the newest stamp.
    pub fn reset_event(&mut self, id: EventId) {
        let stamp = self.event(id).stamp;
        while let Some(entry) = self.log.pop_placement_at(stamp) {
            self.undo(entry);
        }
        if self.is_read(self.event(id)) {
            self.clear_read(id);
        }
        self.invalidate();
    }

    /// The subgraph of events satisfying `keep`, with the events in `detach`
    /// left out of coherence. Stamps are preserved.
    pub fn restrict(&self, keep: impl Fn(&Event) -> bool, detach: &[EventId]) -> Self {
        let mut graph = Self::new(Rc::clone(&self.layout), self.lock_aware);
        graph.threads = vec![None; self.threads.len()];

        let kept: HashSet<EventId> = self.events().filter(|e| keep(e)).map(|e| e.id).collect();
        let placed = |id: &EventId| kept.contains(id) && !detach.contains(id);

        for e in self.events_by_stamp().into_iter().filter(|e| kept.contains(&e.id)) {
            let t = e.id.thread;
            if e.id.index == 0 {
                if let Some(Some(slot)) = self.threads.get(t.as_usize()) {
                    graph.threads[t.as_usize()] = Some(ThreadSlot {
                        entry: slot.entry,
                        arg: slot.arg,
                        symmetric_to: slot.symmetric_to,
                        events: Vec::new(),
                    });
                    graph.log.push(UndoEntry::Spawn { thread: t, stamp: e.stamp });
                }
            }
            let Some(slot) = graph.threads[t.as_usize()].as_mut() else {
                continue;
            };
            debug_assert_eq!(slot.events.len(), e.id.index, "restriction must keep prefixes");
            slot.events.push(e.clone());
            graph.log.push(UndoEntry::Append { id: e.id, stamp: e.stamp });
            if let Some(loc) = e.label.location() {
                if placed(&e.id) && self.coherence(loc.addr).contains(&e.id) {
                    graph.log.push(UndoEntry::Place { addr: loc.addr, id: e.id, stamp: e.stamp });
                }
            }
            graph.next_stamp = graph.next_stamp.max(e.stamp + 1);
        }

        for (addr, order) in &self.coherence {
            let order: Vec<EventId> = order.iter().copied().filter(|w| placed(w)).collect();
            if !order.is_empty() {
                graph.coherence.insert(*addr, order);
            }
        }
        while matches!(graph.threads.last(), Some(None)) {
            graph.threads.pop();
        }
        graph
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Derived relations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Program order, thread creation and join predecessors of `e`
    pub fn structural_preds(&self, e: &Event) -> Vec<EventId> {
        let mut preds = Vec::with_capacity(2);
        if let Some(p) = e.id.prev() {
            preds.push(p);
        }
        match e.label {
            EventLabel::ThreadStart { parent: Some(parent) } => preds.push(parent),
            EventLabel::ThreadJoin { thread } => preds.extend(self.finish_event(thread)),
            _ => {}
        }
        preds
    }

    /// Porf views of every event, or `None` if porf is cyclic.
    /// Memoised until the next mutation.
    pub fn porf_views(&self) -> Option<&Views> {
        self.porf.get_or_init(|| self.compute_porf()).as_ref()
    }

    /// The porf prefix of `id` as a view (including `id`)
    pub fn porf_view(&self, id: EventId) -> Option<&VectorClock> {
        self.porf_views()?.get(id)
    }

    fn compute_porf(&self) -> Option<Views> {
        let mut views: Vec<Vec<Option<VectorClock>>> = self
            .threads
            .iter()
            .map(|slot| slot.as_ref().map_or_else(Vec::new, |s| vec![None; s.events.len()]))
            .collect();
        let mut active = HashSet::new();
        for e in self.events() {
            if !self.porf_visit(e.id, &mut views, &mut active) {
                return None;
            }
        }
        Some(Views::from_parts(
            views
                .into_iter()
                .map(|t| t.into_iter().map(Option::unwrap_or_default).collect())
                .collect(),
        ))
    }

    fn porf_visit(
        &self,
        id: EventId,
        views: &mut Vec<Vec<Option<VectorClock>>>,
        active: &mut HashSet<EventId>,
    ) -> bool {
        if views[id.thread.as_usize()][id.index].is_some() {
            return true;
        }
        if !active.insert(id) {
            return false;
        }
        let e = self.event(id);
        let mut preds = self.structural_preds(e);
        if self.is_read(e) {
            preds.extend(e.rf.and_then(WriteRef::event));
        }
        let mut view = VectorClock::new(self.threads.len());
        for p in preds.into_iter().filter(|p| self.contains(*p)) {
            if !self.porf_visit(p, views, active) {
                return false;
            }
            if let Some(pv) = &views[p.thread.as_usize()][p.index] {
                view.merge(pv);
            }
        }
        view.include(id);
        active.remove(&id);
        views[id.thread.as_usize()][id.index] = Some(view);
        true
    }
}

impl fmt::Display for ExecutionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in self.threads() {
            write!(f, "{t}:")?;
            for e in self.thread_events(t) {
                write!(f, " {}", e.label)?;
                if let Some(rf) = e.rf {
                    write!(f, "<-{rf}={}", e.value)?;
                }
                write!(f, ";")?;
            }
            writeln!(f)?;
        }
        for (addr, order) in &self.coherence {
            write!(f, "co({addr}): init")?;
            for w in order {
                write!(f, " < {w}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::MemoryOrder;
    use crate::domain::graph::layout::Global;

    const X: Address = Address(0x10);

    fn graph() -> ExecutionGraph {
        let layout = MemoryLayout::new([Global { addr: X, size: 8, init: 7, persistent: false }]);
        ExecutionGraph::new(Rc::new(layout), false)
    }

    fn write(value: Value) -> EventLabel {
        EventLabel::Write { loc: Location::new(X, 8), value, order: MemoryOrder::Relaxed }
    }

    fn read() -> EventLabel {
        EventLabel::Read { loc: Location::new(X, 8), order: MemoryOrder::Relaxed }
    }

    #[test]
    fn test_lowest_free_thread_slot() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        assert_eq!((t0, t1), (ThreadId(0), ThreadId(1)));
        let stamp = g.event(EventId::new(t0, 0)).stamp;
        g.cut_to_stamp(stamp);
        assert!(!g.has_thread(t1));
        assert_eq!(g.add_thread(0, 0, None, None), ThreadId(1));
    }

    #[test]
    fn test_read_values_and_coherence() {
        let mut g = graph();
        let t = g.add_thread(0, 0, None, None);
        let w = g.append(t, write(3));
        g.set_written(w, Some(3));
        g.place_after(w, WriteRef::Init, g.event(w).stamp);
        let r = g.append(t, read());
        g.set_read(r, WriteRef::Init);
        assert_eq!(g.event(r).value, 7);
        g.set_read(r, WriteRef::Event(w));
        assert_eq!(g.event(r).value, 3);
        assert_eq!(g.co_position(WriteRef::Event(w), X), Some(1));
        assert_eq!(g.final_value(X), 3);
    }

    #[test]
    fn test_cut_and_reset_restore_prefix() {
        let mut g = graph();
        let t = g.add_thread(0, 0, None, None);
        let w1 = g.append(t, write(1));
        g.set_written(w1, Some(1));
        g.place_after(w1, WriteRef::Init, g.event(w1).stamp);
        let w2 = g.append(t, write(2));
        g.set_written(w2, Some(2));
        g.place_after(w2, WriteRef::Event(w1), g.event(w2).stamp);
        let r = g.append(t, read());
        g.set_read(r, WriteRef::Event(w2));

        g.cut_to_stamp(g.event(w2).stamp);
        assert!(!g.contains(r));
        assert_eq!(g.coherence(X), &[w1, w2]);

        g.reset_event(w2);
        assert_eq!(g.coherence(X), &[w1]);
        g.place_after(w2, WriteRef::Init, g.event(w2).stamp);
        assert_eq!(g.coherence(X), &[w2, w1]);
    }

    #[test]
    fn test_porf_views_follow_rf() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let w = g.append(t0, write(1));
        g.set_written(w, Some(1));
        g.place_after(w, WriteRef::Init, g.event(w).stamp);
        let r = g.append(t1, read());
        g.set_read(r, WriteRef::Event(w));
        let views = g.porf_views().expect("acyclic");
        assert!(views.before(w, r));
        assert!(!views.before(r, w));
    }

    #[test]
    fn test_porf_cycle_detected() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let r0 = g.append(t0, read());
        let w0 = g.append(t0, write(1));
        g.set_written(w0, Some(1));
        let r1 = g.append(t1, read());
        let w1 = g.append(t1, write(1));
        g.set_written(w1, Some(1));
        g.set_read(r0, WriteRef::Event(w1));
        g.set_read(r1, WriteRef::Event(w0));
        assert!(g.porf_views().is_none());
    }

    #[test]
    fn test_restrict_keeps_stamps_and_detaches() {
        let mut g = graph();
        let t0 = g.add_thread(0, 0, None, None);
        let t1 = g.add_thread(0, 0, None, None);
        let w = g.append(t0, write(1));
        g.set_written(w, Some(1));
        g.place_after(w, WriteRef::Init, g.event(w).stamp);
        let r = g.append(t1, read());
        g.set_read(r, WriteRef::Event(w));
        let extra = g.append(t0, write(2));
        g.set_written(extra, Some(2));
        g.place_after(extra, WriteRef::Event(w), g.event(extra).stamp);

        let stamp_r = g.event(r).stamp;
        let small = g.restrict(|e| e.stamp <= stamp_r, &[w]);
        assert!(small.contains(r));
        assert!(!small.contains(extra));
        assert!(small.coherence(X).is_empty());
        assert_eq!(small.event(r).stamp, stamp_r);
        assert_eq!(small.next_stamp(), stamp_r + 1);
    }
}
