//! Event Stream Source
//!
//! The explorer never runs program code itself. It asks a source for the
//! next event of a thread, handing over the values the thread's earlier
//! events returned. Sources must be deterministic: equal histories yield
//! equal answers.

use crate::domain::event::{BlockReason, EventId, EventLabel, ThreadId, Value};
use crate::domain::graph::{ExecutionGraph, Global};
use crate::domain::oracle::DurableState;

/// What a source knows about the thread being asked
#[derive(Debug, Clone, Copy)]
pub struct ThreadContext<'a> {
    /// Asking thread
    pub thread: ThreadId,
    /// Entry point recorded at spawn
    pub entry: usize,
    /// Spawn argument
    pub arg: Value,
    /// Values returned by the thread's events so far, in program order
    pub returns: &'a [Value],
}

/// Answer of [`EventSource::next`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// The next event
    Event(EventLabel),
    /// The thread cannot progress
    Blocked,
    /// The thread terminated
    Done,
}

/// An initial thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadSpec {
    /// Entry point
    pub entry: usize,
    /// Argument
    pub arg: Value,
    /// Earlier thread this one mirrors
    pub symmetric_to: Option<ThreadId>,
}

/// Producer of per-thread event streams
pub trait EventSource {
    /// Threads running at the start
    fn initial_threads(&self) -> Vec<ThreadSpec>;

    /// Declared global locations
    fn globals(&self) -> Vec<Global>;

    /// Entry point of the recovery routine run after a crash
    fn recovery_entry(&self) -> Option<usize> {
        None
    }

    /// The next event of a thread
    fn next(&self, ctx: &ThreadContext<'_>) -> Next;
}

/// Whether `label` is what the source answered with `next`
fn answers(next: &Next, label: &EventLabel) -> bool {
    match (next, label) {
        (_, EventLabel::Block(BlockReason::Bound)) => true,
        (Next::Blocked, EventLabel::Block(_)) | (Next::Done, EventLabel::ThreadFinish) => true,
        (Next::Event(expected), label) => expected == label,
        _ => false,
    }
}

/// First event of `graph` the source would no longer produce
pub fn first_divergence(source: &dyn EventSource, graph: &ExecutionGraph) -> Option<EventId> {
    for thread in graph.threads() {
        let (entry, arg) = graph.thread_entry(thread)?;
        for e in graph.thread_events(thread).iter().skip(1) {
            let returns = graph.returns(thread, e.id.index);
            let ctx = ThreadContext { thread, entry, arg, returns: &returns };
            if !answers(&source.next(&ctx), &e.label) {
                return Some(e.id);
            }
        }
    }
    None
}

/// The recovery routine of a source, run alone over a durable state
pub struct RecoverySource<'a> {
    inner: &'a dyn EventSource,
    entry: usize,
    globals: Vec<Global>,
}

impl<'a> RecoverySource<'a> {
    /// Recovery of `inner` starting from `state`
    pub fn new(inner: &'a dyn EventSource, entry: usize, state: &DurableState) -> Self {
        let globals = inner
            .globals()
            .into_iter()
            .map(|mut g| {
                if let Some((_, v)) = state.values.iter().find(|(addr, _)| *addr == g.addr) {
                    g.init = *v;
                }
                g
            })
            .collect();
        Self { inner, entry, globals }
    }
}

impl EventSource for RecoverySource<'_> {
    fn initial_threads(&self) -> Vec<ThreadSpec> {
        vec![ThreadSpec { entry: self.entry, arg: 0, symmetric_to: None }]
    }

    fn globals(&self) -> Vec<Global> {
        self.globals.clone()
    }

    fn next(&self, ctx: &ThreadContext<'_>) -> Next {
        self.inner.next(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{Address, Location, MemoryOrder};
    use crate::domain::graph::MemoryLayout;
    use std::cell::Cell;
    use std::rc::Rc;

    const X: Address = Address(0x10);

    /// One write of `value`, then done
    struct Writer {
        value: Cell<u64>,
    }

    impl EventSource for Writer {
        fn initial_threads(&self) -> Vec<ThreadSpec> {
            vec![ThreadSpec { entry: 0, arg: 0, symmetric_to: None }]
        }

        fn globals(&self) -> Vec<Global> {
            vec![Global { addr: X, size: 8, init: 0, persistent: true }]
        }

        fn next(&self, ctx: &ThreadContext<'_>) -> Next {
            match ctx.returns.len() {
                0 => Next::Event(EventLabel::Write {
                    loc: Location::new(X, 8),
                    value: self.value.get(),
                    order: MemoryOrder::Relaxed,
                }),
                _ => Next::Done,
            }
        }
    }

    #[test]
    fn test_divergence_detected() {
        let source = Writer { value: Cell::new(1) };
        let mut g = ExecutionGraph::new(Rc::new(MemoryLayout::new(source.globals())), false);
        let t = g.add_thread(0, 0, None, None);
        let Next::Event(label) = source.next(&ThreadContext { thread: t, entry: 0, arg: 0, returns: &[] }) else {
            panic!("expected an event");
        };
        g.append(t, label);
        g.append(t, EventLabel::ThreadFinish);
        assert_eq!(first_divergence(&source, &g), None);

        source.value.set(2);
        assert_eq!(first_divergence(&source, &g), Some(EventId::new(t, 1)));
    }

    #[test]
    fn test_recovery_source_uses_durable_values() {
        let source = Writer { value: Cell::new(1) };
        let state = DurableState { values: vec![(X, 5)] };
        let recovery = RecoverySource::new(&source, 3, &state);
        assert_eq!(recovery.globals()[0].init, 5);
        assert_eq!(recovery.initial_threads()[0].entry, 3);
        assert_eq!(recovery.recovery_entry(), None);
    }
}
