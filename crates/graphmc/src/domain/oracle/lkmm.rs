//! Linux-kernel model additions: the RCU grace-period rule.
//!
//! A read-side critical section either ends before a grace period or starts
//! after it:
//! - a section that observes a write happening after the grace period must
//!   observe every write happening before it;
//! - a section whose write is observed before the grace period must have
//!   its writes observed by every read happening after it.

use super::hb::HappensBefore;
use super::Inconsistency;
use crate::domain::event::{EventId, EventLabel, FenceKind};
use crate::domain::graph::{Event, ExecutionGraph, WriteRef};

/// Outermost read-side critical sections, as event ranges of one thread
fn critical_sections(graph: &ExecutionGraph) -> Vec<Vec<&Event>> {
    let mut sections = Vec::new();
    for t in graph.threads() {
        let mut depth = 0usize;
        let mut current: Vec<&Event> = Vec::new();
        for e in graph.thread_events(t) {
            match e.label {
                EventLabel::Fence(FenceKind::RcuReadLock) => depth += 1,
                EventLabel::Fence(FenceKind::RcuReadUnlock) if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        sections.push(std::mem::take(&mut current));
                    }
                }
                _ if depth > 0 => current.push(e),
                _ => {}
            }
        }
        if depth > 0 {
            sections.push(current);
        }
    }
    sections
}

fn position(graph: &ExecutionGraph, e: &Event, source: WriteRef) -> Option<usize> {
    graph.co_position(source, e.label.location()?.addr)
}

/// Whether `read` misses `write`: same address and reads co-before it
fn misses(graph: &ExecutionGraph, read: &Event, write: &Event) -> bool {
    if read.label.location().map(|l| l.addr) != write.label.location().map(|l| l.addr) {
        return false;
    }
    match (
        read.rf.and_then(|s| position(graph, read, s)),
        position(graph, write, WriteRef::Event(write.id)),
    ) {
        (Some(r), Some(w)) => r < w,
        _ => false,
    }
}

/// Check the grace-period rule
pub fn check_rcu(graph: &ExecutionGraph, hb: &HappensBefore) -> Result<(), Inconsistency> {
    let grace_periods: Vec<EventId> = graph
        .events()
        .filter(|e| matches!(e.label, EventLabel::Fence(FenceKind::SynchronizeRcu)))
        .map(|e| e.id)
        .collect();
    if grace_periods.is_empty() {
        return Ok(());
    }
    let sections = critical_sections(graph);
    let writes: Vec<&Event> = graph.events().filter(|e| graph.is_write(e)).collect();
    let reads: Vec<&Event> = graph.events().filter(|e| graph.is_read(e)).collect();

    for &gp in &grace_periods {
        for section in &sections {
            if section.first().map_or(true, |e| e.id.thread == gp.thread) {
                continue;
            }
            // Observing a write made after the grace period means the
            // section started after it.
            let starts_after = section.iter().any(|r| {
                graph.is_read(r)
                    && matches!(r.rf, Some(WriteRef::Event(w)) if w == gp || hb.before(gp, w))
            });
            // A write of the section seen before the grace period means the
            // section ended before it.
            let ends_before = section.iter().filter(|w| graph.is_write(w)).any(|w| {
                hb.before(w.id, gp)
                    || reads
                        .iter()
                        .any(|r| r.rf == Some(WriteRef::Event(w.id)) && hb.before(r.id, gp))
            });
            if starts_after && ends_before {
                return Err(Inconsistency::Rcu(gp));
            }
            if starts_after {
                let misses_before = section.iter().filter(|r| graph.is_read(r)).any(|r| {
                    writes
                        .iter()
                        .any(|w| hb.before(w.id, gp) && misses(graph, r, w))
                });
                if misses_before {
                    return Err(Inconsistency::Rcu(gp));
                }
            }
            if ends_before {
                let section_missed = section.iter().filter(|w| graph.is_write(w)).any(|w| {
                    reads
                        .iter()
                        .any(|r| hb.before(gp, r.id) && misses(graph, r, w))
                });
                if section_missed {
                    return Err(Inconsistency::Rcu(gp));
                }
            }
        }
    }
    Ok(())
}
