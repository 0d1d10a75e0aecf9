//! Explorer
//!
//! Enumerates the consistent execution graphs of an [`EventSource`] under a
//! memory model, each exactly once, without storing visited states.
//!
//! # Search
//!
//! ```text
//! extend ──▶ schedule lowest runnable thread ──▶ add event ──▶ check
//!   ▲                                                            │
//!   │            Complete / Blocked / Inconsistent / Violation ◀─┘
//!   │                              │
//!   └── resume highest-stamp record ◀── worklist ◀── saved states
//! ```
//!
//! A read takes its first consistent source and queues the others as
//! forward records. A write takes its first consistent coherence position,
//! queues the others, then queues a backward record for every older read it
//! may revisit. Forward records rewind the graph through its undo log;
//! backward records save the current state and continue in the restricted
//! graph.

pub mod config;
pub mod outcome;
pub mod revisit;
pub mod worklist;

pub use config::{Bounds, ExplorerConfig, ExplorerConfigBuilder, Reductions, StopPolicy};
pub use outcome::{
    BoundKind, ExecutionObserver, ExplorationReport, ExplorationStats, ExplorerError, NullObserver,
    Violation,
};
pub use revisit::{Revisit, RevisitView};
pub use worklist::Worklist;

use crate::domain::event::{
    Annotation, AssumeKind, BlockReason, EventId, EventLabel, Stamp, ThreadId, Value,
};
use crate::domain::graph::{ExecutionGraph, MemoryLayout, WriteRef};
use crate::domain::oracle::{common, Oracle};
use crate::domain::reduction::{lapor, symmetry};
use crate::domain::source::{self, EventSource, Next, RecoverySource, ThreadContext};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// What the scheduled thread does next
#[derive(Debug)]
enum Step {
    Event(EventLabel),
    Finish,
    Block(BlockReason),
}

/// How a branch ended
#[derive(Debug)]
enum Terminal {
    Complete,
    Blocked,
    Inconsistent,
    Violation(Violation),
}

/// A graph and the choices left in it
struct SearchState {
    graph: ExecutionGraph,
    worklist: Worklist,
}

/// Stateless model checker over one event source
pub struct Explorer<'s> {
    source: &'s dyn EventSource,
    config: ExplorerConfig,
    oracle: Oracle,
}

impl<'s> Explorer<'s> {
    /// Explorer for `source`
    pub fn new(source: &'s dyn EventSource, config: ExplorerConfig) -> Self {
        Self { source, config, oracle: Oracle::new(config.model) }
    }

    /// Settings in use
    pub const fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Run without observing individual executions
    pub fn explore(&self) -> Result<ExplorationReport, ExplorerError> {
        self.run(&mut NullObserver)
    }

    /// Run the search to completion or until a bound or the stop policy
    /// ends it.
    pub fn run(&self, observer: &mut dyn ExecutionObserver) -> Result<ExplorationReport, ExplorerError> {
        let started = Instant::now();
        let mut report = ExplorationReport::new(self.config.model);
        let mut saved: Vec<SearchState> = Vec::new();
        let mut state = SearchState { graph: self.initial_graph(), worklist: Worklist::default() };
        info!(model = %self.config.model, threads = state.graph.threads().count(), "exploration started");

        let mut resumed: Option<Terminal> = None;
        'search: loop {
            let terminal = match resumed.take() {
                Some(terminal) => terminal,
                None => self.extend(&mut state, &mut report.stats)?,
            };
            match terminal {
                Terminal::Complete => {
                    report.stats.executions += 1;
                    trace!(execution = report.stats.executions, graph = %state.graph, "complete");
                    observer.on_complete(&state.graph);
                    if let Some(violation) = self.check_complete(&state.graph, observer)? {
                        Self::record(&mut report, violation, &state.graph, observer);
                    }
                }
                Terminal::Blocked => report.stats.blocked += 1,
                Terminal::Inconsistent => report.stats.inconsistent += 1,
                Terminal::Violation(violation) => {
                    Self::record(&mut report, violation, &state.graph, observer);
                }
            }
            if self.config.stop_policy == StopPolicy::FirstViolation && !report.is_clean() {
                break;
            }

            loop {
                if let Some((stamp, revisit)) = state.worklist.pop() {
                    if let Some(bound) = self.bound_hit(&report.stats, started) {
                        warn!(?bound, executions = report.stats.executions, "bound reached");
                        report.bound_reached = Some(bound);
                        break 'search;
                    }
                    resumed = self.resume(&mut state, &mut saved, stamp, revisit, &mut report.stats)?;
                    continue 'search;
                }
                match saved.pop() {
                    Some(previous) => state = previous,
                    None => break 'search,
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            executions = report.stats.executions,
            blocked = report.stats.blocked,
            violations = report.violations.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "exploration finished"
        );
        Ok(report)
    }

    fn initial_graph(&self) -> ExecutionGraph {
        let layout = Rc::new(MemoryLayout::new(self.source.globals()));
        let mut graph = ExecutionGraph::new(layout, self.config.reductions.lock_aware);
        for spec in self.source.initial_threads() {
            let mirror = spec.symmetric_to.filter(|s| graph.has_thread(*s));
            graph.add_thread(spec.entry, spec.arg, None, mirror);
        }
        graph
    }

    fn record(
        report: &mut ExplorationReport,
        violation: Violation,
        graph: &ExecutionGraph,
        observer: &mut dyn ExecutionObserver,
    ) {
        if report.violations.contains(&violation) {
            return;
        }
        warn!(%violation, "violation found");
        observer.on_violation(&violation, graph);
        report.violations.push(violation);
    }

    fn bound_hit(&self, stats: &ExplorationStats, started: Instant) -> Option<BoundKind> {
        let bounds = &self.config.bounds;
        if bounds.max_executions.map_or(false, |max| stats.executions >= max) {
            return Some(BoundKind::Executions);
        }
        if bounds.timeout.map_or(false, |limit| started.elapsed() >= limit) {
            return Some(BoundKind::Timeout);
        }
        None
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Extension
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn extend(&self, state: &mut SearchState, stats: &mut ExplorationStats) -> Result<Terminal, ExplorerError> {
        loop {
            let Some((thread, step)) = self.schedule(&state.graph)? else {
                return Ok(self.classify(&state.graph));
            };
            let terminal = self.add_step(state, thread, step);
            stats.max_graph_events = stats.max_graph_events.max(state.graph.len());
            if let Some(terminal) = terminal {
                return Ok(terminal);
            }
        }
    }

    /// Whether `thread` may take another step
    fn can_step(graph: &ExecutionGraph, thread: ThreadId) -> bool {
        let Some(last) = graph.last_event(thread) else {
            return false;
        };
        match &last.label {
            EventLabel::ThreadFinish | EventLabel::Block(_) => false,
            EventLabel::Annotation(Annotation::Assume { holds, .. }) => *holds,
            EventLabel::LockAcquire { .. } => !graph.is_read(last) || last.written.is_some(),
            _ => true,
        }
    }

    fn query(&self, graph: &ExecutionGraph, thread: ThreadId) -> Next {
        let Some((entry, arg)) = graph.thread_entry(thread) else {
            return Next::Done;
        };
        let returns = graph.returns(thread, graph.thread_len(thread));
        self.source.next(&ThreadContext { thread, entry, arg, returns: &returns })
    }

    /// Lowest runnable thread and its next step
    fn schedule(&self, graph: &ExecutionGraph) -> Result<Option<(ThreadId, Step)>, ExplorerError> {
        for thread in graph.threads() {
            if !Self::can_step(graph, thread) {
                continue;
            }
            if self
                .config
                .bounds
                .max_thread_events
                .map_or(false, |max| graph.thread_len(thread) >= max)
            {
                return Ok(Some((thread, Step::Block(BlockReason::Bound))));
            }
            let step = match self.query(graph, thread) {
                Next::Done => Step::Finish,
                Next::Blocked => Step::Block(BlockReason::Source),
                Next::Event(label) if label.is_internal() => {
                    return Err(ExplorerError::InvalidProgram(format!(
                        "{thread} produced reserved event {label}"
                    )));
                }
                Next::Event(EventLabel::ThreadJoin { thread: joined }) if !graph.is_finished(joined) => {
                    if !graph.has_thread(joined) {
                        return Err(ExplorerError::InvalidProgram(format!(
                            "{thread} joins unknown thread {joined}"
                        )));
                    }
                    continue;
                }
                Next::Event(label) => Step::Event(label),
            };
            return Ok(Some((thread, step)));
        }
        Ok(None)
    }

    fn add_step(&self, state: &mut SearchState, thread: ThreadId, step: Step) -> Option<Terminal> {
        let label = match step {
            Step::Event(label) => label,
            Step::Finish => EventLabel::ThreadFinish,
            Step::Block(reason) => EventLabel::Block(reason),
        };
        let graph = &mut state.graph;
        let id = graph.append(thread, label);
        trace!(event = %id, label = %graph.event(id).label, "event added");

        let label = &graph.event(id).label;
        let spawn = match *label {
            EventLabel::ThreadCreate { entry, arg } => Some((entry, arg)),
            _ => None,
        };
        let allocates = matches!(label, EventLabel::Malloc { .. });
        if let Some((entry, arg)) = spawn {
            let mirror = match graph.preceding_annotation(id) {
                Some(Annotation::SpawnSymmetric(sibling)) if graph.has_thread(*sibling) => Some(*sibling),
                _ => None,
            };
            let child = graph.add_thread(entry, arg, Some(id), mirror);
            graph.set_value(id, child.as_usize() as Value);
        } else if allocates {
            graph.set_value(id, id.heap_address().0);
        }

        let event = graph.event(id);
        if graph.is_read(event) {
            self.visit_read(state, id)
        } else if graph.is_write(event) {
            self.visit_write(state, id)
        } else {
            self.after_extension(&state.graph, id)
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Reads
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn visit_read(&self, state: &mut SearchState, read: EventId) -> Option<Terminal> {
        let mut candidates = self.read_candidates(&mut state.graph, read);
        if self.config.reductions.symmetry && candidates.len() > 1 {
            let valid: Vec<WriteRef> = candidates
                .iter()
                .copied()
                .filter(|c| self.try_source(&mut state.graph, read, *c, true))
                .collect();
            symmetry::filter_candidates(&state.graph, &mut candidates, |c| valid.contains(&c));
        }
        let Some((&first, rest)) = candidates.split_first() else {
            debug!(%read, "no consistent source, pruning");
            return Some(Terminal::Inconsistent);
        };
        let key = state.graph.event(read).stamp;
        for &source in rest {
            state.worklist.push(key, Revisit::ReadsFrom { read, source });
        }
        self.commit_read(state, read, first);
        self.after_extension(&state.graph, read)
    }

    /// Sources `read` can take without the read part alone being inconsistent
    fn read_candidates(&self, graph: &mut ExecutionGraph, read: EventId) -> Vec<WriteRef> {
        let Some(loc) = graph.access_location(graph.event(read)) else {
            return Vec::new();
        };
        let options: Vec<WriteRef> = std::iter::once(WriteRef::Init)
            .chain(graph.coherence(loc.addr).iter().map(|w| WriteRef::Event(*w)))
            .collect();
        options
            .into_iter()
            .filter(|source| self.try_source(graph, read, *source, false))
            .collect()
    }

    /// Tentatively let `read` take `source`, then undo it
    fn try_source(&self, graph: &mut ExecutionGraph, read: EventId, source: WriteRef, with_write: bool) -> bool {
        if with_write {
            Self::commit_value(graph, read, source);
        } else {
            graph.set_read(read, source);
        }
        let consistent = self.oracle.is_consistent(graph);
        graph.reset_event(read);
        consistent
    }

    /// Read `source` and settle the write part of an RMW
    fn commit_value(graph: &mut ExecutionGraph, read: EventId, source: WriteRef) {
        graph.set_read(read, source);
        Self::resolve_rmw(graph, read);
        if graph.is_write(graph.event(read)) {
            let stamp = graph.event(read).stamp;
            graph.place_after(read, source, stamp);
        }
    }

    /// Compute the written value of an RMW from the value it read. A helped
    /// CAS reading the same write as its successful partner merges into it
    /// and writes nothing itself.
    fn resolve_rmw(graph: &mut ExecutionGraph, read: EventId) {
        graph.set_merged(read, None);
        let event = graph.event(read);
        let (Some(op), Some(source)) = (event.label.rmw_op(), event.rf) else {
            return;
        };
        let written = op.apply(event.value);
        let partner = written
            .and_then(|_| common::helped_partner(graph, read))
            .filter(|p| graph.event(*p).rf == Some(source));
        match partner {
            Some(partner) => {
                graph.set_merged(read, Some(partner));
                graph.set_written(read, None);
            }
            None => graph.set_written(read, written),
        }
    }

    fn commit_read(&self, state: &mut SearchState, read: EventId, source: WriteRef) {
        Self::commit_value(&mut state.graph, read, source);
        if state.graph.is_write(state.graph.event(read)) {
            self.calc_revisits(state, read);
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Writes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn visit_write(&self, state: &mut SearchState, write: EventId) -> Option<Terminal> {
        let value = ExecutionGraph::store_value(&state.graph.event(write).label);
        state.graph.set_written(write, value);
        self.place_new_write(state, write);
        self.calc_revisits(state, write);
        self.after_extension(&state.graph, write)
    }

    /// Place a plain write at its first consistent position and queue the
    /// others. With none consistent it goes last; the check that follows
    /// prunes the branch once its revisits are queued.
    fn place_new_write(&self, state: &mut SearchState, write: EventId) {
        let placements = self.placements(&mut state.graph, write);
        let key = state.graph.event(write).stamp;
        let first = match placements.split_first() {
            Some((&first, rest)) => {
                for &after in rest {
                    state.worklist.push(key, Revisit::Coherence { write, after });
                }
                first
            }
            None => match state.graph.access_location(state.graph.event(write)) {
                Some(loc) => state.graph.co_max(loc.addr),
                None => return,
            },
        };
        Self::place_write(&mut state.graph, write, first);
    }

    /// Consistent coherence positions for `write`, latest first
    fn placements(&self, graph: &mut ExecutionGraph, write: EventId) -> Vec<WriteRef> {
        let Some(loc) = graph.access_location(graph.event(write)) else {
            return Vec::new();
        };
        let mut options: Vec<WriteRef> = std::iter::once(WriteRef::Init)
            .chain(graph.coherence(loc.addr).iter().map(|w| WriteRef::Event(*w)))
            .collect();
        options.reverse();
        options
            .into_iter()
            .filter(|after| {
                Self::place_write(graph, write, *after);
                let consistent = self.oracle.is_consistent(graph);
                Self::unplace_write(graph, write);
                consistent
            })
            .collect()
    }

    /// Successful RMWs reading `write` that are (or are not) placed
    fn rmw_readers(graph: &ExecutionGraph, write: EventId, placed: bool) -> Vec<EventId> {
        graph
            .events()
            .filter(|e| e.rf == Some(WriteRef::Event(write)) && graph.is_write(e))
            .filter(|e| graph.is_placed(e.id) == placed)
            .map(|e| e.id)
            .collect()
    }

    /// Put `write` after `after`; its RMW readers follow it immediately
    fn place_write(graph: &mut ExecutionGraph, write: EventId, after: WriteRef) {
        let stamp = graph.event(write).stamp;
        graph.place_after(write, after, stamp);
        for reader in Self::rmw_readers(graph, write, false) {
            graph.place_after(reader, WriteRef::Event(write), stamp);
        }
    }

    fn unplace_write(graph: &mut ExecutionGraph, write: EventId) {
        for reader in Self::rmw_readers(graph, write, true) {
            graph.unplace(reader);
        }
        graph.unplace(write);
    }

    /// Queue every backward revisit `write` can perform
    fn calc_revisits(&self, state: &mut SearchState, write: EventId) {
        let graph = &state.graph;
        if self.config.reductions.symmetry && symmetry::skip_backward_revisits(graph, write) {
            return;
        }
        let Some(loc) = graph.access_location(graph.event(write)) else {
            return;
        };
        let Some(prefix) = graph.porf_view(write).cloned() else {
            return;
        };
        let key = graph.next_stamp().saturating_sub(1);
        let targets: Vec<EventId> = graph
            .events()
            .filter(|e| {
                e.id != write
                    && e.revisitable
                    && graph.is_read(e)
                    && e.rf.is_some()
                    && e.rf != Some(WriteRef::Event(write))
                    && graph.access_location(e).map(|l| l.addr) == Some(loc.addr)
                    && !prefix.contains(e.id)
            })
            .map(|e| e.id)
            .filter(|&read| {
                let view = RevisitView::new(graph, read, prefix.clone());
                revisit::is_maximal(graph, &view, read, write)
            })
            .collect();
        for read in targets {
            debug!(%read, %write, "backward revisit queued");
            state.worklist.push(key, Revisit::Backward { read, write });
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Checks
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Consistency, then races, undefined behaviour and assertions
    fn after_extension(&self, graph: &ExecutionGraph, id: EventId) -> Option<Terminal> {
        let analysis = match self.oracle.check(graph) {
            Ok(analysis) => analysis,
            Err(reason) => {
                debug!(event = %id, %reason, "inconsistent, pruning");
                return Some(Terminal::Inconsistent);
            }
        };
        if let Some(race) = self.oracle.race(graph, &analysis) {
            return Some(Terminal::Violation(Violation::DataRace(race)));
        }
        if let Some(access) = self.oracle.undefined(graph, &analysis) {
            return Some(Terminal::Violation(Violation::UndefinedAccess(access)));
        }
        match &graph.event(id).label {
            EventLabel::Annotation(Annotation::Assert { holds: false, message }) => {
                Some(Terminal::Violation(Violation::AssertionViolation {
                    event: id,
                    message: message.clone(),
                }))
            }
            _ => None,
        }
    }

    /// Whether the newest read of `thread` took the coherence-latest write
    fn last_read_is_co_max(graph: &ExecutionGraph, thread: ThreadId) -> bool {
        let Some(read) = graph.thread_events(thread).iter().rev().find(|e| graph.is_read(e)) else {
            return true;
        };
        match (read.rf, graph.access_location(read)) {
            (Some(source), Some(loc)) => source == graph.co_max(loc.addr),
            _ => true,
        }
    }

    /// Outcome of a graph in which no thread can step
    fn classify(&self, graph: &ExecutionGraph) -> Terminal {
        let stuck: Vec<ThreadId> = graph.threads().filter(|t| !graph.is_finished(*t)).collect();
        if stuck.is_empty() {
            return Terminal::Complete;
        }

        let mut lock_waiters = false;
        let mut spinning = None;
        let mut unbounded = None;
        for &thread in &stuck {
            let Some(last) = graph.last_event(thread) else {
                continue;
            };
            let genuine = match &last.label {
                EventLabel::Block(_) => {
                    unbounded = unbounded.or(Some(thread));
                    Self::last_read_is_co_max(graph, thread)
                }
                EventLabel::Annotation(Annotation::Assume { holds: false, kind }) => {
                    spinning = spinning.or(Some(thread));
                    *kind == AssumeKind::Spinloop && Self::last_read_is_co_max(graph, thread)
                }
                EventLabel::LockAcquire { .. } if graph.is_read(last) && last.written.is_none() => {
                    lock_waiters = true;
                    Self::last_read_is_co_max(graph, thread)
                }
                // waiting on a join
                _ => true,
            };
            if !genuine {
                trace!(%thread, "spurious block");
                return Terminal::Blocked;
            }
        }

        if lock_waiters {
            return Terminal::Violation(Violation::Deadlock { threads: stuck });
        }
        if let Some(thread) = spinning {
            return if self.config.check_liveness {
                Terminal::Violation(Violation::Liveness { thread })
            } else {
                Terminal::Blocked
            };
        }
        if let Some(thread) = unbounded {
            return if self.config.check_liveness {
                Terminal::Violation(Violation::Nontermination { thread })
            } else {
                Terminal::Blocked
            };
        }
        Terminal::Violation(Violation::Deadlock { threads: stuck })
    }

    /// Checks that only make sense on complete executions: lock-order
    /// inversions and crash recovery.
    fn check_complete(
        &self,
        graph: &ExecutionGraph,
        observer: &mut dyn ExecutionObserver,
    ) -> Result<Option<Violation>, ExplorerError> {
        let analysis = match self.oracle.check(graph) {
            Ok(analysis) => analysis,
            Err(reason) => {
                let event = graph.events_by_stamp().last().map_or(EventId::new(ThreadId(0), 0), |e| e.id);
                warn!(%event, %reason, "complete execution rejected on re-check");
                return Err(ExplorerError::RejectedOnRecheck { event, reason });
            }
        };
        if graph.is_lock_aware() {
            if let Some(threads) = lapor::lock_inversion(graph, &analysis.hb) {
                return Ok(Some(Violation::Deadlock { threads }));
            }
        }
        let Some(entry) = self.source.recovery_entry().filter(|_| self.config.persistency) else {
            return Ok(None);
        };

        let mut config = self.config;
        config.persistency = false;
        config.stop_policy = StopPolicy::FirstViolation;
        config.bounds.max_executions = None;
        for state in self.oracle.durable_states(graph, &analysis) {
            observer.on_recovery(&state);
            let recovery = RecoverySource::new(self.source, entry, &state);
            let report = Explorer::new(&recovery, config).explore()?;
            if let Some(cause) = report.violations.into_iter().next() {
                debug!(?state, %cause, "recovery failed");
                return Ok(Some(Violation::PersistencyViolation { state, cause: Box::new(cause) }));
            }
        }
        Ok(None)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Backtracking
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn resume(
        &self,
        state: &mut SearchState,
        saved: &mut Vec<SearchState>,
        stamp: Stamp,
        revisit: Revisit,
        stats: &mut ExplorationStats,
    ) -> Result<Option<Terminal>, ExplorerError> {
        state.graph.cut_to_stamp(stamp);
        match revisit {
            Revisit::ReadsFrom { read, source } => {
                stats.forward_revisits += 1;
                debug!(%read, %source, "forward revisit");
                state.graph.reset_event(read);
                self.commit_read(state, read, source);
                Ok(self.after_extension(&state.graph, read))
            }
            Revisit::Coherence { write, after } => {
                stats.forward_revisits += 1;
                debug!(%write, %after, "coherence revisit");
                state.graph.reset_event(write);
                Self::place_write(&mut state.graph, write, after);
                Ok(self.after_extension(&state.graph, write))
            }
            Revisit::Backward { read, write } => {
                stats.backward_revisits += 1;
                self.backward(state, saved, read, write)
            }
        }
    }

    /// Continue in the graph where `write` is read by `read`
    fn backward(
        &self,
        state: &mut SearchState,
        saved: &mut Vec<SearchState>,
        read: EventId,
        write: EventId,
    ) -> Result<Option<Terminal>, ExplorerError> {
        let graph = &state.graph;
        let Some(prefix) = graph.porf_view(write).cloned() else {
            return Ok(Some(Terminal::Inconsistent));
        };
        let view = RevisitView::new(graph, read, prefix);
        let mut restricted = graph.restrict(|e| view.keeps(graph, e), &[read, write]);
        if self.config.check_determinism {
            if let Some(event) = source::first_divergence(self.source, &restricted) {
                return Err(ExplorerError::NonDeterministicSource { event });
            }
        }
        let frozen: Vec<EventId> = restricted.events().filter(|e| view.in_prefix(e.id)).map(|e| e.id).collect();
        for id in frozen {
            restricted.mark_non_revisitable(id);
        }
        debug!(%read, %write, kept = restricted.len(), "backward revisit");
        let previous = std::mem::replace(state, SearchState { graph: restricted, worklist: Worklist::default() });
        saved.push(previous);

        let graph = &mut state.graph;
        graph.set_read(read, WriteRef::Event(write));
        Self::resolve_rmw(graph, read);
        if graph.is_read(graph.event(write)) {
            let source = graph.event(write).rf.unwrap_or(WriteRef::Init);
            Self::place_write(graph, write, source);
        } else {
            self.place_new_write(state, write);
        }
        if state.graph.is_write(state.graph.event(read)) {
            self.calc_revisits(state, read);
        }
        Ok(self.after_extension(&state.graph, read))
    }
}
