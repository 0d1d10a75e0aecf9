//! Register-machine interpreter
//!
//! Threads are stateless from the explorer's point of view: every call to
//! [`EventSource::next`] replays the thread from its entry point, feeding
//! each lowered event the value recorded for it, until it reaches the first
//! event without a recorded value.

use super::ir::{Expr, Instr, Program, Reg};
use super::ProgramError;
use crate::domain::event::{
    Address, Annotation, AssumeKind, EventLabel, FenceKind, Location, RmwOp, ThreadId, Value,
};
use crate::domain::graph::Global;
use crate::domain::source::{EventSource, Next, ThreadContext, ThreadSpec};
use std::collections::HashMap;

/// Address of the first global
pub const GLOBAL_BASE: u64 = 0x1000;

/// Distance between consecutive globals
pub const GLOBAL_STRIDE: u64 = 8;

/// Event source backed by a [`Program`]
#[derive(Debug, Clone)]
pub struct Interpreter {
    program: Program,
    globals: HashMap<String, Global>,
    initial: Vec<ThreadSpec>,
    recovery: Option<usize>,
    fuel: usize,
}

impl Interpreter {
    /// Local steps allowed between two events before the thread is
    /// reported as blocked
    pub const LOCAL_FUEL: usize = 10_000;

    /// Validate `program` and build an interpreter for it
    pub fn new(program: &Program) -> Result<Self, ProgramError> {
        if program.threads.is_empty() {
            return Err(ProgramError::NoThreads);
        }

        let mut globals = HashMap::new();
        for (i, decl) in program.globals.iter().enumerate() {
            if !matches!(decl.size, 1 | 2 | 4 | 8) {
                return Err(ProgramError::BadSize { name: decl.name.clone(), size: decl.size });
            }
            let global = Global {
                addr: Address(GLOBAL_BASE + GLOBAL_STRIDE * i as u64),
                size: decl.size,
                init: decl.init,
                persistent: decl.persistent,
            };
            if globals.insert(decl.name.clone(), global).is_some() {
                return Err(ProgramError::DuplicateGlobal(decl.name.clone()));
            }
        }

        let function = |name: &str| {
            program
                .function_index(name)
                .ok_or_else(|| ProgramError::UnknownFunction(name.to_string()))
        };

        for f in &program.functions {
            for (index, instr) in f.body.iter().enumerate() {
                if let Some(target) = instr.target() {
                    if target > f.body.len() {
                        return Err(ProgramError::BadTarget { function: f.name.clone(), index, target });
                    }
                }
                if let Instr::Spawn { function: callee, .. } = instr {
                    function(callee)?;
                }
                for name in instr.operands().into_iter().flat_map(Expr::globals) {
                    if !globals.contains_key(name) {
                        return Err(ProgramError::UnknownGlobal(name.to_string()));
                    }
                }
            }
        }

        let mut initial = Vec::with_capacity(program.threads.len());
        for (i, decl) in program.threads.iter().enumerate() {
            if let Some(sibling) = decl.symmetric_to.filter(|s| *s >= i) {
                return Err(ProgramError::BadSibling { thread: i, sibling });
            }
            initial.push(ThreadSpec {
                entry: function(&decl.function)?,
                arg: decl.arg,
                symmetric_to: decl.symmetric_to.map(ThreadId::new),
            });
        }
        let recovery = program.recovery.as_deref().map(function).transpose()?;

        Ok(Self {
            program: program.clone(),
            globals,
            initial,
            recovery,
            fuel: Self::LOCAL_FUEL,
        })
    }

    /// Override the local-step budget
    #[must_use]
    pub const fn with_fuel(mut self, fuel: usize) -> Self {
        self.fuel = fuel;
        self
    }

    /// The interpreted program
    pub const fn program(&self) -> &Program {
        &self.program
    }

    /// Address assigned to a global
    pub fn global_address(&self, name: &str) -> Option<Address> {
        self.globals.get(name).map(|g| g.addr)
    }

    fn resolve(&self, name: &str) -> Value {
        self.globals.get(name).map_or(0, |g| g.addr.0)
    }

    fn eval(&self, expr: &Expr, regs: &[Value]) -> Value {
        expr.eval(regs, &|name| self.resolve(name))
    }

    fn location(&self, addr: &Expr, size: Option<u8>, regs: &[Value]) -> Location {
        let size = size
            .or_else(|| match addr {
                Expr::Global(name) => self.globals.get(name).map(|g| g.size),
                _ => None,
            })
            .unwrap_or(8);
        Location::new(Address(self.eval(addr, regs)), size)
    }

    /// Events an instruction lowers to; the last one carries its result
    fn lower(&self, instr: &Instr, regs: &[Value]) -> Vec<EventLabel> {
        let assume = |holds, kind| EventLabel::Annotation(Annotation::Assume { holds, kind });
        match instr {
            Instr::Load { addr, size, order, .. } => {
                vec![EventLabel::Read { loc: self.location(addr, *size, regs), order: *order }]
            }
            Instr::Store { addr, value, size, order } => vec![EventLabel::Write {
                loc: self.location(addr, *size, regs),
                value: self.eval(value, regs),
                order: *order,
            }],
            Instr::FinalStore { addr, value, size, order } => vec![
                EventLabel::Annotation(Annotation::FinalWrite),
                EventLabel::Write {
                    loc: self.location(addr, *size, regs),
                    value: self.eval(value, regs),
                    order: *order,
                },
            ],
            Instr::Rmw { addr, op, size, order, .. } => vec![EventLabel::ReadModifyWrite {
                loc: self.location(addr, *size, regs),
                op: op.eval(regs, &|name| self.resolve(name)),
                order: *order,
            }],
            Instr::HelpedCas { addr, expected, new, key, order, .. }
            | Instr::HelpingCas { addr, expected, new, key, order, .. } => {
                let marker = if matches!(instr, Instr::HelpedCas { .. }) {
                    Annotation::HelpedCas(*key)
                } else {
                    Annotation::HelpingCas(*key)
                };
                vec![
                    EventLabel::Annotation(marker),
                    EventLabel::ReadModifyWrite {
                        loc: self.location(addr, None, regs),
                        op: RmwOp::CompareExchange {
                            expected: self.eval(expected, regs),
                            new: self.eval(new, regs),
                        },
                        order: *order,
                    },
                ]
            }
            Instr::Fence { order } => vec![EventLabel::Fence(FenceKind::Memory(*order))],
            Instr::RcuReadLock => vec![EventLabel::Fence(FenceKind::RcuReadLock)],
            Instr::RcuReadUnlock => vec![EventLabel::Fence(FenceKind::RcuReadUnlock)],
            Instr::SynchronizeRcu => vec![EventLabel::Fence(FenceKind::SynchronizeRcu)],
            Instr::Lock { addr } => vec![EventLabel::LockAcquire { addr: Address(self.eval(addr, regs)) }],
            Instr::Unlock { addr } => vec![EventLabel::LockRelease { addr: Address(self.eval(addr, regs)) }],
            Instr::Spawn { function, arg, symmetric_to, .. } => {
                let mut events = Vec::with_capacity(2);
                if let Some(sibling) = symmetric_to {
                    let sibling = ThreadId::new(self.eval(sibling, regs) as usize);
                    events.push(EventLabel::Annotation(Annotation::SpawnSymmetric(sibling)));
                }
                events.push(EventLabel::ThreadCreate {
                    entry: self.program.function_index(function).unwrap_or(usize::MAX),
                    arg: self.eval(arg, regs),
                });
                events
            }
            Instr::Join { thread } => {
                vec![EventLabel::ThreadJoin { thread: ThreadId::new(self.eval(thread, regs) as usize) }]
            }
            Instr::Malloc { size, .. } => vec![EventLabel::Malloc { size: *size }],
            Instr::Free { addr } => vec![EventLabel::Free { addr: Address(self.eval(addr, regs)) }],
            Instr::Assume { cond, spinloop } => {
                let kind = if *spinloop { AssumeKind::Spinloop } else { AssumeKind::User };
                vec![assume(self.eval(cond, regs) != 0, kind)]
            }
            Instr::Assert { cond, message } => vec![EventLabel::Annotation(Annotation::Assert {
                holds: self.eval(cond, regs) != 0,
                message: if message.is_empty() { "assertion failed".to_string() } else { message.clone() },
            })],
            Instr::PersistBarrier => vec![EventLabel::Annotation(Annotation::PersistencyBarrier)],
            Instr::Assign { .. } | Instr::Branch { .. } | Instr::Jump { .. } => Vec::new(),
        }
    }
}

fn set(regs: &mut Vec<Value>, dst: Reg, value: Value) {
    if regs.len() <= dst {
        regs.resize(dst + 1, 0);
    }
    regs[dst] = value;
}

impl EventSource for Interpreter {
    fn initial_threads(&self) -> Vec<ThreadSpec> {
        self.initial.clone()
    }

    fn globals(&self) -> Vec<Global> {
        let mut globals: Vec<Global> = self.globals.values().copied().collect();
        globals.sort_by_key(|g| g.addr);
        globals
    }

    fn recovery_entry(&self) -> Option<usize> {
        self.recovery
    }

    fn next(&self, ctx: &ThreadContext<'_>) -> Next {
        let Some(function) = self.program.functions.get(ctx.entry) else {
            return Next::Done;
        };
        let mut returns = ctx.returns.iter().copied();
        if Some(ctx.entry) == self.recovery && returns.next().is_none() {
            return Next::Event(EventLabel::Annotation(Annotation::RecoveryRoutine));
        }

        let mut regs = vec![ctx.arg];
        let mut pc = 0;
        let mut fuel = self.fuel;
        while let Some(instr) = function.body.get(pc) {
            match instr {
                Instr::Assign { dst, value } => {
                    let v = self.eval(value, &regs);
                    set(&mut regs, *dst, v);
                    pc += 1;
                }
                Instr::Branch { cond, target } => {
                    pc = if self.eval(cond, &regs) != 0 { *target } else { pc + 1 };
                }
                Instr::Jump { target } => pc = *target,
                _ => {
                    let mut result = 0;
                    for label in self.lower(instr, &regs) {
                        match returns.next() {
                            Some(v) => result = v,
                            None => return Next::Event(label),
                        }
                    }
                    if let Some(dst) = instr.def() {
                        set(&mut regs, dst, result);
                    }
                    pc += 1;
                    fuel = self.fuel;
                    continue;
                }
            }
            fuel = fuel.saturating_sub(1);
            if fuel == 0 {
                return Next::Blocked;
            }
        }
        Next::Done
    }
}
