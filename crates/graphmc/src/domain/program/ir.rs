//! Test-program IR
//!
//! Programs are register machines: every function body is a list of
//! instructions over numbered registers, register 0 holding the thread
//! argument. Memory instructions lower to events; `assign`, `branch` and
//! `jump` are local.

use crate::domain::event::{MemoryOrder, RmwOp, Value};
use serde::{Deserialize, Serialize};

/// Register number
pub type Reg = usize;

/// Pure expression over registers and global addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Literal
    Const(Value),
    /// Register contents
    Reg(Reg),
    /// Address of a named global
    Global(String),
    /// Wrapping sum
    Add(Box<Expr>, Box<Expr>),
    /// Wrapping difference
    Sub(Box<Expr>, Box<Expr>),
    /// Wrapping product
    Mul(Box<Expr>, Box<Expr>),
    /// 1 if equal
    Eq(Box<Expr>, Box<Expr>),
    /// 1 if different
    Ne(Box<Expr>, Box<Expr>),
    /// 1 if less (unsigned)
    Lt(Box<Expr>, Box<Expr>),
    /// 1 if less or equal (unsigned)
    Le(Box<Expr>, Box<Expr>),
    /// Logical and
    And(Box<Expr>, Box<Expr>),
    /// Logical or
    Or(Box<Expr>, Box<Expr>),
    /// Logical negation
    Not(Box<Expr>),
}

impl Default for Expr {
    fn default() -> Self {
        Self::Const(0)
    }
}

impl Expr {
    /// Register shorthand
    pub const fn reg(r: Reg) -> Self {
        Self::Reg(r)
    }

    /// Global shorthand
    pub fn global(name: impl Into<String>) -> Self {
        Self::Global(name.into())
    }

    /// Evaluate with `regs` and a global resolver
    pub fn eval(&self, regs: &[Value], global: &impl Fn(&str) -> Value) -> Value {
        let bin = |a: &Self, b: &Self| (a.eval(regs, global), b.eval(regs, global));
        let flag = |b: bool| Value::from(b);
        match self {
            Self::Const(v) => *v,
            Self::Reg(r) => regs.get(*r).copied().unwrap_or(0),
            Self::Global(name) => global(name),
            Self::Add(a, b) => {
                let (a, b) = bin(a, b);
                a.wrapping_add(b)
            }
            Self::Sub(a, b) => {
                let (a, b) = bin(a, b);
                a.wrapping_sub(b)
            }
            Self::Mul(a, b) => {
                let (a, b) = bin(a, b);
                a.wrapping_mul(b)
            }
            Self::Eq(a, b) => {
                let (a, b) = bin(a, b);
                flag(a == b)
            }
            Self::Ne(a, b) => {
                let (a, b) = bin(a, b);
                flag(a != b)
            }
            Self::Lt(a, b) => {
                let (a, b) = bin(a, b);
                flag(a < b)
            }
            Self::Le(a, b) => {
                let (a, b) = bin(a, b);
                flag(a <= b)
            }
            Self::And(a, b) => {
                let (a, b) = bin(a, b);
                flag(a != 0 && b != 0)
            }
            Self::Or(a, b) => {
                let (a, b) = bin(a, b);
                flag(a != 0 || b != 0)
            }
            Self::Not(a) => flag(a.eval(regs, global) == 0),
        }
    }

    /// Registers read by the expression
    pub fn registers(&self) -> Vec<Reg> {
        let mut out = Vec::new();
        self.collect(&mut out, &mut Vec::new());
        out
    }

    /// Globals named by the expression
    pub fn globals(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect(&mut Vec::new(), &mut out);
        out
    }

    fn collect<'a>(&'a self, regs: &mut Vec<Reg>, globals: &mut Vec<&'a str>) {
        match self {
            Self::Const(_) => {}
            Self::Reg(r) => regs.push(*r),
            Self::Global(name) => globals.push(name),
            Self::Not(a) => a.collect(regs, globals),
            Self::Add(a, b)
            | Self::Sub(a, b)
            | Self::Mul(a, b)
            | Self::Eq(a, b)
            | Self::Ne(a, b)
            | Self::Lt(a, b)
            | Self::Le(a, b)
            | Self::And(a, b)
            | Self::Or(a, b) => {
                a.collect(regs, globals);
                b.collect(regs, globals);
            }
        }
    }
}

/// Read-modify-write operation with expression operands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmwExpr {
    /// Fetch-and-add
    Add(Expr),
    /// Fetch-and-sub
    Sub(Expr),
    /// Exchange
    Exchange(Expr),
    /// Compare-and-swap
    CompareExchange {
        /// Required old value
        expected: Expr,
        /// Value stored on success
        new: Expr,
    },
    /// Fetch-and-and
    And(Expr),
    /// Fetch-and-or
    Or(Expr),
    /// Fetch-and-max
    Max(Expr),
    /// Fetch-and-min
    Min(Expr),
}

impl RmwExpr {
    /// Operands in evaluation order
    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Self::CompareExchange { expected, new } => vec![expected, new],
            Self::Add(e) | Self::Sub(e) | Self::Exchange(e) | Self::And(e) | Self::Or(e) | Self::Max(e) | Self::Min(e) => {
                vec![e]
            }
        }
    }

    /// Evaluate the operands
    pub fn eval(&self, regs: &[Value], global: &impl Fn(&str) -> Value) -> RmwOp {
        let v = |e: &Expr| e.eval(regs, global);
        match self {
            Self::Add(e) => RmwOp::Add(v(e)),
            Self::Sub(e) => RmwOp::Sub(v(e)),
            Self::Exchange(e) => RmwOp::Exchange(v(e)),
            Self::CompareExchange { expected, new } => RmwOp::CompareExchange { expected: v(expected), new: v(new) },
            Self::And(e) => RmwOp::And(v(e)),
            Self::Or(e) => RmwOp::Or(v(e)),
            Self::Max(e) => RmwOp::Max(v(e)),
            Self::Min(e) => RmwOp::Min(v(e)),
        }
    }

    /// Whether this is a compare-and-swap
    pub const fn is_cas(&self) -> bool {
        matches!(self, Self::CompareExchange { .. })
    }
}

const fn seq_cst() -> MemoryOrder {
    MemoryOrder::SeqCst
}

/// One instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instr {
    /// `dst = *addr`
    Load {
        /// Register receiving the result
        dst: Reg,
        /// Address accessed
        addr: Expr,
        /// Access width in bytes; the global's width when absent
        #[serde(default)]
        size: Option<u8>,
        /// Memory order
        #[serde(default)]
        order: MemoryOrder,
    },
    /// `*addr = value`
    Store {
        /// Address accessed
        addr: Expr,
        /// Value written
        value: Expr,
        /// Access width in bytes; the global's width when absent
        #[serde(default)]
        size: Option<u8>,
        /// Memory order
        #[serde(default)]
        order: MemoryOrder,
    },
    /// `dst = rmw(addr, op)`, returning the old value
    Rmw {
        /// Register receiving the result
        dst: Reg,
        /// Address accessed
        addr: Expr,
        /// Operation applied
        #[serde(rename = "operation")]
        op: RmwExpr,
        /// Access width in bytes; the global's width when absent
        #[serde(default)]
        size: Option<u8>,
        /// Memory order
        #[serde(default)]
        order: MemoryOrder,
    },
    /// Memory fence
    Fence {
        /// Memory order
        #[serde(default = "seq_cst")]
        order: MemoryOrder,
    },
    /// `rcu_read_lock()`
    RcuReadLock,
    /// `rcu_read_unlock()`
    RcuReadUnlock,
    /// `synchronize_rcu()`
    SynchronizeRcu,
    /// `mutex_lock(addr)`
    Lock {
        /// Lock word
        addr: Expr,
    },
    /// `mutex_unlock(addr)`
    Unlock {
        /// Lock word
        addr: Expr,
    },
    /// `dst = spawn(function, arg)`, optionally as a mirror of a thread
    Spawn {
        /// Register receiving the new thread id
        dst: Reg,
        /// Entry function of the new thread
        function: String,
        /// Value of the new thread's register 0
        #[serde(default)]
        arg: Expr,
        /// Thread id the new thread mirrors
        #[serde(default)]
        symmetric_to: Option<Expr>,
    },
    /// `join(thread)`
    Join {
        /// Thread id joined
        thread: Expr,
    },
    /// `dst = malloc(size)`
    Malloc {
        /// Register receiving the block address
        dst: Reg,
        /// Block size in bytes
        size: u64,
    },
    /// `free(addr)`
    Free {
        /// Start of the block
        addr: Expr,
    },
    /// `dst = value`
    Assign {
        /// Register written
        dst: Reg,
        /// Value assigned
        value: Expr,
    },
    /// `if cond goto target`
    Branch {
        /// Jump when non-zero
        cond: Expr,
        /// Instruction index jumped to
        target: usize,
    },
    /// `goto target`
    Jump {
        /// Instruction index jumped to
        target: usize,
    },
    /// Block unless `cond`
    Assume {
        /// Condition evaluated
        cond: Expr,
        /// Marks the exit test of a spin loop
        #[serde(default)]
        spinloop: bool,
    },
    /// Report unless `cond`
    Assert {
        /// Condition evaluated
        cond: Expr,
        /// Text reported on failure
        #[serde(default)]
        message: String,
    },
    /// Persistency barrier
    PersistBarrier,
    /// CAS helped by a `helping_cas` with the same key
    HelpedCas {
        /// Register receiving the result
        dst: Reg,
        /// Address accessed
        addr: Expr,
        /// Required old value
        expected: Expr,
        /// Value stored on success
        new: Expr,
        /// Pairs a helped CAS with its helper
        key: u32,
        /// Memory order
        #[serde(default)]
        order: MemoryOrder,
    },
    /// CAS helping a `helped_cas` with the same key
    HelpingCas {
        /// Register receiving the result
        dst: Reg,
        /// Address accessed
        addr: Expr,
        /// Required old value
        expected: Expr,
        /// Value stored on success
        new: Expr,
        /// Pairs a helped CAS with its helper
        key: u32,
        /// Memory order
        #[serde(default)]
        order: MemoryOrder,
    },
    /// Store that must stay the last one in coherence
    FinalStore {
        /// Address accessed
        addr: Expr,
        /// Value written
        value: Expr,
        /// Access width in bytes; the global's width when absent
        #[serde(default)]
        size: Option<u8>,
        /// Memory order
        #[serde(default)]
        order: MemoryOrder,
    },
}

impl Instr {
    /// `assign`, `branch` and `jump` produce no events
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Assign { .. } | Self::Branch { .. } | Self::Jump { .. })
    }

    /// Register written
    pub const fn def(&self) -> Option<Reg> {
        match self {
            Self::Load { dst, .. }
            | Self::Rmw { dst, .. }
            | Self::Spawn { dst, .. }
            | Self::Malloc { dst, .. }
            | Self::Assign { dst, .. }
            | Self::HelpedCas { dst, .. }
            | Self::HelpingCas { dst, .. } => Some(*dst),
            _ => None,
        }
    }

    /// Control-flow target
    pub const fn target(&self) -> Option<usize> {
        match self {
            Self::Branch { target, .. } | Self::Jump { target } => Some(*target),
            _ => None,
        }
    }

    /// Every expression the instruction evaluates
    pub fn operands(&self) -> Vec<&Expr> {
        match self {
            Self::Load { addr, .. } | Self::Lock { addr } | Self::Unlock { addr } | Self::Free { addr } => vec![addr],
            Self::Store { addr, value, .. } | Self::FinalStore { addr, value, .. } => vec![addr, value],
            Self::Rmw { addr, op, .. } => {
                let mut ops = vec![addr];
                ops.extend(op.operands());
                ops
            }
            Self::HelpedCas { addr, expected, new, .. } | Self::HelpingCas { addr, expected, new, .. } => {
                vec![addr, expected, new]
            }
            Self::Spawn { arg, symmetric_to, .. } => {
                let mut ops = vec![arg];
                ops.extend(symmetric_to);
                ops
            }
            Self::Join { thread } => vec![thread],
            Self::Assign { value, .. } => vec![value],
            Self::Branch { cond, .. } | Self::Assume { cond, .. } | Self::Assert { cond, .. } => vec![cond],
            Self::Fence { .. }
            | Self::RcuReadLock
            | Self::RcuReadUnlock
            | Self::SynchronizeRcu
            | Self::Malloc { .. }
            | Self::Jump { .. }
            | Self::PersistBarrier => Vec::new(),
        }
    }

    /// Registers read
    pub fn uses(&self) -> Vec<Reg> {
        self.operands().into_iter().flat_map(Expr::registers).collect()
    }
}

/// A named global variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDecl {
    /// Name used by `{"global": name}`
    pub name: String,
    /// Width in bytes (1, 2, 4 or 8)
    #[serde(default = "GlobalDecl::default_size")]
    pub size: u8,
    /// Initial value
    #[serde(default)]
    pub init: Value,
    /// Survives crashes
    #[serde(default)]
    pub persistent: bool,
}

impl GlobalDecl {
    const fn default_size() -> u8 {
        8
    }

    /// Eight-byte volatile global
    pub fn new(name: impl Into<String>, init: Value) -> Self {
        Self { name: name.into(), size: 8, init, persistent: false }
    }
}

/// A function body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Name
    pub name: String,
    /// Instructions
    pub body: Vec<Instr>,
}

/// An initial thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDecl {
    /// Entry function
    pub function: String,
    /// Value of register 0
    #[serde(default)]
    pub arg: Value,
    /// Index of an earlier initial thread this one mirrors
    #[serde(default)]
    pub symmetric_to: Option<usize>,
}

/// A complete test program
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Globals, laid out in declaration order
    #[serde(default)]
    pub globals: Vec<GlobalDecl>,
    /// Functions
    pub functions: Vec<Function>,
    /// Initial threads
    pub threads: Vec<ThreadDecl>,
    /// Function run after each crash point
    #[serde(default)]
    pub recovery: Option<String>,
}

impl Program {
    /// Index of the function called `name`
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }
}
