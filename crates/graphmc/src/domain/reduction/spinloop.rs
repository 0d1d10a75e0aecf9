//! Spin-loop summarisation
//!
//! A spin loop re-reads one location until it sees the value it waits for:
//!
//! ```text
//! head:  r1 = load x            (or r1 = cas(x, e, n))
//!        ... pure assigns ...
//! back:  if cond goto head
//! ```
//!
//! Every iteration but the last is invisible to the rest of the program, so
//! the back edge can be replaced by `assume(!cond)`: the thread performs the
//! final iteration only, and blocks on a branch where it would have spun.
//! The rewrite is unsound when iterations differ, so such loops are kept.

use crate::domain::program::{Expr, Instr, Program, Reg};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// A loop in a function body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoopSite {
    /// Function name
    pub function: String,
    /// First instruction of the loop
    pub head: usize,
    /// The backward branch
    pub back_edge: usize,
}

impl fmt::Display for LoopSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}", self.function, self.head, self.back_edge)
    }
}

/// Why a spin loop was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// An access operand or the exit condition changes between iterations
    VaryingOperand,
    /// The loop can be left or entered other than through its back edge
    MultipleExits,
    /// A value carried across iterations is used after the loop
    EscapingValue,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VaryingOperand => "operand varies across iterations",
            Self::MultipleExits => "loop has several exits",
            Self::EscapingValue => "loop-carried value escapes",
        })
    }
}

/// Outcome of summarisation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinloopReport {
    /// Loops replaced by an assumption
    pub summarized: Vec<LoopSite>,
    /// Loops kept, with the reason
    pub rejected: Vec<(LoopSite, RejectReason)>,
}

/// Replace every eligible spin loop of `program` by an assumption.
pub fn summarize_spinloops(program: &Program) -> (Program, SpinloopReport) {
    let mut out = program.clone();
    let mut report = SpinloopReport::default();
    for function in &mut out.functions {
        for back in 0..function.body.len() {
            let Instr::Branch { cond, target } = &function.body[back] else {
                continue;
            };
            let head = *target;
            if head > back || !is_spin_candidate(&function.body[head..back]) {
                continue;
            }
            let site = LoopSite { function: function.name.clone(), head, back_edge: back };
            match classify(&function.body, head, back, cond) {
                Ok(()) => {
                    debug!(%site, "spin loop summarised");
                    let cond = Expr::Not(Box::new(cond.clone()));
                    function.body[back] = Instr::Assume { cond, spinloop: true };
                    report.summarized.push(site);
                }
                Err(reason) => {
                    warn!(%site, %reason, "spin loop kept");
                    report.rejected.push((site, reason));
                }
            }
        }
    }
    (out, report)
}

/// One load or CAS; nothing else but local instructions
fn is_spin_candidate(body: &[Instr]) -> bool {
    let mut accesses = body.iter().filter(|i| !i.is_local());
    let Some(access) = accesses.next() else {
        return false;
    };
    accesses.next().is_none()
        && match access {
            Instr::Load { .. } => true,
            Instr::Rmw { op, .. } => op.is_cas(),
            _ => false,
        }
}

fn is_failure_test(cond: &Expr, dst: Reg, expected: &Expr) -> bool {
    let Expr::Ne(a, b) = cond else {
        return false;
    };
    let is_dst = |e: &Expr| *e == Expr::Reg(dst);
    (is_dst(a) && **b == *expected) || (is_dst(b) && **a == *expected)
}

fn classify(body: &[Instr], head: usize, back: usize, cond: &Expr) -> Result<(), RejectReason> {
    let inner = &body[head..back];

    let enters = body
        .iter()
        .enumerate()
        .filter(|(i, _)| *i < head || *i > back)
        .any(|(_, instr)| instr.target().map_or(false, |t| t > head && t <= back));
    if enters || inner.iter().any(|i| i.target().is_some()) {
        return Err(RejectReason::MultipleExits);
    }

    let access = inner.iter().find(|i| !i.is_local()).ok_or(RejectReason::MultipleExits)?;
    if let Instr::Rmw { dst, op, .. } = access {
        let expected = op.operands().first().copied().cloned().unwrap_or_default();
        if !is_failure_test(cond, *dst, &expected) {
            return Err(RejectReason::MultipleExits);
        }
    }

    let defined_inside: HashSet<Reg> = inner.iter().filter_map(Instr::def).collect();
    let mut seen = HashSet::new();
    let mut carried = HashSet::new();
    for instr in inner {
        for r in instr.uses() {
            if defined_inside.contains(&r) && !seen.contains(&r) {
                carried.insert(r);
            }
        }
        seen.extend(instr.def());
    }

    let mut tainted = carried;
    for instr in inner.iter().filter(|i| i.is_local()) {
        if let Some(dst) = instr.def() {
            if instr.uses().iter().any(|r| tainted.contains(r)) {
                tainted.insert(dst);
            }
        }
    }

    if access.uses().iter().any(|r| defined_inside.contains(r))
        || cond.registers().iter().any(|r| tainted.contains(r))
    {
        return Err(RejectReason::VaryingOperand);
    }

    let outside = body[..head].iter().chain(&body[back + 1..]);
    if outside.flat_map(Instr::uses).any(|r| tainted.contains(&r)) {
        return Err(RejectReason::EscapingValue);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::MemoryOrder;
    use crate::domain::program::{Function, GlobalDecl, RmwExpr, ThreadDecl};

    fn program(body: Vec<Instr>) -> Program {
        Program {
            name: "spin".into(),
            globals: vec![GlobalDecl::new("x", 0), GlobalDecl::new("y", 0)],
            functions: vec![Function { name: "main".into(), body }],
            threads: vec![ThreadDecl { function: "main".into(), arg: 0, symmetric_to: None }],
            recovery: None,
        }
    }

    fn ne(a: Expr, b: Expr) -> Expr {
        Expr::Ne(Box::new(a), Box::new(b))
    }

    fn load(dst: Reg) -> Instr {
        Instr::Load { dst, addr: Expr::global("x"), size: None, order: MemoryOrder::Acquire }
    }

    fn cas(expected: Expr) -> Instr {
        Instr::Rmw {
            dst: 1,
            addr: Expr::global("x"),
            op: RmwExpr::CompareExchange { expected, new: Expr::Const(1) },
            size: None,
            order: MemoryOrder::Acquire,
        }
    }

    #[test]
    fn test_cas_lock_is_summarised() {
        let (out, report) = summarize_spinloops(&program(vec![
            cas(Expr::Const(0)),
            Instr::Branch { cond: ne(Expr::reg(1), Expr::Const(0)), target: 0 },
            Instr::Store { addr: Expr::global("x"), value: Expr::Const(0), size: None, order: MemoryOrder::Release },
        ]));
        assert_eq!(report.summarized.len(), 1);
        assert!(report.rejected.is_empty());
        assert!(matches!(out.functions[0].body[1], Instr::Assume { spinloop: true, .. }));
    }

    #[test]
    fn test_await_load_is_summarised() {
        let (_, report) = summarize_spinloops(&program(vec![
            load(1),
            Instr::Branch { cond: ne(Expr::reg(1), Expr::Const(1)), target: 0 },
        ]));
        assert_eq!(report.summarized, vec![LoopSite { function: "main".into(), head: 0, back_edge: 1 }]);
    }

    #[test]
    fn test_varying_comparison_rejected() {
        let (out, report) = summarize_spinloops(&program(vec![
            cas(Expr::reg(2)),
            Instr::Assign { dst: 2, value: Expr::reg(1) },
            Instr::Branch { cond: ne(Expr::reg(1), Expr::reg(2)), target: 0 },
        ]));
        assert_eq!(report.rejected[0].1, RejectReason::VaryingOperand);
        assert!(matches!(out.functions[0].body[2], Instr::Branch { .. }));
    }

    #[test]
    fn test_second_exit_rejected() {
        let (_, report) = summarize_spinloops(&program(vec![
            load(1),
            Instr::Branch { cond: Expr::Eq(Box::new(Expr::reg(1)), Box::new(Expr::Const(2))), target: 3 },
            Instr::Branch { cond: ne(Expr::reg(1), Expr::Const(1)), target: 0 },
            Instr::Assert { cond: Expr::Const(1), message: String::new() },
        ]));
        assert_eq!(report.rejected[0].1, RejectReason::MultipleExits);
    }

    #[test]
    fn test_escaping_counter_rejected() {
        let (_, report) = summarize_spinloops(&program(vec![
            load(1),
            Instr::Assign { dst: 3, value: Expr::Add(Box::new(Expr::reg(3)), Box::new(Expr::Const(1))) },
            Instr::Branch { cond: ne(Expr::reg(1), Expr::Const(1)), target: 0 },
            Instr::Store { addr: Expr::global("y"), value: Expr::reg(3), size: None, order: MemoryOrder::Relaxed },
        ]));
        assert_eq!(report.rejected[0].1, RejectReason::EscapingValue);
    }

    #[test]
    fn test_loop_with_store_is_not_a_spin_loop() {
        let (_, report) = summarize_spinloops(&program(vec![
            load(1),
            Instr::Store { addr: Expr::global("y"), value: Expr::reg(1), size: None, order: MemoryOrder::Relaxed },
            Instr::Branch { cond: ne(Expr::reg(1), Expr::Const(1)), target: 0 },
        ]));
        assert_eq!(report, SpinloopReport::default());
    }
}
