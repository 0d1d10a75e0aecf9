//! Test Programs
//!
//! A small JSON-serialisable register-machine IR for concurrent test
//! programs, and the interpreter that turns it into an event stream.
//!
//! ```rust
//! use graphmc::domain::program::{Interpreter, Program};
//!
//! let json = r#"{
//!     "globals": [{"name": "x"}],
//!     "functions": [{"name": "main", "body": [
//!         {"op": "store", "addr": {"global": "x"}, "value": {"const": 1}}
//!     ]}],
//!     "threads": [{"function": "main"}, {"function": "main"}]
//! }"#;
//! let program: Program = serde_json::from_str(json).unwrap();
//! assert!(Interpreter::new(&program).is_ok());
//! ```

pub mod interpreter;
pub mod ir;

pub use interpreter::{Interpreter, GLOBAL_BASE, GLOBAL_STRIDE};
pub use ir::{Expr, Function, GlobalDecl, Instr, Program, Reg, RmwExpr, ThreadDecl};

use thiserror::Error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Program Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Malformed program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    /// No initial thread
    #[error("program declares no threads")]
    NoThreads,

    /// Reference to an undeclared function
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    /// Reference to an undeclared global
    #[error("unknown global `{0}`")]
    UnknownGlobal(String),

    /// Two globals with one name
    #[error("duplicate global `{0}`")]
    DuplicateGlobal(String),

    /// Width other than 1, 2, 4 or 8
    #[error("global `{name}` has unsupported size {size}")]
    BadSize {
        /// Global
        name: String,
        /// Declared width
        size: u8,
    },

    /// Control flow leaving the function body
    #[error("{function}:{index}: jump target {target} out of range")]
    BadTarget {
        /// Function holding the jump
        function: String,
        /// Index of the jump
        index: usize,
        /// Target index
        target: usize,
    },

    /// Initial thread mirroring itself or a later thread
    #[error("thread {thread} cannot mirror thread {sibling}")]
    BadSibling {
        /// Mirroring thread
        thread: usize,
        /// Thread it names
        sibling: usize,
    },
}
