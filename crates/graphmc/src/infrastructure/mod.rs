//! Infrastructure Layer - External Formats
//!
//! Everything that touches the file system or a wire format lives here:
//! reading JSON test programs into the domain IR.

pub mod loader;

pub use loader::{load_program, parse_program, LoadError};
