//! Program loading

use crate::domain::program::Program;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Failure to obtain a program
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The text is not a valid program
    #[error("invalid program: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a program from JSON text
pub fn parse_program(text: &str) -> Result<Program, LoadError> {
    Ok(serde_json::from_str(text)?)
}

/// Read and parse a program file. An unnamed program takes the file stem
/// as its name.
pub fn load_program(path: impl AsRef<Path>) -> Result<Program, LoadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut program = parse_program(&text)?;
    if program.name.is_empty() {
        if let Some(stem) = path.file_stem() {
            program.name = stem.to_string_lossy().into_owned();
        }
    }
    debug!(name = %program.name, functions = program.functions.len(), threads = program.threads.len(), "program loaded");
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "functions": [{"name": "main", "body": []}],
        "threads": [{"function": "main"}]
    }"#;

    #[test]
    fn test_parse_minimal_program() {
        let program = parse_program(MINIMAL).unwrap();
        assert_eq!(program.functions.len(), 1);
        assert!(program.globals.is_empty());
        assert_eq!(program.recovery, None);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(parse_program("{\"threads\": 3}"), Err(LoadError::Json(_))));
    }

    #[test]
    fn test_load_names_program_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.json");
        fs::File::create(&path).unwrap().write_all(MINIMAL.as_bytes()).unwrap();
        assert_eq!(load_program(&path).unwrap().name, "counter");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_program("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("here.json"));
    }
}
