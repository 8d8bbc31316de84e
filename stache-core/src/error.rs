//! Error types for stache-core.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed tag structure. Always fatal; carries the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// A closing tag did not match the most recently opened section.
    #[error("mismatched start/end tags: {expected} != {found} at line {line}")]
    Mismatched {
        expected: String,
        found: String,
        line: usize,
    },

    /// A closing tag appeared with no section open.
    #[error("closing tag '{found}' at line {line} has no matching start tag")]
    UnexpectedClose { found: String, line: usize },

    /// The template ended while a section was still open.
    #[error("section '{name}' opened at line {line} is never closed")]
    Unclosed { name: String, line: usize },

    /// An open marker with no close marker before end of input.
    #[error("unterminated tag opened at line {line}")]
    Unterminated { line: usize },

    /// A `{{{name}}` tag missing its third closing brace.
    #[error("unescaped tag not terminated properly at line {line}")]
    UnterminatedUnescaped { line: usize },

    /// A tag with nothing between the markers.
    #[error("empty tag at line {line}")]
    EmptyTag { line: usize },
}

impl StructuralError {
    /// Line the error was detected on.
    pub fn line(&self) -> usize {
        match self {
            StructuralError::Mismatched { line, .. }
            | StructuralError::UnexpectedClose { line, .. }
            | StructuralError::Unclosed { line, .. }
            | StructuralError::Unterminated { line }
            | StructuralError::UnterminatedUnescaped { line }
            | StructuralError::EmptyTag { line } => *line,
        }
    }
}

/// All errors that can arise while compiling a template.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Tag structure error.
    #[error("template structure error: {0}")]
    Structural(#[from] StructuralError),

    /// Failure reading a template file.
    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reading a template stream.
    #[error("failed to read template: {0}")]
    Read(#[source] std::io::Error),

    /// Lowering or program construction failed.
    #[error("failed to compile template: {0}")]
    Compile(String),

    /// The debug dump of a lowered program could not be written.
    #[error("failed to write debug dump at {path}: {source}")]
    DebugDump {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`CompileError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CompileError {
    CompileError::Io {
        path: path.into(),
        source,
    }
}
