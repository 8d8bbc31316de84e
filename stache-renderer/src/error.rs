//! Error types for stache-renderer.

use std::path::PathBuf;

use stache_core::CompileError;
use thiserror::Error;

/// All errors that can abort a render.
///
/// Unresolved variables are not errors; they render as empty text.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template or partial failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The output sink rejected a write.
    #[error("failed to write render output: {0}")]
    Write(#[source] std::io::Error),

    /// No template exists for a rendered name or `{{>name}}` partial.
    #[error("template '{name}' not found at {}", .path.display())]
    PartialNotFound { name: String, path: PathBuf },

    /// Partials nested past the recursion limit.
    #[error("partial '{name}' nested {depth} levels deep; recursive partial?")]
    PartialDepth { name: String, depth: usize },

    /// Filesystem error while loading a template.
    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Host data could not be converted into a value.
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rendered bytes were not valid UTF-8.
    #[error("rendered output is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Convenience constructor for [`RenderError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}
