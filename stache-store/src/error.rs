//! Error types for stache-store.

use std::path::PathBuf;

use stache_core::CompileError;
use thiserror::Error;

/// All errors that can arise while persisting or loading program artifacts.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact JSON could not be read or written.
    #[error("artifact JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored instructions do not hash to the artifact's name.
    #[error("artifact {path} is corrupt: expected hash {expected}, found {found}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// An artifact file name that does not carry a valid content hash.
    #[error("invalid artifact name '{0}'")]
    InvalidHash(String),

    /// Stored instructions no longer form a valid program.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
