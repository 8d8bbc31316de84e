//! # stache-store
//!
//! Optional persistence for compiled programs: artifacts are written as JSON
//! into a namespace-shaped directory tree and loaded back to warm a
//! [`ProgramCache`](stache_core::ProgramCache) on the next start.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use stache_core::Compiler;
//!
//! let compiler = Compiler::new();
//! let root = Path::new("target/stache");
//! stache_store::warm(compiler.cache(), root).unwrap();
//! compiler.compile("Hello {{name}}").unwrap();
//! stache_store::persist_all(root, compiler.cache()).unwrap();
//! ```

pub mod artifact;
pub mod error;

pub use artifact::{
    artifact_path, load, namespace_dir, persist, persist_all, warm, ArtifactFile, WriteResult,
    NAMESPACE,
};
pub use error::StoreError;
