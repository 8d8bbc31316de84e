//! # stache-renderer
//!
//! Runtime for compiled stache programs: the host value model, the scope
//! chain that resolves dotted paths against it, and the render session that
//! executes a [`Program`](stache_core::Program) into an output sink.
//!
//! ## Usage
//!
//! ```rust
//! use serde_json::json;
//! use stache_renderer::Engine;
//!
//! let engine = Engine::in_memory([("greeting", "Hello {{name}}!")]);
//! let out = engine.render("greeting", json!({"name": "World"})).unwrap();
//! assert_eq!(out, "Hello World!");
//! ```

pub mod deferred;
pub mod engine;
pub mod error;
pub mod escape;
pub mod loader;
pub mod object;
pub mod scope;
pub mod session;
pub mod value;

pub use deferred::{Completer, Deferred};
pub use engine::Engine;
pub use error::RenderError;
pub use escape::escape_html;
pub use loader::{FileLoader, MemoryLoader, TemplateLoader};
pub use object::{Accessor, AccessorCache, IntoMember, Lookup, MemberKind, MemberTable, Object};
pub use scope::{Resolved, Scope};
pub use session::{RenderSession, MAX_PARTIAL_DEPTH};
pub use value::Value;
