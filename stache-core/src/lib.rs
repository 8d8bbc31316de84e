//! # stache-core
//!
//! Template compiler: scans `{{...}}` templates, parses them into a node
//! tree, lowers the tree to a flat instruction sequence, and caches the
//! resulting [`Program`]s by content hash.
//!
//! ## Usage
//!
//! ```rust
//! use stache_core::{Compiler, Instruction};
//!
//! let compiler = Compiler::new();
//! let compiled = compiler.compile("Hello {{name}}!").unwrap();
//! assert_eq!(
//!     compiled.program.instructions()[1],
//!     Instruction::EmitVariable { path: "name".into(), escape: true },
//! );
//! ```

pub mod cache;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod program;

pub use cache::ProgramCache;
pub use compiler::{Compiled, Compiler};
pub use error::{CompileError, StructuralError};
pub use lexer::Delimiters;
pub use parser::{Node, Warning};
pub use program::{ContentHash, Instruction, Program};
