//! Compiler facade: scan, parse, lower, and cache in one call.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::ProgramCache;
use crate::error::{io_err, CompileError};
use crate::lexer::{scan, Delimiters};
use crate::parser::{parse, Warning};
use crate::program::{lower, Program};

/// Result of compiling one template.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub program: Arc<Program>,
    pub warnings: Vec<Warning>,
}

/// Template compiler.
///
/// Compiles on one instance are serialized; distinct instances are
/// independent. Programs land in the instance's [`ProgramCache`], which may
/// be shared between compilers via [`Compiler::with_cache`].
#[derive(Debug)]
pub struct Compiler {
    delimiters: Delimiters,
    debug_dir: Option<PathBuf>,
    cache: Arc<ProgramCache>,
    lock: Mutex<()>,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler {
            delimiters: Delimiters::default(),
            debug_dir: None,
            cache: Arc::new(ProgramCache::new()),
            lock: Mutex::new(()),
        }
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Write each newly built program's lowered form to `dir/Program<hash>.txt`.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn with_cache(mut self, cache: Arc<ProgramCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<ProgramCache> {
        &self.cache
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Compile template text.
    pub fn compile(&self, source: &str) -> Result<Compiled, CompileError> {
        let _guard = self.lock.lock();
        let tokens = scan(source, &self.delimiters)?;
        let parsed = parse(tokens)?;
        let instructions = lower(&parsed.nodes);

        let (program, _) = self
            .cache
            .lookup_or_build_with(instructions, |program| self.dump(program))?;

        Ok(Compiled {
            program,
            warnings: parsed.warnings,
        })
    }

    /// Compile a template read to completion from `reader`.
    pub fn compile_reader<R: Read>(&self, mut reader: R) -> Result<Compiled, CompileError> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(CompileError::Read)?;
        self.compile(&source)
    }

    /// Compile the template file at `path`, read as given. Root-relative
    /// lookup by name belongs to the renderer's loaders.
    pub fn compile_file(&self, path: &Path) -> Result<Compiled, CompileError> {
        let source = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let compiled = self.compile(&source)?;
        tracing::debug!(path = %path.display(), hash = %compiled.program.hash(), "compiled template file");
        Ok(compiled)
    }

    fn dump(&self, program: &Program) -> Result<(), CompileError> {
        let Some(dir) = &self.debug_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir).map_err(|source| CompileError::DebugDump {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(format!("Program{}.txt", program.hash()));
        std::fs::write(&path, program.lowered())
            .map_err(|source| CompileError::DebugDump { path, source })
    }
}
