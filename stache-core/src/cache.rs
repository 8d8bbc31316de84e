//! Content-addressed program cache.
//!
//! Programs are keyed by the [`ContentHash`] of their lowered form. A hit
//! returns the already-built `Arc<Program>`; a miss builds and registers
//! exactly one program per hash, even when several threads race on it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CompileError;
use crate::program::{render_lowered, ContentHash, Instruction, Program};

/// Shared, thread-safe map from content hash to compiled program.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: RwLock<HashMap<ContentHash, Arc<Program>>>,
    builds: AtomicUsize,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached program for `instructions`, building it on a miss.
    pub fn compile(&self, instructions: Vec<Instruction>) -> Result<Arc<Program>, CompileError> {
        self.lookup_or_build(instructions).map(|(program, _)| program)
    }

    /// Like [`compile`](Self::compile), also reporting whether this call built
    /// the program.
    pub fn lookup_or_build(
        &self,
        instructions: Vec<Instruction>,
    ) -> Result<(Arc<Program>, bool), CompileError> {
        self.lookup_or_build_with(instructions, |_| Ok(()))
    }

    /// Like [`lookup_or_build`](Self::lookup_or_build), running `on_build`
    /// against a freshly built program before it is registered. If `on_build`
    /// fails, nothing is cached and the error is returned.
    pub fn lookup_or_build_with<F>(
        &self,
        instructions: Vec<Instruction>,
        on_build: F,
    ) -> Result<(Arc<Program>, bool), CompileError>
    where
        F: FnOnce(&Program) -> Result<(), CompileError>,
    {
        let hash = ContentHash::of(&render_lowered(&instructions));

        // Fast path: read lock only.
        if let Some(program) = self.programs.read().get(&hash) {
            tracing::debug!(%hash, "program cache hit");
            return Ok((Arc::clone(program), false));
        }

        let mut programs = self.programs.write();
        // Another thread may have built it while we waited for the lock.
        if let Some(program) = programs.get(&hash) {
            return Ok((Arc::clone(program), false));
        }
        let program = Arc::new(Program::with_hash(hash, instructions)?);
        on_build(&program)?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        programs.insert(hash, Arc::clone(&program));
        tracing::debug!(%hash, instructions = program.instructions().len(), "program built");
        Ok((program, true))
    }

    /// Register an already-built program (e.g. loaded from disk). Returns the
    /// cached instance if one with the same hash exists.
    pub fn insert(&self, program: Program) -> Arc<Program> {
        let mut programs = self.programs.write();
        Arc::clone(
            programs
                .entry(program.hash())
                .or_insert_with(|| Arc::new(program)),
        )
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Arc<Program>> {
        self.programs.read().get(hash).cloned()
    }

    /// Snapshot of every cached program.
    pub fn programs(&self) -> Vec<Arc<Program>> {
        self.programs.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.programs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of programs this cache has constructed through [`compile`](Self::compile).
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}
