//! Rendering facade: [`Engine`] ties a loader, its compiler, and an
//! accessor cache together.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use stache_core::{Compiler, Program};

use crate::error::RenderError;
use crate::loader::{FileLoader, MemoryLoader, TemplateLoader};
use crate::object::AccessorCache;
use crate::scope::Scope;
use crate::session::RenderSession;
use crate::value::Value;

/// Compiles and renders templates.
///
/// An `Engine` is `Send + Sync`; one instance can serve concurrent renders.
/// Each render runs in its own [`RenderSession`] against a fresh root
/// [`Scope`].
pub struct Engine {
    loader: Box<dyn TemplateLoader>,
    accessors: Arc<AccessorCache>,
    debug: bool,
}

impl Engine {
    pub fn new(loader: impl TemplateLoader + 'static) -> Self {
        Engine {
            loader: Box::new(loader),
            accessors: AccessorCache::global(),
            debug: false,
        }
    }

    /// Engine reading `<root>/<name>.mustache` with a default compiler.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::new(FileLoader::new(Arc::new(Compiler::new()), root))
    }

    /// Engine over in-memory `(name, source)` templates.
    pub fn in_memory<N, S>(templates: impl IntoIterator<Item = (N, S)>) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        let mut loader = MemoryLoader::new(Arc::new(Compiler::new()));
        for (name, source) in templates {
            loader.insert(name, source);
        }
        Self::new(loader)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_accessors(mut self, accessors: Arc<AccessorCache>) -> Self {
        self.accessors = accessors;
        self
    }

    pub fn compiler(&self) -> &Compiler {
        self.loader.compiler()
    }

    pub fn accessors(&self) -> &AccessorCache {
        &self.accessors
    }

    /// Root scope over `data`, sharing this engine's accessor cache.
    pub fn scope(&self, data: impl Into<Value>) -> Scope<'_> {
        Scope::root(data, &self.accessors)
    }

    pub fn compile_str(&self, source: &str) -> Result<Arc<Program>, RenderError> {
        Ok(self.compiler().compile(source)?.program)
    }

    /// Compile `source` and render it against `data`.
    pub fn render_str(&self, source: &str, data: impl Into<Value>) -> Result<String, RenderError> {
        let program = self.compile_str(source)?;
        self.render_program(&program, &self.scope(data))
    }

    /// Render the template the loader finds under `name`.
    pub fn render(&self, name: &str, data: impl Into<Value>) -> Result<String, RenderError> {
        let program = self.loader.load(name)?;
        self.render_program(&program, &self.scope(data))
    }

    pub fn render_program(&self, program: &Program, scope: &Scope<'_>) -> Result<String, RenderError> {
        let mut out = Vec::new();
        self.render_to(program, scope, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    /// Render into an arbitrary sink. Output already written stays written
    /// if the render fails part-way.
    pub fn render_to<W: Write>(
        &self,
        program: &Program,
        scope: &Scope<'_>,
        out: W,
    ) -> Result<W, RenderError> {
        let mut session = RenderSession::new(out, self.loader.as_ref()).with_debug(self.debug);
        session.run(program, scope)?;
        Ok(session.into_inner())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("compiler", self.compiler())
            .field("accessors", &self.accessors)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
