//! Template loaders: where `render(name)` and `{{>name}}` find their source.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use stache_core::{Compiler, Program};

use crate::error::{io_err, RenderError};

/// Extension appended to template names that have none.
pub const DEFAULT_EXTENSION: &str = "mustache";

/// Source of compiled programs by template name.
pub trait TemplateLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<Arc<Program>, RenderError>;

    /// Compiler used for templates this loader produces.
    fn compiler(&self) -> &Arc<Compiler>;
}

// ---------------------------------------------------------------------------
// FileLoader
// ---------------------------------------------------------------------------

/// Loads templates from files under a root directory.
///
/// `{{>header}}` reads `<root>/header.mustache`; a name that already has an
/// extension (`{{>layout.html}}`) is used as-is. Compiled programs are
/// memoized per name for the loader's lifetime.
#[derive(Debug)]
pub struct FileLoader {
    compiler: Arc<Compiler>,
    root: PathBuf,
    extension: String,
    loaded: RwLock<HashMap<String, Arc<Program>>>,
}

impl FileLoader {
    pub fn new(compiler: Arc<Compiler>, root: impl Into<PathBuf>) -> Self {
        FileLoader {
            compiler,
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a template name maps to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        if Path::new(name).extension().is_some() || self.extension.is_empty() {
            self.root.join(name)
        } else {
            self.root.join(format!("{name}.{}", self.extension))
        }
    }
}

impl TemplateLoader for FileLoader {
    fn load(&self, name: &str) -> Result<Arc<Program>, RenderError> {
        if let Some(program) = self.loaded.read().get(name) {
            return Ok(Arc::clone(program));
        }

        let path = self.path_for(name);
        let source = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RenderError::PartialNotFound {
                name: name.to_string(),
                path: path.clone(),
            },
            _ => io_err(&path, e),
        })?;
        let program = self.compiler.compile(&source)?.program;
        tracing::debug!(name, path = %path.display(), hash = %program.hash(), "loaded template");

        self.loaded
            .write()
            .insert(name.to_string(), Arc::clone(&program));
        Ok(program)
    }

    fn compiler(&self) -> &Arc<Compiler> {
        &self.compiler
    }
}

// ---------------------------------------------------------------------------
// MemoryLoader
// ---------------------------------------------------------------------------

/// Loads templates from an in-memory name-to-source map.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    compiler: Arc<Compiler>,
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new(compiler: Arc<Compiler>) -> Self {
        MemoryLoader {
            compiler,
            templates: HashMap::new(),
        }
    }

    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }
}

impl TemplateLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<Arc<Program>, RenderError> {
        let source = self
            .templates
            .get(name)
            .ok_or_else(|| RenderError::PartialNotFound {
                name: name.to_string(),
                path: PathBuf::from(name),
            })?;
        // Repeat loads are cache hits in the compiler's program cache.
        Ok(self.compiler.compile(source)?.program)
    }

    fn compiler(&self) -> &Arc<Compiler> {
        &self.compiler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader(dir: &TempDir) -> FileLoader {
        FileLoader::new(Arc::new(Compiler::new()), dir.path())
    }

    #[test]
    fn appends_default_extension() {
        let tmp = TempDir::new().unwrap();
        let loader = loader(&tmp);
        assert_eq!(loader.path_for("header"), tmp.path().join("header.mustache"));
        assert_eq!(loader.path_for("page.html"), tmp.path().join("page.html"));
        let loader = loader.with_extension(".tpl");
        assert_eq!(loader.path_for("header"), tmp.path().join("header.tpl"));
    }

    #[test]
    fn loads_and_memoizes_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("hello.mustache"), "Hi {{name}}").unwrap();
        let loader = loader(&tmp);
        let first = loader.load("hello").unwrap();
        std::fs::remove_file(tmp.path().join("hello.mustache")).unwrap();
        let second = loader.load("hello").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = loader(&tmp).load("ghost").unwrap_err();
        match err {
            RenderError::PartialNotFound { name, path } => {
                assert_eq!(name, "ghost");
                assert_eq!(path, tmp.path().join("ghost.mustache"));
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn compile_errors_propagate() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("bad.mustache"), "{{#a}}").unwrap();
        assert!(matches!(
            loader(&tmp).load("bad"),
            Err(RenderError::Compile(_))
        ));
    }

    #[test]
    fn memory_loader_serves_registered_names() {
        let loader = MemoryLoader::new(Arc::new(Compiler::new())).with_template("a", "A");
        assert_eq!(loader.load("a").unwrap().lowered(), "literal \"A\"\n");
        assert!(matches!(
            loader.load("b"),
            Err(RenderError::PartialNotFound { .. })
        ));
    }
}
