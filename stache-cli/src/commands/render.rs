//! `stache render <template>`: render a template file to stdout or a file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use stache_core::Compiler;
use stache_renderer::{loader::DEFAULT_EXTENSION, Engine, FileLoader, Value};

/// Arguments for `stache render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Template file to render.
    pub template: PathBuf,

    /// Directory partials are resolved against. Defaults to the template's directory.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Context data file (.json, .yaml or .yml).
    #[arg(long, short = 'c')]
    pub context: Option<PathBuf>,

    /// Bind a root-scope value, shadowing the context. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_binding)]
    pub bindings: Vec<(String, String)>,

    /// Extension appended to partial names that have none.
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    pub extension: String,

    /// Write each compiled program's lowered form into this directory.
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,

    /// Write output here instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Warm the program cache from, and persist new programs to, this directory.
    #[arg(long, env = "STACHE_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// Log section entry while rendering (visible with RUST_LOG=debug).
    #[arg(long)]
    pub debug: bool,
}

fn parse_binding(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Read a JSON or YAML context file into a document value.
pub fn load_context(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read context {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let value = match ext.as_deref() {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON in {}", path.display()))?,
        Some("yaml" | "yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("invalid YAML in {}", path.display()))?,
        _ => bail!(
            "unsupported context format '{}'; expected .json, .yaml or .yml",
            path.display()
        ),
    };
    Ok(value)
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => self
                .template
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };

        let mut compiler = Compiler::new();
        if let Some(dir) = &self.debug_dir {
            compiler = compiler.with_debug_dir(dir);
        }
        if let Some(dir) = &self.artifacts {
            let loaded = stache_store::warm(compiler.cache(), dir)
                .with_context(|| format!("failed to warm artifacts from {}", dir.display()))?;
            tracing::debug!(loaded, "loaded program artifacts");
        }

        let loader = FileLoader::new(Arc::new(compiler), &root).with_extension(&self.extension);
        let engine = Engine::new(loader).with_debug(self.debug);

        let compiled = engine
            .compiler()
            .compile_file(&self.template)
            .with_context(|| format!("failed to compile {}", self.template.display()))?;
        for warning in &compiled.warnings {
            eprintln!("{} {warning}", "warning:".yellow());
        }

        let data = match &self.context {
            Some(path) => Value::Node(load_context(path)?),
            None => Value::Node(serde_json::Value::Object(Default::default())),
        };
        let mut scope = engine.scope(data);
        for (key, value) in self.bindings {
            scope = scope.bind(key, value);
        }

        let render_context = || format!("failed to render {}", self.template.display());
        match &self.output {
            Some(path) => {
                let out = engine
                    .render_program(&compiled.program, &scope)
                    .with_context(render_context)?;
                std::fs::write(path, out)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            None => {
                let stdout = std::io::stdout();
                let mut lock = engine
                    .render_to(&compiled.program, &scope, stdout.lock())
                    .with_context(render_context)?;
                lock.flush().context("failed to flush stdout")?;
            }
        }

        if let Some(dir) = &self.artifacts {
            let results = stache_store::persist_all(dir, engine.compiler().cache())
                .with_context(|| format!("failed to persist artifacts to {}", dir.display()))?;
            tracing::debug!(artifacts = results.len(), "persisted program artifacts");
        }

        Ok(())
    }
}
