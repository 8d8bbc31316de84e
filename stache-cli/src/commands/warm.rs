//! `stache warm <dir> <template>...`: precompile templates into artifacts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use stache_core::Compiler;
use stache_store::WriteResult;

/// Arguments for `stache warm`.
#[derive(Args, Debug)]
pub struct WarmArgs {
    /// Artifact directory.
    pub artifacts: PathBuf,

    /// Template files to compile.
    #[arg(required = true)]
    pub templates: Vec<PathBuf>,
}

impl WarmArgs {
    pub fn run(self) -> Result<()> {
        let compiler = Compiler::new();
        for template in &self.templates {
            compiler
                .compile_file(template)
                .with_context(|| format!("failed to compile {}", template.display()))?;
        }

        let results = stache_store::persist_all(&self.artifacts, compiler.cache())
            .with_context(|| format!("failed to persist artifacts to {}", self.artifacts.display()))?;

        let mut written = 0;
        for result in &results {
            match result {
                WriteResult::Written { path } => {
                    written += 1;
                    println!("{} {}", "wrote".green(), path.display());
                }
                WriteResult::Unchanged { path } => {
                    println!("{} {}", "unchanged".dimmed(), path.display())
                }
            }
        }
        println!(
            "{} program(s), {written} written, {} unchanged",
            results.len(),
            results.len() - written
        );
        Ok(())
    }
}
