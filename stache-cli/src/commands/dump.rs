//! `stache dump <template>`: print the compiled program for a template.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use stache_core::{Compiler, Delimiters};

/// Arguments for `stache dump`.
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Template file to compile.
    pub template: PathBuf,

    /// Open and close markers separated by a space, e.g. "<% %>".
    #[arg(long)]
    pub delimiters: Option<String>,

    /// Print the instructions as JSON instead of the lowered text form.
    #[arg(long)]
    pub json: bool,
}

impl DumpArgs {
    pub fn run(self) -> Result<()> {
        let mut compiler = Compiler::new();
        if let Some(pair) = &self.delimiters {
            let Some((open, close)) = pair.split_once(' ') else {
                bail!("expected delimiters as \"OPEN CLOSE\", got '{pair}'");
            };
            let delimiters = Delimiters::new(open.trim(), close.trim())
                .with_context(|| format!("invalid delimiters '{pair}'"))?;
            compiler = compiler.with_delimiters(delimiters);
        }

        let compiled = compiler
            .compile_file(&self.template)
            .with_context(|| format!("failed to compile {}", self.template.display()))?;
        for warning in &compiled.warnings {
            eprintln!("{} {warning}", "warning:".yellow());
        }

        let program = &compiled.program;
        if self.json {
            let json = serde_json::json!({
                "hash": program.hash(),
                "instructions": program.instructions(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            println!("# Program{}", program.hash());
            print!("{}", program.lowered());
        }
        Ok(())
    }
}
