//! stache: render mustache-style templates from the command line.
//!
//! # Usage
//!
//! ```text
//! stache render <template> [--context data.json|data.yaml] [--set key=value]...
//!               [--root <dir>] [--extension <ext>] [--output <file>]
//!               [--debug-dir <dir>] [--artifacts <dir>] [--debug]
//! stache dump <template> [--delimiters "<% %>"] [--json]
//! stache warm <artifacts-dir> <template>...
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{dump::DumpArgs, render::RenderArgs, warm::WarmArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "stache",
    version,
    about = "Compile and render mustache-style templates",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template file against a JSON or YAML context.
    Render(RenderArgs),

    /// Print a template's compiled program and content hash.
    Dump(DumpArgs),

    /// Compile templates and persist their programs as artifacts.
    Warm(WarmArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => args.run(),
        Commands::Dump(args) => args.run(),
        Commands::Warm(args) => args.run(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
