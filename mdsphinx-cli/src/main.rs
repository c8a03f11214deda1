//! mdsphinx: markdown to PDF, HTML and Confluence through Sphinx.
//!
//! # Usage
//!
//! ```text
//! mdsphinx env add --name <name> --path <path>
//! mdsphinx env del --name <name>
//! mdsphinx env list
//! mdsphinx env create [--name <name>] [--python <path>] [--package <pkg>]... [--recreate] [--no-prompt]
//! mdsphinx env remove [--name <name>] [--no-prompt]
//! mdsphinx prepare <input> [--context <path>] [--env-name <name>] [--tmp-root <path>] [--overwrite]
//! mdsphinx process <input> [--to pdf|html|confluence] [--using default|single] [--show-output] ...
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{env::EnvCommand, prepare::PrepareArgs, process::ProcessArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mdsphinx",
    version,
    about = "Convert markdown to PDF, HTML or Confluence pages with Sphinx",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage isolated Sphinx environments.
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },

    /// Render the input into a fresh output directory without building.
    Prepare(PrepareArgs),

    /// Render and build the input into the requested format.
    Process(ProcessArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Env { command } => commands::env::run(command),
        Commands::Prepare(args) => args.run(),
        Commands::Process(args) => args.run(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
