//! otter-load - load, link and evaluate an ES module graph from the command line.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "otter-load",
    version,
    about = "Load, link and evaluate an ES module graph",
    long_about = "Loads an entry module and its imports, evaluates them once, and prints the result.\n\n\
                  Print exports:  otter-load run main.js\n\
                  Inspect graph:  otter-load graph main.js --json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an entry module and print its exports as JSON
    Run(commands::run::RunCommand),

    /// Load an entry module and print the module graph
    Graph(commands::graph::GraphCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "otter_loader=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match &cli.command {
        Commands::Run(cmd) => cmd.run(config).await,
        Commands::Graph(cmd) => cmd.run(config).await,
    }
}
