//! Veil command-line tool
//!
//! Inspects proxy contracts over a JSON type catalog: which types can be
//! proxied, and what a generated proxy type would look like.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use veil_engine::FactoryOptions;

use crate::output::{resolve_color_choice, StyledOutput};

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Dynamic proxy inspection tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Factory options file (reads its `[proxy]` table)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// When to color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether types can be proxied
    Check {
        /// Type catalog (JSON)
        #[arg(short, long)]
        catalog: PathBuf,
        /// Qualified type names; every catalog type when empty
        types: Vec<String>,
    },

    /// Show the proxy type generated for a contract
    Select {
        /// Type catalog (JSON)
        #[arg(short, long)]
        catalog: PathBuf,
        /// Qualified name of the base type
        base: String,
        /// Additional interfaces
        #[arg(short, long = "interface")]
        interfaces: Vec<String>,
    },

    /// Display version and environment info
    Info,
}

fn main() -> anyhow::Result<()> {
    if let Ok(filter) = EnvFilter::try_from_env("VEIL_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    let options = match &cli.config {
        Some(path) => FactoryOptions::from_file(path)?,
        None => FactoryOptions::default(),
    };

    match cli.command {
        Commands::Check { catalog, types } => commands::check::execute(&mut out, &catalog, &types),
        Commands::Select {
            catalog,
            base,
            interfaces,
        } => commands::select::execute(&mut out, &catalog, &base, &interfaces, options),
        Commands::Info => commands::info::execute(&mut out, &options),
    }
}
