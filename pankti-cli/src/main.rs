//! # pankti CLI
//!
//! Terminal playground for the Pankti guest module.

mod commands;
mod editor;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pankti")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (pankti.yml is used when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Guest module artifact, overrides the configuration
    #[arg(long, env = "PANKTI_MODULE")]
    module: Option<PathBuf>,

    /// Show guest stderr on the terminal's stderr instead of merging it
    #[arg(long)]
    split_streams: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file once
    Run {
        /// Source file to run
        file: PathBuf,

        /// Emit captured stdout/stderr as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit and run programs interactively
    Repl,

    /// Print the sample program
    Sample,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so guest output stays clean
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let load_config = || {
        commands::load_config(
            cli.config.as_deref(),
            cli.module.as_deref(),
            cli.split_streams,
        )
    };

    match &cli.command {
        Commands::Run { file, json } => commands::run_file(&load_config()?, file, *json).await,
        Commands::Repl => commands::repl(&load_config()?).await,
        Commands::Sample => {
            commands::print_sample();
            Ok(ExitCode::SUCCESS)
        }
    }
}
