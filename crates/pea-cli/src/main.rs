//! # pea-cli
//!
//! Registry tooling for the Pea package manager.
//!
//! This is the main entry point for the `pea` binary. It handles command parsing,
//! sets up logging and error handling, and dispatches to the command handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pea_core::error::PeaResult;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Registry tooling for the Pea package manager
#[derive(Parser)]
#[command(name = "pea", version, about = "Pea registry tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Registry for unscoped packages
    #[arg(long, global = true, value_name = "URL")]
    pub registry: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which connection pool each URL is fetched through
    Agent {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },
    /// Show the latest version of a package
    View {
        package: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    info!("Starting Pea CLI v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("{}", ErrorFormatter::new().format_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: Cli) -> PeaResult<()> {
    // Create Tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| pea_core::error::PeaError::io("Failed to create async runtime".to_string(), e))?;

    rt.block_on(async {
        let ctx = CommandContext::new(cli.registry).await?;
        commands::dispatch_command(cli.command, &ctx).await
    })
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("pea={0},pea_registry={0},pea_config={0}", level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Pea encountered an unexpected error: {}", panic_info);
        eprintln!("Pea crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/pea-lang/pea/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
