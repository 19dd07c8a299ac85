//! Kompile CLI - build-phase compile orchestrator
//!
//! Entry point for the kompile command-line application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use kompile::cli::output::{display_error, OutputConfig};
use kompile::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Apply output configuration globally
    let output_config = OutputConfig::new(cli.quiet, cli.json, cli.verbose);
    output_config.apply_global();

    // Initialize tracing subscriber; RUST_LOG directives take precedence
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(output_config.log_level()).into())
                .from_env_lossy(),
        )
        .init();

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
