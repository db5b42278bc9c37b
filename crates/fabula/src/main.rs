//! Fabula CLI binary.
//!
//! Command-line access to the prose-to-video pipeline:
//! - Render a text file into a final MP4, streaming progress as JSON lines
//! - Inspect the built-in voice catalog

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{run_render, show_voices, Cli, Commands};

    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render(args) => run_render(args).await?,
        Commands::Voices => show_voices(),
    }

    Ok(())
}
