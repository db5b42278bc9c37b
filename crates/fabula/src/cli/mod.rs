//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod run;

pub use run::{run_render, show_voices};

/// Turn prose into a rendered video.
#[derive(Debug, Parser)]
#[command(name = "fabula", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render a text file into a final video
    Render(RenderArgs),
    /// List the built-in voice catalog
    Voices,
}

/// Arguments for the render command.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Path of the input text file
    pub input: PathBuf,

    /// Settings file overriding the bundled defaults
    #[arg(long)]
    pub settings: Option<String>,

    /// Analyze in one window instead of chunked mode
    #[arg(long)]
    pub simple: bool,

    /// Cap on extracted scenes
    #[arg(long)]
    pub max_scenes: Option<usize>,

    /// Cap on extracted characters
    #[arg(long)]
    pub max_characters: Option<usize>,

    /// Synthesize one audio unit per dialogue line instead of one per scene
    #[arg(long)]
    pub per_line: bool,

    /// Stage-3 fan-out bound
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Keep the scratch tree when the job fails
    #[arg(long)]
    pub retain_scratch: bool,

    /// Overall job deadline in seconds
    #[arg(long)]
    pub job_timeout: Option<u64>,
}
