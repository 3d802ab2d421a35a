//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// keel - object and library intermediates for installer authoring
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pack intermediates and localization files into a library
    Lib(LibArgs),

    /// Summarize an intermediate, library or localization file
    Inspect(InspectArgs),

    /// Extract the embedded payloads of a library
    Extract(ExtractArgs),

    /// List symbols and report names defined more than once
    Symbols(SymbolsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct LibArgs {
    /// Intermediate files or glob patterns
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Path of the library to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Localization files or glob patterns
    #[arg(short = 'l', long = "loc")]
    pub localizations: Vec<String>,

    /// Directory searched for payload files (repeatable, in order)
    #[arg(short = 'b', long = "bind-path")]
    pub bind_paths: Vec<PathBuf>,

    /// Write the library without embedding payloads
    #[arg(long)]
    pub no_payloads: bool,

    /// Accept inputs written by another format version
    #[arg(long)]
    pub suppress_version_check: bool,

    /// gzip level for the container, 0-9
    #[arg(long, env = "KEEL_COMPRESSION")]
    pub compression: Option<u32>,

    /// Treat warnings as errors
    #[arg(long)]
    pub warnings_as_errors: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    /// File to inspect
    pub path: PathBuf,

    /// Cultures to list, in priority order (overrides `localization.cultures`)
    #[arg(short = 'c', long = "culture")]
    pub cultures: Vec<String>,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Library to extract from
    pub library: PathBuf,

    /// Destination directory; payload `n` is written to `<out>/<n>`
    #[arg(short, long)]
    pub out: PathBuf,
}

#[derive(Args)]
pub struct SymbolsArgs {
    /// Intermediates and libraries, or glob patterns
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Only list names defined more than once
    #[arg(long)]
    pub duplicates: bool,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
