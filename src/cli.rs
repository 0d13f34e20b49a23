//! CLI argument surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "subrecon",
    version,
    about = "Concurrent subdomain reconnaissance across external tools and passive APIs"
)]
pub struct Cli {
    /// Target apex domains to scan
    #[arg(value_name = "DOMAIN")]
    pub targets: Vec<String>,

    /// Read additional targets from a file, one per line
    #[arg(short = 'l', long = "list", value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Only run the named sources (comma separated, case-insensitive)
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "NAME",
        conflicts_with = "exclude"
    )]
    pub include: Option<Vec<String>>,

    /// Run every source except the named ones
    #[arg(long, value_delimiter = ',', value_name = "NAME")]
    pub exclude: Option<Vec<String>>,

    /// Per-source timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub task_timeout: Option<u64>,

    /// Overall per-target timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub target_timeout: Option<u64>,

    /// Extra API attempts after a failed one
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<u32>,

    /// Directory to write per-target reports into (stdout when omitted)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Txt)]
    pub format: OutputFormat,

    /// Replace existing report files
    #[arg(long)]
    pub overwrite: bool,

    /// Disable the on-disk result cache
    #[arg(long)]
    pub no_cache: bool,

    /// Cache directory (defaults to the user cache dir)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Engine config file (defaults to ./subrecon.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Suppress the progress display
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List known sources and whether they survive gating
    Sources,
}
