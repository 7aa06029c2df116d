use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: inspect versioned object-graph stores",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store directory
    #[arg(short = 'C', long = "store", global = true, default_value = ".")]
    pub store: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a store with one persistent root
    Init(InitArgs),
    /// List persistent roots
    Roots,
    /// Show revision history
    Log(LogArgs),
    /// Show one revision and the changes it made
    Show(ShowArgs),
    /// Print the full item graph at a revision
    Graph(GraphArgs),
    /// Show item changes between two revisions
    Diff(DiffArgs),
    /// List branches and their heads
    Heads(RootArgs),
    /// Delete revisions
    Delete(DeleteArgs),
    /// Show storage statistics
    Stats(RootArgs),
}

/// Selects a persistent root. May be omitted when the store has only one.
#[derive(Args, Clone, Debug, Default)]
pub struct RootArgs {
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Name of the first branch
    #[arg(long, default_value = "main")]
    pub branch: String,
    /// Keep every persistent root in one shared log file
    #[arg(long)]
    pub shared: bool,
}

#[derive(Args)]
pub struct LogArgs {
    #[command(flatten)]
    pub root: RootArgs,
    /// Branch name or UUID; every revision when omitted
    #[arg(short, long)]
    pub branch: Option<String>,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    /// Include revisions of merged branches
    #[arg(long)]
    pub merges: bool,
    #[arg(long)]
    pub reverse: bool,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub root: RootArgs,
    /// Revision number or revision UUID
    pub revision: String,
}

#[derive(Args)]
pub struct GraphArgs {
    #[command(flatten)]
    pub root: RootArgs,
    pub revision: String,
}

#[derive(Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub root: RootArgs,
    pub from: String,
    pub to: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub root: RootArgs,
    #[arg(required = true)]
    pub revisions: Vec<String>,
}
