use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Catalog launcher for administrative tools")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to $ADMINKIT_CONFIG, then ./adminkit.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the tools in the catalog.
    Catalog(CatalogArgs),
    /// Evaluate the pre-flight checklist for a tool.
    Preflight(PreflightArgs),
    /// Run a tool.
    Run(RunArgs),
    /// Inspect or maintain the artifact cache.
    Cache(CacheArgs),
    /// Show execution history.
    History(HistoryArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CatalogArgs {
    /// Bypass the cached manifest and fetch from the remote.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PreflightArgs {
    pub tool: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    pub tool: String,

    /// Tool parameter (KEY=VALUE). Can be specified multiple times.
    #[arg(long = "param", action = clap::ArgAction::Append)]
    pub params: Vec<String>,

    /// Stop the tool after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Proceed past pre-flight warnings without asking.
    #[arg(long, short = 'y', default_value_t = false)]
    pub yes: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Total size of cached artifacts.
    Size,
    /// Remove expired entries.
    Prune,
    /// Remove every entry.
    Clear,
    /// Remove the entry for one catalog path.
    Invalidate { path: String },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct HistoryArgs {
    #[arg(long)]
    pub tool: Option<String>,

    /// completed, cancelled, timed_out or host_failure.
    #[arg(long)]
    pub outcome: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Summarise instead of listing: most-used tools and success rate.
    #[arg(long, default_value_t = false)]
    pub stats: bool,
}
