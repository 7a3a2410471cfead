//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// grid-intensity - Carbon intensity of electricity grids
///
/// Looks up the carbon intensity of one or more grid regions from a
/// choice of public data providers.
#[derive(Parser, Debug)]
#[command(name = "grid-intensity")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "GRID_INTENSITY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get carbon intensity for one or more regions
    Get(GetArgs),

    /// Inspect available providers
    Provider(ProviderArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Inspect or clear the provider cache
    Cache(CacheArgs),

    /// Serve carbon intensity as Prometheus metrics
    Exporter(ExporterArgs),
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Provider name (default: from config)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Regions to query (comma-separated, default: from config)
    #[arg(short, long, value_delimiter = ',')]
    pub region: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Overall deadline in seconds (default: from config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Save provider and regions as the new defaults
    #[arg(long)]
    pub save: bool,
}

/// Arguments for the exporter command
#[derive(Parser, Debug)]
pub struct ExporterArgs {
    /// Provider name (default: from config)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Regions to export (comma-separated, default: from config)
    #[arg(short, long, value_delimiter = ',')]
    pub region: Vec<String>,

    /// Listen address (default: from config)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Per-scrape deadline in seconds (default: from config)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the provider command
#[derive(Parser, Debug)]
pub struct ProviderArgs {
    /// Subcommand for provider
    #[command(subcommand)]
    pub action: ProviderAction,
}

/// Provider subcommands
#[derive(Subcommand, Debug)]
pub enum ProviderAction {
    /// List supported providers
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., general.provider)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listings and readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Delete the cache file
    Clear,
}
