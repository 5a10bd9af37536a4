//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod args;
pub mod assets;
pub mod cache;
pub mod completions;
pub mod context;
pub mod request;
pub mod serve;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;
pub use request::ScanRequest;

/// vmcache - caching layer and aggregation engine for vulnerability-management APIs
#[derive(Parser, Debug)]
#[command(name = "vmcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (table, json)
    #[arg(
        long,
        global = true,
        env = "VMCACHE_FORMAT",
        default_value = "table",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "VMCACHE_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "VMCACHE_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Skip the disk cache for this run
    #[arg(long, global = true, env = "VMCACHE_NO_CACHE", hide_env = true)]
    pub no_cache: bool,

    /// Discard cache entries that fail to decode and fetch them again
    #[arg(long, global = true, env = "VMCACHE_CLOBBER", hide_env = true)]
    pub clobber: bool,

    /// Number of concurrent workers
    #[arg(
        long,
        global = true,
        env = "VMCACHE_WORKERS",
        hide_env = true,
        allow_negative_numbers = true
    )]
    pub workers: Option<i64>,

    /// History snapshots to expand per scan
    #[arg(
        long,
        global = true,
        env = "VMCACHE_DEPTH",
        hide_env = true,
        allow_negative_numbers = true
    )]
    pub depth: Option<i64>,

    /// API base URL (the vendor API, or a running `vmcache serve`)
    #[arg(long, global = true, env = "VMCACHE_BASE_URL", hide_env = true)]
    pub base_url: Option<String>,

    /// Answer from cache when possible (sent to a proxy as X-Cache-SkipOnHit)
    #[arg(long, global = true, value_name = "BOOL")]
    pub skip_on_hit: Option<bool>,

    /// Persist fresh responses (sent to a proxy as X-Cache-WriteOnReturn)
    #[arg(long, global = true, value_name = "BOOL")]
    pub write_on_return: Option<bool>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display version information
    Version,

    /// List scans and aggregate their history
    #[command(subcommand)]
    Scans(ScansCommands),

    /// List assets
    #[command(subcommand)]
    Assets(AssetsCommands),

    /// Run bulk exports
    #[command(subcommand)]
    Export(ExportCommands),

    /// Run the caching proxy
    Serve {
        /// Address to listen on (defaults to proxy.listen)
        #[arg(long, env = "VMCACHE_LISTEN", hide_env = true)]
        listen: Option<String>,
    },

    /// Manage local response cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  bash:   vmcache completion bash > /etc/bash_completion.d/vmcache
  zsh:    vmcache completion zsh > \"${fpath[1]}/_vmcache\"
  fish:   vmcache completion fish > ~/.config/fish/completions/vmcache.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Scan subcommands
#[derive(Subcommand, Debug)]
pub enum ScansCommands {
    /// List all scans
    List,

    /// Aggregate scan history, hosts, plugins and assets
    #[command(after_help = "\
Examples:
  vmcache scans detail --depth 3
  vmcache scans detail --scan 12 --scan 40 --format json")]
    Detail {
        /// Only these scan IDs (repeatable; defaults to every scan)
        #[arg(long = "scan", value_name = "ID")]
        scans: Vec<String>,
    },
}

/// Asset subcommands
#[derive(Subcommand, Debug)]
pub enum AssetsCommands {
    /// List all assets
    List,
}

/// Export subcommands
#[derive(Subcommand, Debug)]
pub enum ExportCommands {
    /// Export vulnerabilities in chunks
    Vulns {
        /// Resume an export already requested, by its UUID
        #[arg(long)]
        uuid: Option<String>,
    },
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,
    /// Clear all cached data
    Clear,
    /// Print cache directory path
    Path,
}
