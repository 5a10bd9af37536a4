//! vmcache - caching layer, aggregation engine and caching proxy for
//! vulnerability-management APIs

use clap::Parser;

mod cache;
mod cli;
mod client;
mod config;
mod error;
mod models;
mod output;
mod pipeline;
mod proxy;

use cli::{
    AssetsCommands, CacheCommands, Cli, Commands, CommandContext, ExportCommands, GlobalOptions,
    ScanRequest, ScansCommands,
};
use error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise warnings, or debug output for this crate with `--debug`.
fn init_logging(debug: bool) {
    let default_filter = if debug { "vmcache=debug,info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Version => {
            println!("vmcache version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Scans(scans_cmd) => {
            let request = match scans_cmd {
                ScansCommands::List => ScanRequest::List,
                ScansCommands::Detail { scans } => ScanRequest::Detail { scan_ids: scans },
            };
            let ctx = CommandContext::new(&opts)?;
            cli::request::dispatch(&ctx, request).await
        }
        Commands::Export(export_cmd) => match export_cmd {
            ExportCommands::Vulns { uuid } => {
                let ctx = CommandContext::new(&opts)?;
                cli::request::dispatch(&ctx, ScanRequest::Export { uuid }).await
            }
        },
        Commands::Assets(assets_cmd) => match assets_cmd {
            AssetsCommands::List => cli::assets::list(&opts).await,
        },
        Commands::Serve { listen } => cli::serve::run(&opts, listen).await,
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Path => cli::cache::path(&opts),
        },
        Commands::Completion { shell } => {
            cli::completions::print(shell);
            Ok(())
        }
    }
}
