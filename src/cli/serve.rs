//! Caching proxy command

use std::time::Duration;

use colored::Colorize;
use log::info;
use tokio::net::TcpListener;

use crate::cli::{CommandContext, GlobalOptions};
use crate::error::Result;
use crate::proxy::{CachingProxy, termination_signal};

/// Serve the vendor API from the cache until `/shutdown` or a signal.
pub async fn run(opts: &GlobalOptions, listen: Option<String>) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let addr = listen.unwrap_or_else(|| ctx.config.proxy.listen.clone());

    let listener = TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;
    info!("Proxying {} on {}", ctx.config.base_url, local);
    eprintln!(
        "{} http://{} (upstream {})",
        "Listening on".green().bold(),
        local,
        ctx.config.base_url
    );

    let grace = Duration::from_secs(ctx.config.proxy.shutdown_grace_secs);
    CachingProxy::new(ctx.client.clone(), grace)
        .with_export_chunk_size(ctx.config.export_chunk_size)
        .serve(listener, termination_signal())
        .await?;

    ctx.log_stats();
    Ok(())
}
