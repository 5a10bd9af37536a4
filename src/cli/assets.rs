//! Asset commands

use log::debug;

use crate::cache::{Endpoint, Params};
use crate::cli::{CommandContext, GlobalOptions};
use crate::client::models::AssetList;
use crate::error::Result;
use crate::models::AssetDisplay;
use crate::output::Formattable;

/// List all assets
pub async fn list(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;

    let assets = ctx
        .client
        .fetch::<AssetList>(Endpoint::AssetList, &Params::new(), ctx.control)
        .await?;
    debug!("Fetched {} assets", assets.assets.len());

    let rows: Vec<AssetDisplay> = assets.assets.iter().map(AssetDisplay::from).collect();
    rows.print(ctx.format)?;

    ctx.log_stats();
    Ok(())
}
