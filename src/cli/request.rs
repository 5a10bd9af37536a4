//! Scan request dispatch
//!
//! Every scan-oriented command is one [`ScanRequest`] run against the shared
//! [`CommandContext`].

use std::collections::HashMap;
use std::io::Write;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::cache::{Endpoint, Params};
use crate::cli::{CommandContext, OutputFormat};
use crate::client::models::{Scan, ScanAggregate, ScanList};
use crate::error::Result;
use crate::models::{HistoryDisplay, ScanDisplay, VulnDisplay};
use crate::output::Formattable;
use crate::output::json::write_json_line;
use crate::pipeline::{Pipeline, PipelineSummary, VulnExport};

/// What a scan command asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanRequest {
    /// All scans
    List,
    /// Aggregated history for the given scans, or every scan when empty
    Detail { scan_ids: Vec<String> },
    /// A vulnerability export, resumed when a UUID is given
    Export { uuid: Option<String> },
}

/// Run one request and print its result.
pub async fn dispatch(ctx: &CommandContext, request: ScanRequest) -> Result<()> {
    debug!("Dispatching {:?}", request);

    let outcome = match request {
        ScanRequest::List => list(ctx).await,
        ScanRequest::Detail { scan_ids } => detail(ctx, scan_ids).await,
        ScanRequest::Export { uuid } => export(ctx, uuid).await,
    };

    ctx.log_stats();
    outcome
}

async fn fetch_scans(ctx: &CommandContext) -> Result<Vec<Scan>> {
    let list = ctx
        .client
        .fetch::<ScanList>(Endpoint::ScanList, &Params::new(), ctx.control)
        .await?;
    debug!("Fetched {} scans", list.scans.len());
    Ok(list.scans)
}

async fn list(ctx: &CommandContext) -> Result<()> {
    let scans = fetch_scans(ctx).await?;
    let rows: Vec<ScanDisplay> = scans.iter().map(ScanDisplay::from).collect();
    rows.print(ctx.format)
}

/// Keep the listed scans in request order; IDs missing from the list are
/// still aggregated, with only their ID known.
fn select_scans(all: Vec<Scan>, scan_ids: &[String]) -> Vec<Scan> {
    if scan_ids.is_empty() {
        return all;
    }

    let mut by_id: HashMap<String, Scan> =
        all.into_iter().map(|scan| (scan.id.clone(), scan)).collect();
    scan_ids
        .iter()
        .map(|id| {
            by_id.remove(id).unwrap_or_else(|| {
                warn!("Scan {} is not in the scan list", id);
                Scan {
                    id: id.clone(),
                    ..Default::default()
                }
            })
        })
        .collect()
}

async fn detail(ctx: &CommandContext, scan_ids: Vec<String>) -> Result<()> {
    let scans = select_scans(fetch_scans(ctx).await?, &scan_ids);

    let pipeline = Pipeline::new(
        ctx.client.clone(),
        ctx.config.workers,
        ctx.config.depth,
    )?
    .with_control(ctx.control);

    let summary = match ctx.format {
        OutputFormat::Json => {
            pipeline
                .run(scans, |aggregate| {
                    let mut out = std::io::stdout().lock();
                    if let Err(err) = write_json_line(&mut out, &aggregate) {
                        error!("Failed to write scan {}: {}", aggregate.scan.id, err);
                    }
                    let _ = out.flush();
                })
                .await?
        }
        OutputFormat::Table => {
            let (tx, mut rx) = mpsc::unbounded_channel::<ScanAggregate>();
            let summary = pipeline
                .run(scans, move |aggregate| {
                    let _ = tx.send(aggregate);
                })
                .await?;

            let mut aggregates = Vec::new();
            while let Ok(aggregate) = rx.try_recv() {
                aggregates.push(aggregate);
            }
            // Workers finish in any order
            aggregates.sort_by(|a, b| a.scan.id.cmp(&b.scan.id));

            let rows: Vec<HistoryDisplay> =
                aggregates.iter().flat_map(HistoryDisplay::rows).collect();
            rows.print(ctx.format)?;
            summary
        }
    };

    report(&summary);
    Ok(())
}

fn report(summary: &PipelineSummary) {
    if summary.failed > 0 {
        eprintln!(
            "{} {} scan(s) could not be read; see the log for details",
            "Warning:".yellow().bold(),
            summary.failed
        );
    }
}

fn export_progress() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb
}

async fn export(ctx: &CommandContext, uuid: Option<String>) -> Result<()> {
    let workers = ctx.config.worker_count()?;
    let exporter = VulnExport::new(ctx.client.clone(), ctx.config.export_chunk_size, workers)
        .with_poll_delays(ctx.config.retry_intervals());

    let pb = export_progress();
    let status_pb = pb.clone();
    let chunk_pb = pb.clone();

    let result = exporter
        .run(
            uuid,
            move |status| {
                status_pb.set_message(status.status.to_lowercase());
                status_pb.set_length(status.chunks_available.len() as u64);
            },
            move |_chunk_id| chunk_pb.inc(1),
        )
        .await;
    pb.finish_and_clear();
    let run = result?;

    info!(
        "Export {} downloaded: {} chunks, {} records",
        run.export_id,
        run.chunks.len(),
        run.record_count()
    );

    match ctx.format {
        OutputFormat::Json => {
            let mut out = std::io::stdout().lock();
            for (_, chunk) in &run.chunks {
                for record in &chunk.records {
                    write_json_line(&mut out, record)?;
                }
            }
            out.flush()?;
        }
        OutputFormat::Table => {
            let rows: Vec<VulnDisplay> = run
                .chunks
                .iter()
                .flat_map(|(_, chunk)| chunk.records.iter().map(VulnDisplay::from))
                .collect();
            rows.print(ctx.format)?;
            eprintln!("Export {}", run.export_id.bold());
        }
    }

    Ok(())
}
