//! Concurrent scan aggregation
//!
//! A producer feeds scans into a bounded input channel, a fixed pool of
//! workers turns each scan into a [`ScanAggregate`], and a single writer task
//! drains the output channel into the caller's sink.
//!
//! Shutdown runs in two stages. The producer drops the only input sender once
//! every scan is queued; each worker exits when the input is drained, dropping
//! its output sender; the output channel closes when the last worker is gone,
//! which ends the writer. No stage closes a channel another stage still sends on.

pub mod export;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info, warn};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::cache::{CacheControl, CachedClient, Endpoint, Params};
use crate::client::Transport;
use crate::client::models::{
    AssetDetail, HistoryEntry, HistoryHosts, HistoryRecord, HostDetail, HostScanSummary,
    PluginDetail, Scan, ScanAggregate, ScanDetail,
};
use crate::error::{ConfigError, Error, Result};

pub use export::{ExportRun, VulnExport};

/// Outcome counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub scans: usize,
    pub emitted: usize,
    /// Scans whose history lookup failed and were dropped
    pub failed: usize,
    /// Child lookups that failed and were left empty
    pub child_failures: usize,
}

/// State shared by all workers
struct WorkerContext<T: Transport> {
    client: Arc<CachedClient<T>>,
    depth: usize,
    control: CacheControl,
    failed: AtomicUsize,
    child_failures: AtomicUsize,
}

/// Scan → history → host → plugin/asset enrichment over a worker pool.
pub struct Pipeline<T: Transport + 'static> {
    client: Arc<CachedClient<T>>,
    workers: usize,
    depth: usize,
    control: CacheControl,
}

impl<T: Transport + 'static> Pipeline<T> {
    /// Fails on `workers < 1` or `depth < 1`; neither is clamped.
    pub fn new(client: Arc<CachedClient<T>>, workers: i64, depth: i64) -> Result<Self> {
        if workers < 1 {
            return Err(ConfigError::InvalidWorkers(workers).into());
        }
        if depth < 1 {
            return Err(ConfigError::InvalidDepth(depth).into());
        }
        Ok(Self {
            client,
            workers: workers as usize,
            depth: depth as usize,
            control: CacheControl::default(),
        })
    }

    pub fn with_control(mut self, control: CacheControl) -> Self {
        self.control = control;
        self
    }

    /// Aggregate `scans`, handing each finished aggregate to `sink` as it completes.
    ///
    /// Aggregates arrive in completion order, not input order.
    pub async fn run<S>(&self, scans: Vec<Scan>, mut sink: S) -> Result<PipelineSummary>
    where
        S: FnMut(ScanAggregate) + Send + 'static,
    {
        let total = scans.len();
        let ctx = Arc::new(WorkerContext {
            client: Arc::clone(&self.client),
            depth: self.depth,
            control: self.control,
            failed: AtomicUsize::new(0),
            child_failures: AtomicUsize::new(0),
        });

        let (input_tx, input_rx) = mpsc::channel::<Scan>(self.workers * 2);
        let (output_tx, mut output_rx) = mpsc::channel::<ScanAggregate>(self.workers * 2);
        let input_rx = Arc::new(Mutex::new(input_rx));

        let producer = tokio::spawn(async move {
            for scan in scans {
                if input_tx.send(scan).await.is_err() {
                    break;
                }
            }
            // input_tx dropped here: workers see the end of input
        });

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(run_worker(
                id,
                Arc::clone(&ctx),
                Arc::clone(&input_rx),
                output_tx.clone(),
            ));
        }
        // Workers hold the remaining receiver handles and senders, so the
        // producer stops once every worker has exited
        drop(input_rx);
        drop(output_tx);

        let writer = tokio::spawn(async move {
            let mut emitted = 0;
            while let Some(aggregate) = output_rx.recv().await {
                sink(aggregate);
                emitted += 1;
            }
            emitted
        });

        let mut worker_panic = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Pipeline worker panicked: {}", e);
                worker_panic = Some(e);
            }
        }
        producer
            .await
            .map_err(|e| Error::Other(format!("Pipeline producer failed: {}", e)))?;
        let emitted = writer
            .await
            .map_err(|e| Error::Other(format!("Pipeline writer failed: {}", e)))?;

        if let Some(e) = worker_panic {
            return Err(Error::Other(format!("Pipeline worker failed: {}", e)));
        }

        let summary = PipelineSummary {
            scans: total,
            emitted,
            failed: ctx.failed.load(Ordering::Relaxed),
            child_failures: ctx.child_failures.load(Ordering::Relaxed),
        };
        info!(
            "Pipeline finished: {} of {} scans emitted, {} failed, {} child lookups failed",
            summary.emitted, summary.scans, summary.failed, summary.child_failures
        );
        Ok(summary)
    }
}

async fn run_worker<T: Transport + 'static>(
    id: usize,
    ctx: Arc<WorkerContext<T>>,
    input: Arc<Mutex<mpsc::Receiver<Scan>>>,
    output: mpsc::Sender<ScanAggregate>,
) {
    loop {
        let next = input.lock().await.recv().await;
        let Some(scan) = next else {
            break;
        };

        debug!("Worker {} aggregating scan {}", id, scan.id);
        match ctx.aggregate(scan).await {
            Ok(aggregate) => {
                if output.send(aggregate).await.is_err() {
                    warn!("Worker {}: output closed early", id);
                    break;
                }
            }
            Err((scan_id, e)) => {
                error!("Skipping scan {}: {}", scan_id, e);
                ctx.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    debug!("Worker {} done", id);
}

impl<T: Transport> WorkerContext<T> {
    async fn aggregate(&self, scan: Scan) -> std::result::Result<ScanAggregate, (String, Error)> {
        let scan_params = Params::new().with("scan_id", &scan.id);
        let detail = match self
            .client
            .fetch::<ScanDetail>(Endpoint::ScanDetail, &scan_params, self.control)
            .await
        {
            Ok(detail) => detail,
            Err(e) => return Err((scan.id, e)),
        };

        let mut histories = Vec::new();
        for entry in detail.latest(self.depth) {
            let hosts = self.history_hosts(&scan.id, &entry).await;
            histories.push(HistoryRecord { entry, hosts });
        }

        Ok(ScanAggregate { scan, histories })
    }

    async fn history_hosts(&self, scan_id: &str, entry: &HistoryEntry) -> Vec<HostScanSummary> {
        let params = Params::new()
            .with("scan_id", scan_id)
            .with("history_id", &entry.history_id);

        let mut hosts = match self
            .client
            .fetch::<HistoryHosts>(Endpoint::ScanHistory, &params, self.control)
            .await
        {
            Ok(history) => history.hosts,
            Err(e) => {
                self.child_failed(&format!("scan {} history {}", scan_id, entry.history_id), &e);
                return Vec::new();
            }
        };

        // Sequential within one history entry
        for host in hosts.iter_mut() {
            self.enrich_host(scan_id, &entry.history_id, host).await;
        }
        hosts
    }

    async fn enrich_host(&self, scan_id: &str, history_id: &str, host: &mut HostScanSummary) {
        let params = Params::new()
            .with("scan_id", scan_id)
            .with("host_id", &host.host_id)
            .with("history_id", history_id);

        match self
            .client
            .fetch::<HostDetail>(Endpoint::HostDetail, &params, self.control)
            .await
        {
            Ok(mut detail) => {
                for finding in detail.findings.iter_mut() {
                    let params = Params::new().with("plugin_id", &finding.plugin_id);
                    match self
                        .client
                        .fetch::<PluginDetail>(Endpoint::PluginDetail, &params, self.control)
                        .await
                    {
                        Ok(plugin) => finding.detail = Some(plugin),
                        Err(e) => self.child_failed(&format!("plugin {}", finding.plugin_id), &e),
                    }
                }
                host.detail = Some(detail);
            }
            Err(e) => self.child_failed(&format!("scan {} host {}", scan_id, host.host_id), &e),
        }

        if let Some(asset_id) = &host.asset_id {
            let params = Params::new().with("asset_id", asset_id);
            match self
                .client
                .fetch::<AssetDetail>(Endpoint::AssetDetail, &params, self.control)
                .await
            {
                Ok(asset) => host.asset = Some(asset),
                Err(e) => self.child_failed(&format!("asset {}", asset_id), &e),
            }
        }
    }

    fn child_failed(&self, what: &str, e: &Error) {
        warn!("Failed to fetch {}: {}", what, e);
        self.child_failures.fetch_add(1, Ordering::Relaxed);
    }
}
