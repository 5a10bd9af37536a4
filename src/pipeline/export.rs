//! Vulnerability export: request, poll, download chunks

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::cache::{CacheControl, CachedClient, Endpoint, Params};
use crate::client::Transport;
use crate::client::models::{ExportChunk, ExportRequested, ExportStatus};
use crate::client::parallel::fetch_chunks;
use crate::error::{ApiError, Result};

/// Upper bound on status polls before giving up
pub const MAX_STATUS_POLLS: usize = 120;

const FALLBACK_POLL_DELAY: Duration = Duration::from_secs(5);

/// A finished export and its downloaded chunks, ordered by chunk id
#[derive(Debug, Clone)]
pub struct ExportRun {
    pub export_id: String,
    pub chunks: Vec<(u64, ExportChunk)>,
}

impl ExportRun {
    pub fn record_count(&self) -> usize {
        self.chunks.iter().map(|(_, c)| c.records.len()).sum()
    }
}

/// Drives one export through the vendor's asynchronous export API.
pub struct VulnExport<T: Transport + 'static> {
    client: Arc<CachedClient<T>>,
    chunk_size: u32,
    poll_delays: Vec<Duration>,
    workers: usize,
}

impl<T: Transport + 'static> VulnExport<T> {
    pub fn new(client: Arc<CachedClient<T>>, chunk_size: u32, workers: usize) -> Self {
        Self {
            client,
            chunk_size,
            poll_delays: Vec::new(),
            workers: workers.max(1),
        }
    }

    /// Delays between status polls; the last one repeats.
    pub fn with_poll_delays(mut self, delays: Vec<Duration>) -> Self {
        self.poll_delays = delays;
        self
    }

    /// Start a new export, or resume `existing` by id, and download it.
    ///
    /// `on_status` sees every status poll; `on_chunk` is called as each chunk lands.
    pub async fn run<S, C>(&self, existing: Option<String>, on_status: S, on_chunk: C) -> Result<ExportRun>
    where
        S: Fn(&ExportStatus),
        C: Fn(u64) + Send + Sync + 'static,
    {
        let export_id = match existing {
            Some(id) => {
                info!("Resuming export {}", id);
                id
            }
            None => self.request().await?,
        };

        let status = self.wait_until_finished(&export_id, on_status).await?;
        let chunks = self
            .download(&export_id, status.chunks_available, on_chunk)
            .await?;

        Ok(ExportRun { export_id, chunks })
    }

    async fn request(&self) -> Result<String> {
        let params = Params::new().with("chunk_size", self.chunk_size);
        let requested = self
            .client
            .fetch::<ExportRequested>(Endpoint::VulnExportRequest, &params, CacheControl::default())
            .await?;
        info!("Requested export {}", requested.export_uuid);
        Ok(requested.export_uuid)
    }

    fn poll_delay(&self, poll: usize) -> Duration {
        self.poll_delays
            .get(poll)
            .or(self.poll_delays.last())
            .copied()
            .unwrap_or(FALLBACK_POLL_DELAY)
    }

    async fn wait_until_finished<S>(&self, export_id: &str, on_status: S) -> Result<ExportStatus>
    where
        S: Fn(&ExportStatus),
    {
        let params = Params::new().with("export_id", export_id);
        let mut last_status = String::new();

        for poll in 0..MAX_STATUS_POLLS {
            let status = self
                .client
                .fetch::<ExportStatus>(Endpoint::VulnExportStatus, &params, CacheControl::default())
                .await?;
            on_status(&status);

            if status.is_finished() {
                debug!(
                    "Export {} finished with {} chunks",
                    export_id,
                    status.chunks_available.len()
                );
                return Ok(status);
            }
            if status.is_failed() {
                return Err(ApiError::ExportFailed {
                    export_id: export_id.to_string(),
                    status: status.status,
                }
                .into());
            }

            let delay = self.poll_delay(poll);
            debug!("Export {} is {}; polling again in {:?}", export_id, status.status, delay);
            last_status = status.status;
            tokio::time::sleep(delay).await;
        }

        Err(ApiError::ExportFailed {
            export_id: export_id.to_string(),
            status: format!("{} after {} polls", last_status, MAX_STATUS_POLLS),
        }
        .into())
    }

    async fn download<C>(
        &self,
        export_id: &str,
        chunk_ids: Vec<u64>,
        on_chunk: C,
    ) -> Result<Vec<(u64, ExportChunk)>>
    where
        C: Fn(u64) + Send + Sync + 'static,
    {
        let client = Arc::clone(&self.client);
        let export_id = export_id.to_string();
        let on_chunk = Arc::new(on_chunk);

        fetch_chunks(
            chunk_ids,
            move |chunk_id| {
                let client = Arc::clone(&client);
                let on_chunk = Arc::clone(&on_chunk);
                let params = Params::new()
                    .with("export_id", &export_id)
                    .with("chunk_id", chunk_id);
                async move {
                    let chunk = client
                        .fetch::<ExportChunk>(
                            Endpoint::VulnExportChunk,
                            &params,
                            CacheControl::default(),
                        )
                        .await?;
                    on_chunk(chunk_id);
                    Ok(chunk)
                }
            },
            self.workers,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyResolver;
    use crate::client::mock::MockTransport;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE: &str = "https://vm.test";

    fn export(mock: MockTransport) -> VulnExport<MockTransport> {
        let client = Arc::new(CachedClient::new(mock, KeyResolver::new(BASE)));
        VulnExport::new(client, 50, 2).with_poll_delays(vec![Duration::from_millis(1)])
    }

    fn status_url(id: &str) -> String {
        format!("{}/vulns/export/{}/status", BASE, id)
    }

    #[tokio::test]
    async fn test_full_export() {
        let mock = MockTransport::new();
        mock.respond(&format!("{}/vulns/export", BASE), r#"{"export_uuid": "e-1"}"#);
        mock.respond(&status_url("e-1"), r#"{"status": "FINISHED", "chunks_available": [2, 1]}"#);
        mock.respond(
            &format!("{}/vulns/export/e-1/chunks/1", BASE),
            r#"[{"severity": "high"}, {"severity": "low"}]"#,
        );
        mock.respond(
            &format!("{}/vulns/export/e-1/chunks/2", BASE),
            r#"[{"severity": "info"}]"#,
        );

        let landed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&landed);
        let run = export(mock)
            .run(None, |_| {}, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(run.export_id, "e-1");
        let ids: Vec<u64> = run.chunks.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(run.record_count(), 3);
        assert_eq!(landed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resume_skips_request() {
        let mock = MockTransport::new();
        mock.respond(&status_url("e-7"), r#"{"status": "FINISHED", "chunks_available": []}"#);
        let exporter = export(mock);

        let run = exporter
            .run(Some("e-7".to_string()), |_| {}, |_| {})
            .await
            .unwrap();

        assert_eq!(run.export_id, "e-7");
        assert!(run.chunks.is_empty());
        assert_eq!(
            exporter.client.transport().call_count(&format!("{}/vulns/export", BASE)),
            0
        );
    }

    #[tokio::test]
    async fn test_cancelled_export_fails() {
        let mock = MockTransport::new();
        mock.respond(&status_url("e-2"), r#"{"status": "CANCELLED"}"#);

        let err = export(mock)
            .run(Some("e-2".to_string()), |_| {}, |_| {})
            .await
            .unwrap_err();
        match err {
            Error::Api(ApiError::ExportFailed { export_id, status }) => {
                assert_eq!(export_id, "e-2");
                assert_eq!(status, "CANCELLED");
            }
            other => panic!("Expected export failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_max_polls() {
        let mock = MockTransport::new();
        mock.respond(&status_url("e-3"), r#"{"status": "PROCESSING"}"#);
        let exporter = export(mock);
        let polls = AtomicUsize::new(0);

        let err = exporter
            .run(
                Some("e-3".to_string()),
                |status| {
                    assert_eq!(status.status, "PROCESSING");
                    polls.fetch_add(1, Ordering::SeqCst);
                },
                |_| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api(ApiError::ExportFailed { .. })));
        assert_eq!(polls.load(Ordering::SeqCst), MAX_STATUS_POLLS);
    }

    #[test]
    fn test_poll_delay_repeats_last() {
        let client = Arc::new(CachedClient::new(MockTransport::new(), KeyResolver::new(BASE)));
        let exporter = VulnExport::new(Arc::clone(&client), 10, 1)
            .with_poll_delays(vec![Duration::from_millis(1), Duration::from_millis(2)]);
        assert_eq!(exporter.poll_delay(0), Duration::from_millis(1));
        assert_eq!(exporter.poll_delay(9), Duration::from_millis(2));

        let bare = VulnExport::new(client, 10, 1);
        assert_eq!(bare.poll_delay(0), FALLBACK_POLL_DELAY);
    }
}
