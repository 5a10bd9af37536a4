//! Bounded-concurrency fetching of numbered chunks
//!
//! Used for vulnerability export chunks: the status call lists the available
//! chunk ids up front, and each chunk is an independent request.

use std::future::Future;
use std::pin::Pin;

use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;

use crate::error::Result;

type ChunkFuture<T> = Pin<Box<dyn Future<Output = (u64, Result<T>)> + Send>>;

/// Fetch every chunk in `chunk_ids`, at most `max_concurrent` at a time.
///
/// Results come back sorted by chunk id regardless of arrival order. The
/// first failure aborts the remaining fetches and is returned.
///
/// # Example
///
/// ```ignore
/// let chunks = fetch_chunks(
///     status.chunks_available.clone(),
///     move |chunk_id| {
///         let client = client.clone();
///         let params = params.clone().with("chunk_id", chunk_id);
///         async move { client.fetch::<ExportChunk>(Endpoint::VulnExportChunk, &params, control).await }
///     },
///     workers,
/// )
/// .await?;
/// ```
pub async fn fetch_chunks<T, F, Fut>(
    chunk_ids: Vec<u64>,
    fetch_chunk: F,
    max_concurrent: usize,
) -> Result<Vec<(u64, T)>>
where
    T: Send + 'static,
    F: Fn(u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    if chunk_ids.is_empty() {
        return Ok(Vec::new());
    }

    let max_concurrent = max_concurrent.max(1);
    debug!(
        "Fetching {} chunks with max {} concurrent",
        chunk_ids.len(),
        max_concurrent
    );

    let mut results = Vec::with_capacity(chunk_ids.len());
    let mut futures: FuturesUnordered<ChunkFuture<T>> = FuturesUnordered::new();
    let mut pending = chunk_ids.into_iter();

    let make_future = |chunk_id: u64, f: &F| -> ChunkFuture<T> {
        let fut = f(chunk_id);
        Box::pin(async move { (chunk_id, fut.await) })
    };

    for chunk_id in pending.by_ref().take(max_concurrent) {
        futures.push(make_future(chunk_id, &fetch_chunk));
    }

    while let Some((chunk_id, result)) = futures.next().await {
        let value = result?;
        debug!("Chunk {} fetched", chunk_id);
        results.push((chunk_id, value));

        if let Some(next) = pending.next() {
            futures.push(make_future(next, &fetch_chunk));
        }
    }

    results.sort_by_key(|(chunk_id, _)| *chunk_id);
    Ok(results)
}
