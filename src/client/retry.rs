//! Retry with caller-supplied backoff delays

use async_trait::async_trait;
use log::warn;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{Transport, TransportResponse};
use crate::error::Result;

/// Ordered backoff delays.
///
/// Attempt `i` (zero-based) that fails with a retryable error sleeps for
/// `delays[i]` and tries again; once `i >= delays.len()` the last error is
/// returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Delay before retrying after failed attempt `attempt`, if any retries remain.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt).copied()
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the
/// policy's delays are exhausted.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }
                let Some(delay) = policy.delay_for_attempt(attempt) else {
                    return Err(e);
                };

                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation,
                    attempt + 1,
                    policy.delays.len() + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Transport wrapper applying a [`RetryPolicy`] to every call
pub struct RetryingTransport<T: Transport> {
    inner: Arc<T>,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(inner),
            policy,
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport + 'static> Transport for RetryingTransport<T> {
    async fn call(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<TransportResponse> {
        let operation = format!("{} {}", method, url);
        let inner = &self.inner;
        let method = &method;
        with_retry(&self.policy, &operation, move || {
            inner.call(method.clone(), url, body)
        })
        .await
    }
}
