//! Vulnerability-management API transport

use async_trait::async_trait;

use crate::error::Result;

pub mod credentials;
pub mod http;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod parallel;
pub mod rate_limit;
pub mod retry;

pub use credentials::{CredentialPair, CredentialRing};
pub use http::HttpTransport;
pub use parallel::fetch_chunks;
pub use retry::{RetryPolicy, RetryingTransport};

/// Raw response from a successful call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Performs a single API request.
///
/// Implementations return `Ok` only for a 200 response; every other outcome
/// is an [`ApiError`](crate::error::ApiError) so the retry loop can classify it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<TransportResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn call(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<TransportResponse> {
        (**self).call(method, url, body).await
    }
}
