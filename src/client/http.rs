//! reqwest-backed transport

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as HttpClient, StatusCode};

use super::credentials::{API_KEYS_HEADER, CredentialRing};
use super::rate_limit::{EndpointCategory, RateLimiterSet};
use super::{Transport, TransportResponse};
use crate::error::{ApiError, ConfigError, Result};

const USER_AGENT: &str = concat!("vmcache/", env!("CARGO_PKG_VERSION"));

/// Fallback wait when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Sends requests to the vendor API, rotating credentials per call.
pub struct HttpTransport {
    http: HttpClient,
    credentials: Arc<CredentialRing>,
    rate_limiters: RateLimiterSet,
}

impl HttpTransport {
    pub fn new(credentials: Arc<CredentialRing>, timeout: Duration) -> Result<Self> {
        Self::with_headers(credentials, timeout, &[])
    }

    /// Build with extra headers sent on every request.
    ///
    /// Used when pointing at a caching proxy, e.g. to pass
    /// `X-Cache-SkipOnHit: false` through.
    pub fn with_headers(
        credentials: Arc<CredentialRing>,
        timeout: Duration,
        headers: &[(String, String)],
    ) -> Result<Self> {
        let mut defaults = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::Invalid(format!("header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::Invalid(format!("header value {}: {}", value, e)))?;
            defaults.insert(name, value);
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(defaults)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            credentials,
            rate_limiters: RateLimiterSet::new(),
        })
    }
}

fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<TransportResponse> {
        let category = EndpointCategory::from_url(url);
        self.rate_limiters.wait_for(category).await;

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(header) = self.credentials.next_header() {
            request = request.header(API_KEYS_HEADER, header);
        }
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        debug!("{} {}", method, url);
        let response = request.send().await.map_err(ApiError::from)?;
        let status = response.status();

        match status {
            StatusCode::OK => {
                let bytes = response.bytes().await.map_err(ApiError::from)?;
                Ok(TransportResponse {
                    status: status.as_u16(),
                    body: bytes.to_vec(),
                })
            }
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden.into()),
            StatusCode::TOO_MANY_REQUESTS => {
                self.rate_limiters.activate(category);
                Err(ApiError::RateLimited(retry_after(response.headers())).into())
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body,
                }
                .into())
            }
        }
    }
}
