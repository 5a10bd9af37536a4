//! In-memory transport for tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::{Transport, TransportResponse};
use crate::error::{ApiError, Result};

type ErrorFactory = Box<dyn Fn() -> ApiError + Send + Sync>;

enum Scripted {
    /// Returned once, then dropped from the queue
    Fail(ErrorFactory),
    /// Returned for every remaining call
    Body(Vec<u8>),
}

#[derive(Default)]
struct Route {
    queue: VecDeque<Scripted>,
    calls: usize,
    bodies: Vec<Option<Vec<u8>>>,
}

/// Scripted transport keyed by full URL.
///
/// Unknown URLs answer with a 404 status error.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Serve `body` for `url` once any queued failures are used up.
    pub fn respond(&self, url: &str, body: &str) {
        self.respond_bytes(url, body.as_bytes().to_vec());
    }

    pub fn respond_bytes(&self, url: &str, body: Vec<u8>) {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.entry(url.to_string()).or_default();
        route.queue.retain(|s| matches!(s, Scripted::Fail(_)));
        route.queue.push_back(Scripted::Body(body));
    }

    /// Fail the next `n` calls to `url` with errors built by `make`.
    pub fn fail_next<F>(&self, url: &str, n: usize, make: F)
    where
        F: Fn() -> ApiError + Send + Sync + Clone + 'static,
    {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.entry(url.to_string()).or_default();
        for _ in 0..n {
            route.queue.push_front(Scripted::Fail(Box::new(make.clone())));
        }
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .map(|r| r.calls)
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.routes.lock().unwrap().values().map(|r| r.calls).sum()
    }

    /// Request bodies sent to `url`, in call order.
    pub fn bodies(&self, url: &str) -> Vec<Option<Vec<u8>>> {
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .map(|r| r.bodies.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(
        &self,
        _method: reqwest::Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<TransportResponse> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut routes = self.routes.lock().unwrap();
        let route = routes.entry(url.to_string()).or_default();
        route.calls += 1;
        route.bodies.push(body.map(<[u8]>::to_vec));

        if matches!(route.queue.front(), Some(Scripted::Fail(_))) {
            if let Some(Scripted::Fail(make)) = route.queue.pop_front() {
                return Err(make().into());
            }
        }

        let outcome = match route.queue.front() {
            Some(Scripted::Body(body)) => Ok(TransportResponse::ok(body.clone())),
            Some(Scripted::Fail(_)) => Err(ApiError::Network("queue".to_string())),
            None => Err(ApiError::Status {
                status: 404,
                url: url.to_string(),
                body: "not scripted".to_string(),
            }),
        };
        outcome.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failures_precede_body() {
        let mock = MockTransport::new();
        mock.respond("u", "ok");
        mock.fail_next("u", 1, || ApiError::Network("down".to_string()));

        assert!(mock.call(reqwest::Method::GET, "u", None).await.is_err());
        let response = mock.call(reqwest::Method::GET, "u", None).await.unwrap();
        assert_eq!(response.body, b"ok".to_vec());
        assert_eq!(mock.call_count("u"), 2);
    }

    #[tokio::test]
    async fn test_unknown_url_is_404() {
        let mock = MockTransport::new();
        let err = mock.call(reqwest::Method::GET, "nope", None).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
