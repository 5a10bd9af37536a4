//! Per-endpoint rate limiting
//!
//! Reactive: a category's limiter only engages after that category has seen a
//! 429. Until then requests go out unthrottled.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;

/// Families of API endpoints that share a throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    /// `/scans*`
    Scans,
    /// `/workbenches/*` and `/assets`
    Workbenches,
    /// `/vulns/export*`
    Exports,
    /// Everything else, e.g. `/plugins/*`
    Default,
}

impl EndpointCategory {
    pub const ALL: [EndpointCategory; 4] = [
        EndpointCategory::Scans,
        EndpointCategory::Workbenches,
        EndpointCategory::Exports,
        EndpointCategory::Default,
    ];

    /// Categorize a request by its path (no scheme or host).
    pub fn from_path(path: &str) -> Self {
        let path = path.split('?').next().unwrap_or(path);

        if path.starts_with("/scans") {
            EndpointCategory::Scans
        } else if path.starts_with("/workbenches") || path == "/assets" {
            EndpointCategory::Workbenches
        } else if path.starts_with("/vulns/export") {
            EndpointCategory::Exports
        } else {
            EndpointCategory::Default
        }
    }

    /// Categorize a full URL.
    pub fn from_url(url: &str) -> Self {
        match reqwest::Url::parse(url) {
            Ok(parsed) => Self::from_path(parsed.path()),
            Err(_) => EndpointCategory::Default,
        }
    }

    /// Requests per minute once throttled.
    pub fn per_minute(&self) -> u32 {
        match self {
            EndpointCategory::Scans => 600,
            EndpointCategory::Workbenches => 300,
            EndpointCategory::Exports => 60,
            EndpointCategory::Default => 300,
        }
    }
}

/// Limiter for one category
pub struct EndpointRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    active: AtomicBool,
    category: EndpointCategory,
}

impl EndpointRateLimiter {
    pub fn new(category: EndpointCategory) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(category.per_minute()).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: RateLimiter::direct(quota),
            active: AtomicBool::new(false),
            category,
        }
    }

    pub fn activate(&self) {
        let was_active = self.active.swap(true, Ordering::SeqCst);
        if !was_active {
            debug!("Rate limiting activated for {:?}", self.category);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait for a permit if this category is throttled.
    pub async fn wait_if_active(&self) {
        if self.is_active() {
            debug!("Waiting for rate limiter {:?}", self.category);
            self.limiter.until_ready().await;
        }
    }
}

/// Limiters for every category, created up front
pub struct RateLimiterSet {
    limiters: HashMap<EndpointCategory, EndpointRateLimiter>,
}

impl Default for RateLimiterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterSet {
    pub fn new() -> Self {
        let limiters = EndpointCategory::ALL
            .into_iter()
            .map(|category| (category, EndpointRateLimiter::new(category)))
            .collect();
        Self { limiters }
    }

    pub async fn wait_for(&self, category: EndpointCategory) {
        if let Some(limiter) = self.limiters.get(&category) {
            limiter.wait_if_active().await;
        }
    }

    /// Called on a 429.
    pub fn activate(&self, category: EndpointCategory) {
        if let Some(limiter) = self.limiters.get(&category) {
            limiter.activate();
        }
    }

    #[cfg(test)]
    pub fn is_active(&self, category: EndpointCategory) -> bool {
        self.limiters
            .get(&category)
            .map(EndpointRateLimiter::is_active)
            .unwrap_or(false)
    }
}
