//! Cache-aware API client
//!
//! Every read goes memory → disk → transport. A transport result is written
//! back to both tiers. A disk entry that exists but cannot be decrypted or
//! decoded is never discarded silently: unless clobber mode is on the fetch
//! fails with [`CacheError::NoClobber`] and the file is left untouched.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, warn};

use super::key::{Endpoint, KeyResolver, Params};
use super::memory::{DEFAULT_TTL, MemoryCache};
use super::storage::DiskCache;
use crate::client::Transport;
use crate::client::models::Resource;
use crate::error::{CacheError, Result};

/// Per-call cache flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControl {
    /// Return a cached value without calling the transport
    pub skip_on_hit: bool,
    /// Persist a fresh transport result
    pub write_on_return: bool,
}

impl Default for CacheControl {
    fn default() -> Self {
        Self {
            skip_on_hit: true,
            write_on_return: true,
        }
    }
}

/// Where fetched values came from
#[derive(Debug, Default)]
pub struct FetchStats {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    transport_calls: AtomicU64,
}

/// Point-in-time copy of [`FetchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStatsSnapshot {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub transport_calls: u64,
}

impl FetchStats {
    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            transport_calls: self.transport_calls.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for FetchStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} memory hits, {} disk hits, {} API calls",
            self.memory_hits, self.disk_hits, self.transport_calls
        )
    }
}

/// FetchOrFill over any [`Transport`].
pub struct CachedClient<T: Transport> {
    transport: T,
    resolver: KeyResolver,
    disk: Option<DiskCache>,
    memory: MemoryCache,
    memory_ttl: Duration,
    clobber: bool,
    stats: FetchStats,
}

impl<T: Transport> CachedClient<T> {
    /// A client with an in-memory tier only.
    pub fn new(transport: T, resolver: KeyResolver) -> Self {
        Self {
            transport,
            resolver,
            disk: None,
            memory: MemoryCache::default(),
            memory_ttl: DEFAULT_TTL,
            clobber: false,
            stats: FetchStats::default(),
        }
    }

    pub fn with_disk(mut self, disk: DiskCache) -> Self {
        self.disk = Some(disk);
        self
    }

    pub fn with_memory(mut self, memory: MemoryCache, ttl: Duration) -> Self {
        self.memory = memory;
        self.memory_ttl = ttl;
        self
    }

    /// Allow undecodable disk entries to be deleted and refetched.
    pub fn with_clobber(mut self, clobber: bool) -> Self {
        self.clobber = clobber;
        self
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn stats(&self) -> FetchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Fetch and convert a resource.
    pub async fn fetch<R: Resource>(
        &self,
        endpoint: Endpoint,
        params: &Params,
        control: CacheControl,
    ) -> Result<R> {
        self.fill(endpoint, params, control, R::decode).await
    }

    /// Fetch the raw vendor bytes, checked to be well-formed JSON.
    pub async fn fetch_raw(
        &self,
        endpoint: Endpoint,
        params: &Params,
        control: CacheControl,
    ) -> Result<Vec<u8>> {
        self.fill(endpoint, params, control, validate_json).await
    }

    async fn fill<V, D>(
        &self,
        endpoint: Endpoint,
        params: &Params,
        control: CacheControl,
        decode: D,
    ) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
        D: Fn(&[u8]) -> std::result::Result<V, CacheError> + Send + Sync,
    {
        let url = self.resolver.to_url(endpoint, params)?;

        if !endpoint.spec().cacheable {
            let bytes = self.call_transport(endpoint, &url, params).await?;
            return Ok(decode(&bytes)?);
        }

        let memory_key = format!("{}|{}", std::any::type_name::<V>(), url);
        if control.skip_on_hit
            && let Some(value) = self.memory.get::<V>(&memory_key)
        {
            debug!("Memory hit: {}", url);
            self.stats.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let cache_key = self.resolver.to_cache_key(&url)?;

        if control.skip_on_hit
            && let Some(disk) = &self.disk
            && let Some(value) = self.read_disk(disk, &cache_key, &decode)?
        {
            debug!("Disk hit: {} ({})", url, cache_key.display());
            self.stats.disk_hits.fetch_add(1, Ordering::Relaxed);
            self.memory.set(&memory_key, value.clone(), self.memory_ttl);
            return Ok(value);
        }

        let bytes = self.call_transport(endpoint, &url, params).await?;
        let value = decode(&bytes)?;

        if control.write_on_return {
            if let Some(disk) = &self.disk {
                disk.store(&cache_key, &bytes)?;
            }
            self.memory.set(&memory_key, value.clone(), self.memory_ttl);
        }

        Ok(value)
    }

    /// Read and decode a disk entry, applying the clobber policy on failure.
    ///
    /// `Ok(None)` means "go to the transport": either no entry, or a bad entry
    /// that clobber mode just removed.
    fn read_disk<V, D>(&self, disk: &DiskCache, key: &Path, decode: &D) -> Result<Option<V>>
    where
        D: Fn(&[u8]) -> std::result::Result<V, CacheError>,
    {
        let failure = match disk.fetch(key) {
            Ok(None) => return Ok(None),
            Ok(Some(bytes)) => match decode(&bytes) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => e,
            },
            Err(e @ CacheError::Decrypt { .. }) => e,
            Err(e) => return Err(e.into()),
        };

        if !self.clobber {
            return Err(CacheError::NoClobber {
                path: disk.full_path(key),
                source: Box::new(failure),
            }
            .into());
        }

        warn!(
            "Discarding unreadable cache entry {}: {}",
            disk.full_path(key).display(),
            failure
        );
        disk.clear(key);
        Ok(None)
    }

    async fn call_transport(&self, endpoint: Endpoint, url: &str, params: &Params) -> Result<Vec<u8>> {
        let body = self.resolver.to_body(endpoint, params)?;
        self.stats.transport_calls.fetch_add(1, Ordering::Relaxed);
        let response = self
            .transport
            .call(
                endpoint.spec().method.clone(),
                url,
                body.as_deref().map(str::as_bytes),
            )
            .await?;
        Ok(response.body)
    }
}

fn validate_json(bytes: &[u8]) -> std::result::Result<Vec<u8>, CacheError> {
    serde_json::from_slice::<serde::de::IgnoredAny>(bytes)
        .map(|_| bytes.to_vec())
        .map_err(|e| CacheError::Decode {
            what: "JSON payload".to_string(),
            reason: e.to_string(),
        })
}
