//! Two-tier response cache
//!
//! Decoded objects live in a bounded in-process [`MemoryCache`]; raw vendor
//! payloads live on disk in a [`DiskCache`] laid out by the [`KeyResolver`].
//! [`CachedClient`] ties both tiers to a transport.

pub mod client;
pub mod crypto;
pub mod key;
pub mod memory;
pub mod storage;

pub use client::{CacheControl, CachedClient, FetchStatsSnapshot};
pub use crypto::CacheCipher;
pub use key::{Endpoint, KeyResolver, Params};
pub use memory::MemoryCache;
pub use storage::{CacheStats, ClearStats, DiskCache};

use crate::config::Config;
use crate::error::{ConfigError, Result};

/// Resolver for the configured base URL, hashing filenames in crypto mode.
pub fn resolver_for(config: &Config) -> Result<KeyResolver> {
    let resolver = KeyResolver::new(&config.base_url);
    if config.cache.crypto {
        let key = crypto_key(config)?;
        return Ok(resolver.with_hash_key(key));
    }
    Ok(resolver)
}

/// Open the configured disk cache, or `None` when caching is disabled.
pub fn open_disk(config: &Config) -> Result<Option<DiskCache>> {
    if !config.cache.enabled {
        return Ok(None);
    }

    let mut disk = DiskCache::open_at(&config.cache_folder()?)?.with_pretty(config.cache.pretty);
    if config.cache.crypto {
        disk = disk.with_cipher(CacheCipher::new(crypto_key(config)?));
    }
    Ok(Some(disk))
}

fn crypto_key(config: &Config) -> Result<&str> {
    config
        .cache
        .crypto_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ConfigError::Invalid("cache.crypto requires cache.crypto_key".into()).into())
}
