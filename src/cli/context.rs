//! Command execution context
//!
//! Loads configuration and assembles the fetch stack shared by the network
//! commands: HTTP transport, retries, memory tier and disk tier.

use std::sync::Arc;

use log::{debug, info};

use crate::cache::{self, CacheControl, CachedClient, MemoryCache};
use crate::cli::{GlobalOptions, OutputFormat};
use crate::client::{CredentialRing, HttpTransport, RetryPolicy, RetryingTransport};
use crate::config::{Config, DEFAULT_BASE_URL};
use crate::error::{ConfigError, Error, Result};

/// Transport stack used by the CLI
pub type ApiTransport = RetryingTransport<HttpTransport>;

/// Cached client used by the CLI
pub type ApiClient = CachedClient<ApiTransport>;

/// Context for command execution containing config, client, and runtime options.
pub struct CommandContext {
    /// Loaded, overridden and validated configuration
    pub config: Config,
    /// Cached client (Arc-wrapped for the worker pool and proxy)
    pub client: Arc<ApiClient>,
    pub format: OutputFormat,
    /// Cache flags for this run
    pub control: CacheControl,
}

impl CommandContext {
    /// Create a new command context with full initialization.
    ///
    /// # Errors
    /// Returns error if config cannot be loaded, fails validation, or has no
    /// usable credentials for the vendor API.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = opts.load_config()?;

        let pairs = match config.credentials() {
            Ok(pairs) => pairs,
            // A proxy holds its own keys
            Err(Error::Config(ConfigError::MissingApiKeys))
                if config.base_url != DEFAULT_BASE_URL =>
            {
                debug!(
                    "No API keys configured; sending unauthenticated requests to {}",
                    config.base_url
                );
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        debug!("Using {} credential pair(s)", pairs.len());

        let http = HttpTransport::with_headers(
            Arc::new(CredentialRing::new(pairs)),
            config.timeout(),
            &opts.proxy_headers(),
        )?;
        let transport =
            RetryingTransport::new(http, RetryPolicy::new(config.retry_intervals()));

        let mut client = CachedClient::new(transport, cache::resolver_for(&config)?)
            .with_memory(
                MemoryCache::new(config.cache.memory_max_entries),
                config.memory_ttl(),
            )
            .with_clobber(config.cache.clobber);

        match cache::open_disk(&config)? {
            Some(disk) => {
                debug!("Disk cache at {}", disk.root().display());
                client = client.with_disk(disk);
            }
            None => debug!("Disk cache disabled"),
        }

        Ok(Self {
            config,
            client: Arc::new(client),
            format: opts.format,
            control: opts.cache_control(),
        })
    }

    /// Log where this run's data came from.
    pub fn log_stats(&self) {
        info!("Fetch stats: {}", self.client.stats());
        let memory = self.client.memory();
        let (hits, misses) = memory.hit_stats();
        debug!(
            "Memory cache: {} entries, {} hits, {} misses",
            memory.len(),
            hits,
            misses
        );
    }
}
