//! Configuration management for vmcache

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::credentials::CredentialPair;
use crate::error::{ConfigError, Result};

pub const DEFAULT_BASE_URL: &str = "https://cloud.tenable.com";

/// Application configuration
///
/// Loaded from `~/.vmcache/config.yaml` (or `--config`), then adjusted by
/// command-line overrides before being handed to the core as a plain struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API base URL (or a running vmcache proxy)
    pub base_url: String,

    /// Comma-separated access keys, paired positionally with `secret_keys`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_keys: Option<String>,

    /// Comma-separated secret keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_keys: Option<String>,

    /// Number of aggregation workers
    pub workers: i64,

    /// History snapshots expanded per scan
    pub depth: i64,

    /// Assets per vulnerability export chunk
    pub export_chunk_size: u32,

    /// Backoff delays between retries, in milliseconds
    pub retry_intervals_ms: Vec<u64>,

    /// Hard timeout for a single API call
    pub timeout_secs: u64,

    pub cache: CacheSettings,

    pub proxy: ProxySettings,
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache root folder (defaults to the XDG cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,

    pub enabled: bool,

    /// Encrypt entries and hash filename components
    pub crypto: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub crypto_key: Option<String>,

    /// Discard undecodable entries instead of failing
    pub clobber: bool,

    /// Pretty-print JSON payloads before writing; entries then read back
    /// reformatted rather than byte for byte
    pub pretty: bool,

    pub memory_ttl_secs: u64,

    pub memory_max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            folder: None,
            enabled: true,
            crypto: false,
            crypto_key: None,
            clobber: false,
            pretty: false,
            memory_ttl_secs: 60 * 60,
            memory_max_entries: 4096,
        }
    }
}

/// Proxy server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub listen: String,
    pub shutdown_grace_secs: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8383".to_string(),
            shutdown_grace_secs: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_keys: None,
            secret_keys: None,
            workers: 5,
            depth: 1,
            export_chunk_size: 1000,
            retry_intervals_ms: vec![1000, 2000, 5000, 10000],
            timeout_secs: 300,
            cache: CacheSettings::default(),
            proxy: ProxySettings::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".vmcache").join("config.yaml"))
    }

    /// Load from an explicit path, or from the default path.
    ///
    /// A missing file at the default location yields defaults; a missing file
    /// the user asked for explicitly is an error.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(Path::new(p)),
            None => {
                let default = Self::default_path()?;
                if default.exists() {
                    Self::load_from(&default)
                } else {
                    log::debug!("No config at {}, using defaults", default.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Resolved cache root folder
    pub fn cache_folder(&self) -> Result<PathBuf> {
        match &self.cache.folder {
            Some(folder) => Ok(folder.clone()),
            None => {
                let base = dirs::cache_dir().ok_or(crate::error::CacheError::NoHome)?;
                Ok(base.join("vmcache"))
            }
        }
    }

    pub fn retry_intervals(&self) -> Vec<Duration> {
        self.retry_intervals_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    pub fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.memory_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validated worker count
    pub fn worker_count(&self) -> Result<usize> {
        if self.workers < 1 {
            return Err(ConfigError::InvalidWorkers(self.workers).into());
        }
        Ok(self.workers as usize)
    }

    /// Validated history depth
    pub fn history_depth(&self) -> Result<usize> {
        if self.depth < 1 {
            return Err(ConfigError::InvalidDepth(self.depth).into());
        }
        Ok(self.depth as usize)
    }

    /// Zip `access_keys` and `secret_keys` into credential pairs.
    pub fn credentials(&self) -> Result<Vec<CredentialPair>> {
        let (Some(access), Some(secret)) = (&self.access_keys, &self.secret_keys) else {
            return Err(ConfigError::MissingApiKeys.into());
        };

        let access: Vec<&str> = split_keys(access);
        let secret: Vec<&str> = split_keys(secret);

        if access.is_empty() || secret.is_empty() {
            return Err(ConfigError::MissingApiKeys.into());
        }
        if access.len() != secret.len() {
            return Err(ConfigError::Invalid(format!(
                "{} access keys but {} secret keys",
                access.len(),
                secret.len()
            ))
            .into());
        }

        Ok(access
            .into_iter()
            .zip(secret)
            .map(|(a, s)| CredentialPair::new(a, s))
            .collect())
    }

    /// Check settings that would make every run fail.
    pub fn validate(&self) -> Result<()> {
        self.worker_count()?;
        self.history_depth()?;

        if self.cache.crypto && self.cache.crypto_key.as_deref().unwrap_or("").is_empty() {
            return Err(
                ConfigError::Invalid("cache.crypto is on but cache.crypto_key is empty".into())
                    .into(),
            );
        }
        if self.export_chunk_size == 0 {
            return Err(ConfigError::Invalid("export_chunk_size must be positive".into()).into());
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()).into());
        }
        Ok(())
    }
}

fn split_keys(keys: &str) -> Vec<&str> {
    keys.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect()
}
