//! Error types for vmcache

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for vmcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl Error {
    /// Whether another attempt at the same call could succeed.
    ///
    /// Only transport failures are retryable; a 403 stops the retry loop and
    /// cache/config errors are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(api) => api.is_retryable(),
            _ => false,
        }
    }
}

/// Transport-level errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Access denied (403). Check the configured access/secret keys.")]
    Forbidden,

    #[error("Rate limit exceeded (429). Retry after {0:?}")]
    RateLimited(Duration),

    #[error("Unexpected status {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Export {export_id} ended in state {status}")]
    ExportFailed { export_id: String, status: String },
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited(_) | ApiError::Status { .. } | ApiError::Network(_)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to API".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Cache-layer errors (key resolution, disk store, decode policy)
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Template error for {endpoint}: {reason}")]
    Template { endpoint: String, reason: String },

    #[error("No cache rule matches URL: {0}")]
    NoMatchingRule(String),

    #[error("Failed to decrypt cache entry {path}: {reason}")]
    Decrypt { path: PathBuf, reason: String },

    #[error("Failed to encrypt cache entry: {0}")]
    Encrypt(String),

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error(
        "Cache entry {path} could not be decoded ({source}). Refusing to overwrite it; rerun with --clobber to discard it."
    )]
    NoClobber {
        path: PathBuf,
        #[source]
        source: Box<CacheError>,
    },

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Could not determine cache directory")]
    NoHome,
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("API keys not configured. Set access_keys and secret_keys.")]
    MissingApiKeys,

    #[error("Depth must be at least 1 (got {0})")]
    InvalidDepth(i64),

    #[error("Worker count must be at least 1 (got {0})")]
    InvalidWorkers(i64),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
