//! Global CLI options shared across all commands
//!
//! Collects the global flags once so handlers take a single argument.

use crate::cache::CacheControl;
use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::proxy::{SKIP_ON_HIT_HEADER, WRITE_ON_RETURN_HEADER};

/// Global CLI options passed to all command handlers.
///
/// # Precedence
///
/// CLI flag > environment variable > config file > default. This struct holds
/// the CLI/env layer; [`GlobalOptions::load_config`] folds it into the file.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub format: OutputFormat,

    /// Custom config file path (defaults to ~/.vmcache/config.yaml)
    pub config: Option<String>,

    /// Disable the disk cache for this run
    pub no_cache: bool,

    /// Discard undecodable cache entries instead of refusing to overwrite them
    pub clobber: bool,

    pub workers: Option<i64>,

    pub depth: Option<i64>,

    /// API base URL override (vendor API or a vmcache proxy)
    pub base_url: Option<String>,

    pub skip_on_hit: Option<bool>,

    pub write_on_return: Option<bool>,
}

impl GlobalOptions {
    /// Create GlobalOptions from a parsed CLI struct.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            config: cli.config.clone(),
            no_cache: cli.no_cache,
            clobber: cli.clobber,
            workers: cli.workers,
            depth: cli.depth,
            base_url: cli.base_url.clone(),
            skip_on_hit: cli.skip_on_hit,
            write_on_return: cli.write_on_return,
        }
    }

    /// Get config path as `Option<&str>`.
    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    /// Load the config file, apply flag overrides and validate the result.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_at(self.config_ref())?;

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(depth) = self.depth {
            config.depth = depth;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if self.clobber {
            config.cache.clobber = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Cache flags for fetches made by this run
    pub fn cache_control(&self) -> CacheControl {
        let defaults = CacheControl::default();
        CacheControl {
            skip_on_hit: self.skip_on_hit.unwrap_or(defaults.skip_on_hit),
            write_on_return: self.write_on_return.unwrap_or(defaults.write_on_return),
        }
    }

    /// Headers forwarded to a caching proxy for the flags set explicitly
    pub fn proxy_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(skip) = self.skip_on_hit {
            headers.push((SKIP_ON_HIT_HEADER.to_string(), skip.to_string()));
        }
        if let Some(write) = self.write_on_return {
            headers.push((WRITE_ON_RETURN_HEADER.to_string(), write.to_string()));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, Error};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_overrides_apply_over_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "base_url: https://vm.example\nworkers: 2\ndepth: 3\n");

        let opts = GlobalOptions {
            config: Some(path),
            workers: Some(9),
            base_url: Some("http://127.0.0.1:8383/".to_string()),
            no_cache: true,
            clobber: true,
            ..Default::default()
        };
        let config = opts.load_config().unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:8383");
        assert_eq!(config.workers, 9);
        assert_eq!(config.depth, 3);
        assert!(!config.cache.enabled);
        assert!(config.cache.clobber);
    }

    #[test]
    fn test_invalid_depth_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "depth: 1\n");

        let opts = GlobalOptions {
            config: Some(path),
            depth: Some(0),
            ..Default::default()
        };
        match opts.load_config() {
            Err(Error::Config(ConfigError::InvalidDepth(0))) => {}
            other => panic!("Expected InvalidDepth, got {:?}", other.map(|c| c.depth)),
        }
    }

    #[test]
    fn test_missing_explicit_config() {
        let opts = GlobalOptions {
            config: Some("/nonexistent/vmcache/config.yaml".to_string()),
            ..Default::default()
        };
        match opts.load_config() {
            Err(Error::Config(ConfigError::NotFound(path))) => {
                assert_eq!(path, PathBuf::from("/nonexistent/vmcache/config.yaml"));
            }
            other => panic!("Expected NotFound, got {:?}", other.map(|c| c.depth)),
        }
    }

    #[test]
    fn test_cache_control_and_headers() {
        let opts = GlobalOptions::default();
        assert_eq!(opts.cache_control(), CacheControl::default());
        assert!(opts.proxy_headers().is_empty());

        let opts = GlobalOptions {
            skip_on_hit: Some(false),
            ..Default::default()
        };
        let control = opts.cache_control();
        assert!(!control.skip_on_hit);
        assert!(control.write_on_return);
        assert_eq!(
            opts.proxy_headers(),
            vec![(SKIP_ON_HIT_HEADER.to_string(), "false".to_string())]
        );
    }
}
