//! File-based cache storage
//!
//! One file per cache key under the cache root, laid out by the key resolver's
//! rewrite rules. Entries carry no timestamps: an entry is fresh for as long as
//! it exists and decodes. Optionally encrypted with [`CacheCipher`].

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::crypto::CacheCipher;
use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// Byte store keyed by relative cache paths
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
    cipher: Option<CacheCipher>,
    pretty: bool,
}

impl DiskCache {
    /// Open (and create) a cache rooted at `root`.
    pub fn open_at(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;
        Ok(Self {
            root: root.to_path_buf(),
            cipher: None,
            pretty: false,
        })
    }

    pub fn with_cipher(mut self, cipher: CacheCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Pretty-print JSON payloads before writing.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn full_path(&self, key: &Path) -> PathBuf {
        self.root.join(key)
    }

    /// Read an entry. A missing file is `Ok(None)`, not an error.
    pub fn fetch(&self, key: &Path) -> Result<Option<Vec<u8>>> {
        let path = self.full_path(key);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        match &self.cipher {
            Some(cipher) => cipher.decrypt(key, &data).map(Some),
            None => Ok(Some(data)),
        }
    }

    /// Write an entry, creating parent directories.
    ///
    /// Writes go to a sibling temp file which is then renamed over the entry,
    /// so readers never observe a half-written file.
    pub fn store(&self, key: &Path, data: &[u8]) -> Result<()> {
        let path = self.full_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let pretty;
        let mut payload = data;
        if self.pretty {
            pretty = pretty_json(data);
            if let Some(ref p) = pretty {
                payload = p.as_slice();
            }
        }

        let sealed;
        if let Some(cipher) = &self.cipher {
            sealed = cipher.encrypt(payload)?;
            payload = sealed.as_slice();
        }

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, payload)
            .map_err(|e| CacheError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| CacheError::Io(format!("Failed to rename {}: {}", tmp.display(), e)))?;

        log::debug!("Stored cache entry {} ({} bytes)", key.display(), payload.len());
        Ok(())
    }

    /// Delete an entry. Best effort: a missing file is not an error.
    pub fn clear(&self, key: &Path) {
        let path = self.full_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("Cleared cache entry {}", key.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to clear {}: {}", path.display(), e),
        }
    }

    /// Remove every entry under the root.
    pub fn clear_all(&self) -> Result<ClearStats> {
        let stats = self.stats()?;

        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)
                .map_err(|e| CacheError::Io(format!("Failed to clear cache dir: {}", e)))?;
        }
        std::fs::create_dir_all(&self.root)
            .map_err(|e| CacheError::Io(format!("Failed to recreate cache dir: {}", e)))?;

        Ok(ClearStats {
            entries_removed: stats.total_entries,
        })
    }

    /// Walk the cache root and summarize its entries.
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        walk(&self.root, &mut stats)?;
        Ok(stats)
    }
}

/// Re-indent JSON; `None` if the payload is not JSON.
fn pretty_json(data: &[u8]) -> Option<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_slice(data).ok()?;
    serde_json::to_vec_pretty(&value).ok()
}

fn walk(dir: &Path, stats: &mut CacheStats) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(CacheError::Io(format!("Failed to read {}: {}", dir.display(), e))),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_dir() {
            walk(&path, stats)?;
            continue;
        }

        stats.total_entries += 1;
        stats.total_size_bytes += meta.len() as usize;
        if let Ok(modified) = meta.modified() {
            let modified: DateTime<Utc> = modified.into();
            stats.oldest_entry = Some(stats.oldest_entry.map_or(modified, |o| o.min(modified)));
            stats.newest_entry = Some(stats.newest_entry.map_or(modified, |n| n.max(modified)));
        }
    }
    Ok(())
}

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub entries_removed: usize,
}

/// Statistics about cache state
#[derive(Debug, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}
