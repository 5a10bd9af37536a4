//! Cache management commands

use chrono::{DateTime, Local, Utc};

use crate::cache::DiskCache;
use crate::cli::{GlobalOptions, OutputFormat};
use crate::error::Result;

fn open(opts: &GlobalOptions) -> Result<DiskCache> {
    let config = opts.load_config()?;
    Ok(DiskCache::open_at(&config.cache_folder()?)?)
}

fn local_time(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
}

/// Show cache status/statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let cache = open(opts)?;
    let stats = cache.stats()?;
    let path = cache.root().display().to_string();

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "total_entries": stats.total_entries,
                "total_size_bytes": stats.total_size_bytes,
                "total_size_human": format_size(stats.total_size_bytes),
                "oldest_entry": stats.oldest_entry.map(|dt| dt.to_rfc3339()),
                "newest_entry": stats.newest_entry.map(|dt| dt.to_rfc3339()),
                "path": path,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", path);
            println!("Entries:        {}", stats.total_entries);
            println!("Total size:     {}", format_size(stats.total_size_bytes));

            if let Some(oldest) = local_time(stats.oldest_entry) {
                println!("Oldest entry:   {}", oldest);
            }
            if let Some(newest) = local_time(stats.newest_entry) {
                println!("Newest entry:   {}", newest);
            }
        }
    }

    Ok(())
}

/// Clear all cache entries
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let stats = open(opts)?.clear_all()?;

    match opts.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            if stats.entries_removed > 0 {
                println!("Cleared {} cache entries", stats.entries_removed);
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    let config = opts.load_config()?;
    println!("{}", config.cache_folder()?.display());
    Ok(())
}

/// Format bytes as human-readable size
fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
