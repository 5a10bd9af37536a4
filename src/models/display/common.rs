//! Common display utilities and helpers

use chrono::{DateTime, Utc};

/// Placeholder for empty cells
pub const EMPTY: &str = "--";

/// Truncate string to max characters with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an optional timestamp as `YYYY-MM-DD HH:MM` UTC
pub fn format_datetime(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| EMPTY.to_string())
}

/// Text or the empty placeholder
pub fn or_empty(s: &str) -> String {
    if s.is_empty() {
        EMPTY.to_string()
    } else {
        s.to_string()
    }
}

/// First value of a list, with a `(+N)` suffix for the rest
pub fn first_of(values: &[String]) -> String {
    match values {
        [] => EMPTY.to_string(),
        [only] => only.clone(),
        [first, rest @ ..] => format!("{} (+{})", first, rest.len()),
    }
}
