//! Display models for CLI output
//!
//! Converts domain types into table rows and JSON-friendly shapes.

pub mod display;

pub use display::{AssetDisplay, HistoryDisplay, ScanDisplay, VulnDisplay};
