//! Display model implementations for table and JSON output
//!
//! Display models transform domain types into CLI-friendly formats
//! with appropriate column names and serialization.

mod asset;
mod common;
mod scan;
mod vuln;

pub use asset::AssetDisplay;
pub use scan::{HistoryDisplay, ScanDisplay};
pub use vuln::VulnDisplay;
