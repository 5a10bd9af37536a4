//! JSON output formatting
//!
//! Lists print as one enveloped document; streamed results (aggregates,
//! export records) print as JSON lines so they can be piped as they arrive.

use std::io::Write;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T> {
    /// The actual data
    pub data: T,

    /// Metadata about the response
    pub meta: Metadata,
}

/// Metadata included in JSON output
#[derive(Debug, Serialize, Deserialize)]
pub struct Metadata {
    /// Timestamp of the response
    pub timestamp: String,

    /// CLI version
    pub version: String,
}

impl<T> JsonOutput<T> {
    /// Create a new JSON output with metadata
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// Format data as pretty-printed JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> std::result::Result<String, serde_json::Error> {
    let output = JsonOutput::new(data);
    serde_json::to_string_pretty(&output)
}

/// Write one value as a single compact JSON line
pub fn write_json_line<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::{Scan, ScanAggregate};

    #[test]
    fn test_json_output_new() {
        let output = JsonOutput::new(vec!["12", "40"]);

        assert_eq!(output.data, vec!["12", "40"]);
        assert_eq!(output.meta.version, env!("CARGO_PKG_VERSION"));
        assert!(!output.meta.timestamp.is_empty());
    }

    #[test]
    fn test_format_json_envelope() {
        let scans = vec![Scan {
            id: "12".to_string(),
            name: "Weekly".to_string(),
            ..Default::default()
        }];

        let result = format_json(&scans).unwrap();

        assert!(result.contains("\"data\""));
        assert!(result.contains("\"meta\""));
        assert!(result.contains("\"id\": \"12\""));
        assert!(result.contains("\"name\": \"Weekly\""));
    }

    #[test]
    fn test_format_json_empty_vec() {
        let scans: Vec<Scan> = vec![];
        let result = format_json(&scans).unwrap();

        assert!(result.contains("\"data\": []"));
    }

    #[test]
    fn test_json_lines_are_single_line() {
        let mut out = Vec::new();
        for id in ["1", "2"] {
            let aggregate = ScanAggregate {
                scan: Scan {
                    id: id.to_string(),
                    ..Default::default()
                },
                histories: vec![],
            };
            write_json_line(&mut out, &aggregate).unwrap();
        }

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["scan"]["id"], "1");
        assert_eq!(first["histories"], serde_json::json!([]));
    }
}
