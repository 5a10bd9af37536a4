//! Scan display models

use serde::Serialize;
use tabled::Tabled;

use super::common::{format_datetime, or_empty, truncate_string};
use crate::client::models::{HistoryRecord, Scan, ScanAggregate};

/// Scan display model for table/JSON output.
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct ScanDisplay {
    #[tabled(rename = "SCAN ID")]
    pub id: String,

    #[tabled(rename = "NAME")]
    pub name: String,

    #[tabled(rename = "STATUS")]
    pub status: String,

    #[tabled(rename = "OWNER")]
    pub owner: String,

    #[tabled(rename = "MODIFIED")]
    pub last_modified: String,
}

impl From<&Scan> for ScanDisplay {
    fn from(scan: &Scan) -> Self {
        Self {
            id: scan.id.clone(),
            name: truncate_string(&scan.name, 40),
            status: or_empty(&scan.status),
            owner: or_empty(&scan.owner),
            last_modified: format_datetime(scan.last_modified),
        }
    }
}

impl From<Scan> for ScanDisplay {
    fn from(scan: Scan) -> Self {
        Self::from(&scan)
    }
}

/// One history snapshot of an aggregated scan, with severity totals across hosts
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct HistoryDisplay {
    #[tabled(rename = "SCAN ID")]
    pub scan_id: String,

    #[tabled(rename = "SCAN")]
    pub scan: String,

    #[tabled(rename = "HISTORY")]
    pub history_id: String,

    #[tabled(rename = "STATUS")]
    pub status: String,

    #[tabled(rename = "CREATED")]
    pub created: String,

    #[tabled(rename = "HOSTS")]
    pub hosts: usize,

    #[tabled(rename = "CRIT")]
    pub critical: u32,

    #[tabled(rename = "HIGH")]
    pub high: u32,

    #[tabled(rename = "MED")]
    pub medium: u32,

    #[tabled(rename = "LOW")]
    pub low: u32,
}

impl HistoryDisplay {
    fn new(scan: &Scan, record: &HistoryRecord) -> Self {
        let mut row = Self {
            scan_id: scan.id.clone(),
            scan: truncate_string(&scan.name, 30),
            history_id: record.entry.history_id.clone(),
            status: or_empty(&record.entry.status),
            created: format_datetime(record.entry.created_at),
            hosts: record.hosts.len(),
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
        };
        for host in &record.hosts {
            row.critical += host.critical;
            row.high += host.high;
            row.medium += host.medium;
            row.low += host.low;
        }
        row
    }

    /// Rows for every history of an aggregate; a scan without history gets one
    /// placeholder row.
    pub fn rows(aggregate: &ScanAggregate) -> Vec<Self> {
        if aggregate.histories.is_empty() {
            return vec![Self::new(&aggregate.scan, &HistoryRecord::default())];
        }
        aggregate
            .histories
            .iter()
            .map(|record| Self::new(&aggregate.scan, record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::{HistoryEntry, HostScanSummary};

    fn scan() -> Scan {
        Scan {
            id: "12".to_string(),
            name: "Weekly external".to_string(),
            status: "completed".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_display() {
        let row = ScanDisplay::from(scan());
        assert_eq!(row.id, "12");
        assert_eq!(row.owner, "--");
        assert_eq!(row.last_modified, "--");
    }

    #[test]
    fn test_history_rows_sum_hosts() {
        let host = |critical, high| HostScanSummary {
            critical,
            high,
            ..Default::default()
        };
        let aggregate = ScanAggregate {
            scan: scan(),
            histories: vec![HistoryRecord {
                entry: HistoryEntry {
                    history_id: "10".to_string(),
                    status: "completed".to_string(),
                    ..Default::default()
                },
                hosts: vec![host(1, 2), host(0, 5)],
            }],
        };

        let rows = HistoryDisplay::rows(&aggregate);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].history_id, "10");
        assert_eq!(rows[0].hosts, 2);
        assert_eq!(rows[0].critical, 1);
        assert_eq!(rows[0].high, 7);
    }

    #[test]
    fn test_history_rows_without_history() {
        let aggregate = ScanAggregate {
            scan: scan(),
            histories: vec![],
        };
        let rows = HistoryDisplay::rows(&aggregate);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].history_id, "");
        assert_eq!(rows[0].status, "--");
        assert_eq!(rows[0].hosts, 0);
    }
}
