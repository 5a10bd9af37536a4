//! Scan models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::host::HostScanSummary;
use super::{Resource, from_epoch, null_default, string_or_number};

/// A configured scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scan {
    pub id: String,
    pub uuid: String,
    pub name: String,
    pub status: String,
    pub owner: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RawScan {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default, deserialize_with = "null_default")]
    uuid: String,
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    status: String,
    #[serde(default, deserialize_with = "null_default")]
    owner: String,
    #[serde(default)]
    last_modification_date: Option<i64>,
}

impl From<RawScan> for Scan {
    fn from(raw: RawScan) -> Self {
        Self {
            id: raw.id,
            uuid: raw.uuid,
            name: raw.name,
            status: raw.status,
            owner: raw.owner,
            last_modified: from_epoch(raw.last_modification_date),
        }
    }
}

/// `GET /scans`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanList {
    pub scans: Vec<Scan>,
}

#[derive(Debug, Deserialize)]
pub struct RawScanList {
    #[serde(default, deserialize_with = "null_default")]
    scans: Vec<RawScan>,
}

impl Resource for ScanList {
    type Raw = RawScanList;

    fn from_raw(raw: RawScanList) -> Self {
        Self {
            scans: raw.scans.into_iter().map(Scan::from).collect(),
        }
    }
}

/// One historical run of a scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub history_id: String,
    pub uuid: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RawHistoryEntry {
    #[serde(deserialize_with = "string_or_number")]
    history_id: String,
    #[serde(default, deserialize_with = "null_default")]
    uuid: String,
    #[serde(default, deserialize_with = "null_default")]
    status: String,
    #[serde(default)]
    creation_date: Option<i64>,
}

/// `GET /scans/{scan_id}`: scan info plus its run history
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanDetail {
    pub name: String,
    pub status: String,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawScanInfo {
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct RawScanDetail {
    #[serde(default)]
    info: RawScanInfo,
    #[serde(default, deserialize_with = "null_default")]
    history: Vec<RawHistoryEntry>,
}

impl Resource for ScanDetail {
    type Raw = RawScanDetail;

    fn from_raw(raw: RawScanDetail) -> Self {
        Self {
            name: raw.info.name,
            status: raw.info.status,
            history: raw
                .history
                .into_iter()
                .map(|h| HistoryEntry {
                    history_id: h.history_id,
                    uuid: h.uuid,
                    status: h.status,
                    created_at: from_epoch(h.creation_date),
                })
                .collect(),
        }
    }
}

impl ScanDetail {
    /// The `depth` most recent history entries, newest first.
    pub fn latest(&self, depth: usize) -> Vec<HistoryEntry> {
        let mut history = self.history.clone();
        // Stable sort keeps API order for entries without a date
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.truncate(depth);
        history
    }
}

/// A history entry with its hosts filled in
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryRecord {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub hosts: Vec<HostScanSummary>,
}

/// A scan and its enriched history: one unit of pipeline output
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanAggregate {
    pub scan: Scan,
    pub histories: Vec<HistoryRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_list_decode() {
        let list = ScanList::decode(
            br#"{"folders": [], "scans": [
                {"id": 12, "uuid": "u-12", "name": "Weekly", "status": "completed",
                 "owner": "ops", "last_modification_date": 1700000000},
                {"id": "13", "name": null}
            ]}"#,
        )
        .unwrap();

        assert_eq!(list.scans.len(), 2);
        assert_eq!(list.scans[0].id, "12");
        assert_eq!(list.scans[0].name, "Weekly");
        assert!(list.scans[0].last_modified.is_some());
        assert_eq!(list.scans[1].id, "13");
        assert_eq!(list.scans[1].name, "");
    }

    #[test]
    fn test_scan_list_null_scans() {
        let list = ScanList::decode(br#"{"scans": null}"#).unwrap();
        assert!(list.scans.is_empty());
    }

    #[test]
    fn test_scan_detail_latest() {
        let detail = ScanDetail::decode(
            br#"{"info": {"name": "Weekly", "status": "completed"}, "history": [
                {"history_id": 1, "status": "completed", "creation_date": 1000},
                {"history_id": 3, "status": "completed", "creation_date": 3000},
                {"history_id": 2, "status": "completed", "creation_date": 2000}
            ]}"#,
        )
        .unwrap();

        let latest = detail.latest(2);
        let ids: Vec<&str> = latest.iter().map(|h| h.history_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
    }

    #[test]
    fn test_scan_detail_null_history() {
        let detail = ScanDetail::decode(br#"{"info": {"name": "New"}, "history": null}"#).unwrap();
        assert!(detail.history.is_empty());
        assert!(detail.latest(5).is_empty());
    }

    #[test]
    fn test_scan_detail_rejects_truncated() {
        assert!(ScanDetail::decode(br#"{"info": {"name": "Wee"#).is_err());
    }
}
