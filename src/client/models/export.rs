//! Vulnerability export models

use serde::{Deserialize, Serialize};

use super::{Resource, null_default, string_or_number};

/// `POST /vulns/export`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportRequested {
    pub export_uuid: String,
}

#[derive(Debug, Deserialize)]
pub struct RawExportRequested {
    export_uuid: String,
}

impl Resource for ExportRequested {
    type Raw = RawExportRequested;

    fn from_raw(raw: RawExportRequested) -> Self {
        Self {
            export_uuid: raw.export_uuid,
        }
    }
}

/// `GET /vulns/export/{export_id}/status`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportStatus {
    pub status: String,
    pub chunks_available: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawExportStatus {
    #[serde(default, deserialize_with = "null_default")]
    status: String,
    #[serde(default, deserialize_with = "null_default")]
    chunks_available: Vec<u64>,
}

impl Resource for ExportStatus {
    type Raw = RawExportStatus;

    fn from_raw(raw: RawExportStatus) -> Self {
        Self {
            status: raw.status,
            chunks_available: raw.chunks_available,
        }
    }
}

impl ExportStatus {
    pub fn is_finished(&self) -> bool {
        self.status.eq_ignore_ascii_case("FINISHED")
    }

    /// Terminal without chunks: the export will never finish.
    pub fn is_failed(&self) -> bool {
        ["ERROR", "CANCELLED"]
            .iter()
            .any(|s| self.status.eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnAsset {
    #[serde(default, deserialize_with = "null_default")]
    pub uuid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub hostname: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnPlugin {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
}

/// One finding in an export chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnRecord {
    #[serde(default)]
    pub asset: VulnAsset,
    #[serde(default)]
    pub plugin: VulnPlugin,
    #[serde(default, deserialize_with = "null_default")]
    pub severity: String,
    #[serde(default, deserialize_with = "null_default")]
    pub state: String,
    #[serde(default)]
    pub first_found: Option<String>,
    #[serde(default)]
    pub last_found: Option<String>,
}

/// `GET /vulns/export/{export_id}/chunks/{chunk_id}`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportChunk {
    pub records: Vec<VulnRecord>,
}

impl Resource for ExportChunk {
    type Raw = Vec<VulnRecord>;

    fn from_raw(raw: Vec<VulnRecord>) -> Self {
        Self { records: raw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_status() {
        let status = ExportStatus::decode(
            br#"{"status": "FINISHED", "chunks_available": [1, 2, 3]}"#,
        )
        .unwrap();
        assert!(status.is_finished());
        assert!(!status.is_failed());
        assert_eq!(status.chunks_available, vec![1, 2, 3]);

        let queued = ExportStatus::decode(br#"{"status": "QUEUED"}"#).unwrap();
        assert!(!queued.is_finished());
        assert!(queued.chunks_available.is_empty());

        let cancelled = ExportStatus::decode(br#"{"status": "CANCELLED"}"#).unwrap();
        assert!(cancelled.is_failed());
    }

    #[test]
    fn test_export_chunk_decode() {
        let chunk = ExportChunk::decode(
            br#"[
                {"asset": {"uuid": "a-1", "hostname": "web01"},
                 "plugin": {"id": 51192, "name": "Untrusted cert"},
                 "severity": "medium", "state": "OPEN"},
                {"severity": "info"}
            ]"#,
        )
        .unwrap();

        assert_eq!(chunk.records.len(), 2);
        assert_eq!(chunk.records[0].plugin.id, "51192");
        assert_eq!(chunk.records[1].asset.uuid, "");
    }
}
