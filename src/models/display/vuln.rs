//! Exported vulnerability display model

use serde::Serialize;
use tabled::Tabled;

use super::common::{EMPTY, or_empty, truncate_string};
use crate::client::models::VulnRecord;

#[derive(Debug, Clone, Tabled, Serialize)]
pub struct VulnDisplay {
    #[tabled(rename = "HOST")]
    pub host: String,

    #[tabled(rename = "PLUGIN")]
    pub plugin_id: String,

    #[tabled(rename = "NAME")]
    pub name: String,

    #[tabled(rename = "SEVERITY")]
    pub severity: String,

    #[tabled(rename = "STATE")]
    pub state: String,

    #[tabled(rename = "LAST FOUND")]
    pub last_found: String,
}

impl From<&VulnRecord> for VulnDisplay {
    fn from(record: &VulnRecord) -> Self {
        let host = if record.asset.hostname.is_empty() {
            or_empty(&record.asset.uuid)
        } else {
            record.asset.hostname.clone()
        };
        Self {
            host,
            plugin_id: or_empty(&record.plugin.id),
            name: truncate_string(&record.plugin.name, 50),
            severity: or_empty(&record.severity),
            state: or_empty(&record.state),
            last_found: record
                .last_found
                .clone()
                .unwrap_or_else(|| EMPTY.to_string()),
        }
    }
}
