//! Host models

use serde::{Deserialize, Serialize};

use super::asset::AssetDetail;
use super::plugin::PluginDetail;
use super::{Resource, null_default, one_or_many, string_or_number};

/// A host seen in one scan run, with optional enrichment
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostScanSummary {
    pub host_id: String,
    /// Asset UUID, when the API reports one
    pub asset_id: Option<String>,
    pub hostname: String,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub info: u32,
    /// `None` when the host detail lookup failed
    pub detail: Option<HostDetail>,
    /// `None` when there is no asset id or the lookup failed
    pub asset: Option<AssetDetail>,
}

#[derive(Debug, Deserialize)]
pub struct RawHost {
    #[serde(deserialize_with = "string_or_number")]
    host_id: String,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    hostname: String,
    #[serde(default)]
    critical: u32,
    #[serde(default)]
    high: u32,
    #[serde(default)]
    medium: u32,
    #[serde(default)]
    low: u32,
    #[serde(default)]
    info: u32,
}

/// `GET /scans/{scan_id}?history_id={history_id}`: hosts in one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryHosts {
    pub hosts: Vec<HostScanSummary>,
}

#[derive(Debug, Deserialize)]
pub struct RawHistoryHosts {
    #[serde(default, deserialize_with = "null_default")]
    hosts: Vec<RawHost>,
}

impl Resource for HistoryHosts {
    type Raw = RawHistoryHosts;

    fn from_raw(raw: RawHistoryHosts) -> Self {
        Self {
            hosts: raw
                .hosts
                .into_iter()
                .map(|h| HostScanSummary {
                    host_id: h.host_id,
                    asset_id: h.uuid.filter(|u| !u.is_empty()),
                    hostname: h.hostname,
                    critical: h.critical,
                    high: h.high,
                    medium: h.medium,
                    low: h.low,
                    info: h.info,
                    detail: None,
                    asset: None,
                })
                .collect(),
        }
    }
}

/// A plugin that fired on a host
#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginFinding {
    pub plugin_id: String,
    pub name: String,
    pub family: String,
    pub severity: u8,
    pub count: u32,
    /// `None` when the plugin lookup failed
    pub detail: Option<PluginDetail>,
}

/// `GET /scans/{scan_id}/hosts/{host_id}?history_id={history_id}`
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostDetail {
    pub fqdn: String,
    pub ip: String,
    pub operating_system: Vec<String>,
    pub findings: Vec<PluginFinding>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawHostInfo {
    #[serde(default, rename = "host-fqdn", deserialize_with = "null_default")]
    fqdn: String,
    #[serde(default, rename = "host-ip", deserialize_with = "null_default")]
    ip: String,
    #[serde(default, rename = "operating-system", deserialize_with = "one_or_many")]
    operating_system: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawVulnerability {
    #[serde(deserialize_with = "string_or_number")]
    plugin_id: String,
    #[serde(default, deserialize_with = "null_default")]
    plugin_name: String,
    #[serde(default, deserialize_with = "null_default")]
    plugin_family: String,
    #[serde(default)]
    severity: u8,
    #[serde(default)]
    count: u32,
}

#[derive(Debug, Deserialize)]
pub struct RawHostDetail {
    #[serde(default)]
    info: RawHostInfo,
    #[serde(default, deserialize_with = "null_default")]
    vulnerabilities: Vec<RawVulnerability>,
}

impl Resource for HostDetail {
    type Raw = RawHostDetail;

    fn from_raw(raw: RawHostDetail) -> Self {
        Self {
            fqdn: raw.info.fqdn,
            ip: raw.info.ip,
            operating_system: raw.info.operating_system,
            findings: raw
                .vulnerabilities
                .into_iter()
                .map(|v| PluginFinding {
                    plugin_id: v.plugin_id,
                    name: v.plugin_name,
                    family: v.plugin_family,
                    severity: v.severity,
                    count: v.count,
                    detail: None,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_hosts_decode() {
        let hosts = HistoryHosts::decode(
            br#"{"info": {}, "hosts": [
                {"host_id": 2, "hostname": "10.0.0.2", "uuid": "a-2", "critical": 1, "high": 2},
                {"host_id": 5, "hostname": "db01", "uuid": ""}
            ]}"#,
        )
        .unwrap();

        assert_eq!(hosts.hosts.len(), 2);
        assert_eq!(hosts.hosts[0].host_id, "2");
        assert_eq!(hosts.hosts[0].asset_id.as_deref(), Some("a-2"));
        assert_eq!(hosts.hosts[0].critical, 1);
        assert!(hosts.hosts[1].asset_id.is_none());
        assert!(hosts.hosts[1].detail.is_none());
    }

    #[test]
    fn test_host_detail_preserves_finding_order() {
        let detail = HostDetail::decode(
            br#"{"info": {"host-fqdn": "db01.local", "host-ip": "10.0.0.5",
                          "operating-system": "Linux Kernel 5.4"},
                 "vulnerabilities": [
                    {"plugin_id": 19506, "plugin_name": "Scan Info", "severity": 0, "count": 1},
                    {"plugin_id": 11219, "plugin_name": "SYN scanner", "severity": 0, "count": 4},
                    {"plugin_id": 51192, "plugin_name": "Untrusted cert", "severity": 2, "count": 1}
                 ]}"#,
        )
        .unwrap();

        assert_eq!(detail.fqdn, "db01.local");
        assert_eq!(detail.operating_system, vec!["Linux Kernel 5.4"]);
        let ids: Vec<&str> = detail.findings.iter().map(|f| f.plugin_id.as_str()).collect();
        assert_eq!(ids, vec!["19506", "11219", "51192"]);
    }
}
