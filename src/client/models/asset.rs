//! Asset models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Resource, null_default, one_or_many};

/// Entry in `GET /assets`
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetSummary {
    pub id: String,
    pub fqdn: Vec<String>,
    pub ipv4: Vec<String>,
    pub operating_system: Vec<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RawAsset {
    id: String,
    #[serde(default, deserialize_with = "one_or_many")]
    fqdn: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    ipv4: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    operating_system: Vec<String>,
    #[serde(default)]
    last_seen: Option<DateTime<Utc>>,
}

impl From<RawAsset> for AssetSummary {
    fn from(raw: RawAsset) -> Self {
        Self {
            id: raw.id,
            fqdn: raw.fqdn,
            ipv4: raw.ipv4,
            operating_system: raw.operating_system,
            last_seen: raw.last_seen,
        }
    }
}

/// `GET /assets`
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetList {
    pub assets: Vec<AssetSummary>,
}

#[derive(Debug, Deserialize)]
pub struct RawAssetList {
    #[serde(default, deserialize_with = "null_default")]
    assets: Vec<RawAsset>,
}

impl Resource for AssetList {
    type Raw = RawAssetList;

    fn from_raw(raw: RawAssetList) -> Self {
        Self {
            assets: raw.assets.into_iter().map(AssetSummary::from).collect(),
        }
    }
}

/// `GET /workbenches/assets/{asset_id}/info`
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetDetail {
    #[serde(flatten)]
    pub summary: AssetSummary,
    pub first_seen: Option<DateTime<Utc>>,
    pub netbios_name: Vec<String>,
    pub mac_address: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawAssetInfo {
    #[serde(flatten)]
    asset: RawAsset,
    #[serde(default)]
    first_seen: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "one_or_many")]
    netbios_name: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    mac_address: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawAssetDetail {
    info: RawAssetInfo,
}

impl Resource for AssetDetail {
    type Raw = RawAssetDetail;

    fn from_raw(raw: RawAssetDetail) -> Self {
        let info = raw.info;
        Self {
            summary: info.asset.into(),
            first_seen: info.first_seen,
            netbios_name: info.netbios_name,
            mac_address: info.mac_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_list_decode() {
        let list = AssetList::decode(
            br#"{"assets": [
                {"id": "a-1", "fqdn": ["web01.local"], "ipv4": ["10.0.0.1"],
                 "last_seen": "2024-03-01T12:00:00Z"},
                {"id": "a-2", "fqdn": [], "operating_system": null}
            ], "total": 2}"#,
        )
        .unwrap();

        assert_eq!(list.assets.len(), 2);
        assert_eq!(list.assets[0].fqdn, vec!["web01.local"]);
        assert!(list.assets[0].last_seen.is_some());
        assert!(list.assets[1].operating_system.is_empty());
    }

    #[test]
    fn test_asset_detail_decode() {
        let detail = AssetDetail::decode(
            br#"{"info": {"id": "a-1", "fqdn": ["web01.local"],
                          "netbios_name": "WEB01", "mac_address": ["00:11:22:33:44:55"],
                          "first_seen": "2023-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        assert_eq!(detail.summary.id, "a-1");
        assert_eq!(detail.netbios_name, vec!["WEB01"]);
        assert!(detail.first_seen.is_some());
    }

    #[test]
    fn test_asset_detail_requires_info() {
        assert!(AssetDetail::decode(br#"{"id": "a-1"}"#).is_err());
    }
}
