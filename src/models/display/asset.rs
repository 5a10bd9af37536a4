//! Asset display model

use serde::Serialize;
use tabled::Tabled;

use super::common::{first_of, format_datetime};
use crate::client::models::AssetSummary;

/// Asset display model for table/JSON output.
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct AssetDisplay {
    #[tabled(rename = "ASSET ID")]
    pub id: String,

    #[tabled(rename = "FQDN")]
    pub fqdn: String,

    #[tabled(rename = "IPV4")]
    pub ipv4: String,

    #[tabled(rename = "OS")]
    pub operating_system: String,

    #[tabled(rename = "LAST SEEN")]
    pub last_seen: String,
}

impl From<&AssetSummary> for AssetDisplay {
    fn from(asset: &AssetSummary) -> Self {
        Self {
            id: asset.id.clone(),
            fqdn: first_of(&asset.fqdn),
            ipv4: first_of(&asset.ipv4),
            operating_system: first_of(&asset.operating_system),
            last_seen: format_datetime(asset.last_seen),
        }
    }
}
