//! Plugin models

use serde::{Deserialize, Serialize};

use super::{Resource, null_default, string_or_number};

/// `GET /plugins/plugin/{plugin_id}`
#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginDetail {
    pub id: String,
    pub name: String,
    pub family: String,
    pub synopsis: Option<String>,
    pub solution: Option<String>,
    pub risk_factor: Option<String>,
    pub cvss_base_score: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawAttribute {
    attribute_name: String,
    #[serde(default)]
    attribute_value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawPluginDetail {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default, deserialize_with = "null_default")]
    name: String,
    #[serde(default, deserialize_with = "null_default")]
    family_name: String,
    #[serde(default, deserialize_with = "null_default")]
    attributes: Vec<RawAttribute>,
}

impl Resource for PluginDetail {
    type Raw = RawPluginDetail;

    fn from_raw(raw: RawPluginDetail) -> Self {
        let attribute = |name: &str| {
            raw.attributes
                .iter()
                .find(|a| a.attribute_name == name)
                .and_then(|a| a.attribute_value.clone())
        };

        Self {
            synopsis: attribute("synopsis"),
            solution: attribute("solution"),
            risk_factor: attribute("risk_factor"),
            cvss_base_score: attribute("cvss_base_score"),
            id: raw.id,
            name: raw.name,
            family: raw.family_name,
        }
    }
}
