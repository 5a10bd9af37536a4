//! Vendor response shapes and the domain types they convert into
//!
//! Each cacheable resource implements [`Resource`]: the raw vendor JSON is
//! decoded into `Raw`, then converted into the domain type the rest of the
//! crate works with. The disk cache always holds the raw vendor bytes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::CacheError;

mod asset;
mod export;
mod host;
mod plugin;
mod scan;

pub use asset::{AssetDetail, AssetList, AssetSummary};
pub use export::{ExportChunk, ExportRequested, ExportStatus, VulnRecord};
pub use host::{HostDetail, HostScanSummary, HistoryHosts, PluginFinding};
pub use plugin::PluginDetail;
pub use scan::{HistoryEntry, HistoryRecord, Scan, ScanAggregate, ScanDetail, ScanList};

/// Converter from raw vendor bytes to a domain type
pub trait Resource: Clone + Send + Sync + 'static {
    /// Vendor JSON shape
    type Raw: DeserializeOwned;

    fn from_raw(raw: Self::Raw) -> Self;

    /// Decode raw bytes and convert.
    fn decode(bytes: &[u8]) -> Result<Self, CacheError> {
        serde_json::from_slice::<Self::Raw>(bytes)
            .map(Self::from_raw)
            .map_err(|e| CacheError::Decode {
                what: short_type_name::<Self>().to_string(),
                reason: e.to_string(),
            })
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Accept `null` as the type's default (the API returns `"history": null`).
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept either a single string or a list of strings.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => Ok(vec![s]),
        Some(OneOrMany::Many(v)) => Ok(v),
        None => Ok(Vec::new()),
    }
}

/// Accept an id as either a number or a string.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdValue {
        Integer(i64),
        String(String),
    }

    match IdValue::deserialize(deserializer)? {
        IdValue::Integer(i) => Ok(i.to_string()),
        IdValue::String(s) => Ok(s),
    }
}

/// Unix seconds to a UTC timestamp.
pub(crate) fn from_epoch(secs: Option<i64>) -> Option<chrono::DateTime<chrono::Utc>> {
    secs.and_then(|s| chrono::DateTime::from_timestamp(s, 0))
}
