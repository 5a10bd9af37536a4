//! Endpoint URLs and on-disk cache keys
//!
//! Every logical request is an [`Endpoint`] plus a parameter set. The resolver
//! renders the endpoint's URL template, then maps the canonical URL onto a
//! relative cache path using an ordered list of rewrite rules: the first rule
//! whose regex matches wins, and its captured groups are substituted into the
//! rule's filename template (`$1`, `$2`, ...). In crypto mode every captured
//! group is replaced by a keyed, truncated SHA-256 digest so filenames reveal
//! nothing without the key.

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// Logical API endpoints known to the cache layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ScanList,
    ScanDetail,
    ScanHistory,
    HostDetail,
    PluginDetail,
    AssetList,
    AssetDetail,
    VulnExportRequest,
    VulnExportStatus,
    VulnExportChunk,
}

/// Static description of one endpoint
#[derive(Debug)]
pub struct EndpointSpec {
    pub method: reqwest::Method,
    pub url: &'static str,
    pub body: Option<&'static str>,
    /// Whether responses go through the memory and disk caches
    pub cacheable: bool,
}

impl Endpoint {
    pub const ALL: [Endpoint; 10] = [
        Endpoint::ScanList,
        Endpoint::ScanDetail,
        Endpoint::ScanHistory,
        Endpoint::HostDetail,
        Endpoint::PluginDetail,
        Endpoint::AssetList,
        Endpoint::AssetDetail,
        Endpoint::VulnExportRequest,
        Endpoint::VulnExportStatus,
        Endpoint::VulnExportChunk,
    ];

    /// The process-wide endpoint table
    pub fn spec(&self) -> &'static EndpointSpec {
        static TABLE: OnceLock<Vec<EndpointSpec>> = OnceLock::new();
        let table = TABLE.get_or_init(|| {
            Endpoint::ALL
                .iter()
                .map(|endpoint| endpoint.build_spec())
                .collect()
        });
        &table[*self as usize]
    }

    fn build_spec(&self) -> EndpointSpec {
        let get = |url| EndpointSpec {
            method: reqwest::Method::GET,
            url,
            body: None,
            cacheable: true,
        };
        match self {
            Endpoint::ScanList => get("{base_url}/scans"),
            Endpoint::ScanDetail => get("{base_url}/scans/{scan_id}"),
            Endpoint::ScanHistory => get("{base_url}/scans/{scan_id}?history_id={history_id}"),
            Endpoint::HostDetail => {
                get("{base_url}/scans/{scan_id}/hosts/{host_id}?history_id={history_id}")
            }
            Endpoint::PluginDetail => get("{base_url}/plugins/plugin/{plugin_id}"),
            Endpoint::AssetList => get("{base_url}/assets"),
            Endpoint::AssetDetail => get("{base_url}/workbenches/assets/{asset_id}/info"),
            Endpoint::VulnExportRequest => EndpointSpec {
                method: reqwest::Method::POST,
                url: "{base_url}/vulns/export",
                body: Some(r#"{"num_assets": {chunk_size}}"#),
                cacheable: false,
            },
            Endpoint::VulnExportStatus => EndpointSpec {
                cacheable: false,
                ..get("{base_url}/vulns/export/{export_id}/status")
            },
            Endpoint::VulnExportChunk => {
                get("{base_url}/vulns/export/{export_id}/chunks/{chunk_id}")
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Named parameters for template substitution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Ordered rewrite rules, most specific first.
///
/// Several URLs are prefixes of others (`/scans/1` vs `/scans/1?history_id=2`),
/// so the anchored patterns and this order both matter.
const RULES: &[(&str, &str)] = &[
    (
        r"/scans/(\d+)/hosts/(\d+)\?history_id=(\d+)$",
        "scan/$1/$3/host/$2/host.json",
    ),
    (r"/scans/(\d+)\?history_id=(\d+)$", "scan/$1/$2/history.json"),
    (r"/scans/(\d+)$", "scan/$1/scan.json"),
    (r"/scans$", "scans/scans.json"),
    (r"/plugins/plugin/(\d+)$", "plugin/$1/plugin.json"),
    (
        r"/workbenches/assets/([0-9A-Za-z-]+)/info$",
        "asset/$1/asset.json",
    ),
    (r"/assets$", "assets/assets.json"),
    (
        r"/vulns/export/([0-9A-Za-z-]+)/chunks/(\d+)$",
        "export/vulns/$1/chunk/$2.json",
    ),
];

fn compiled_rules() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(pattern, template)| match Regex::new(pattern) {
                Ok(re) => Some((re, *template)),
                Err(e) => {
                    log::error!("Invalid cache rule {}: {}", pattern, e);
                    None
                }
            })
            .collect()
    })
}

fn group_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(\d+)").expect("static regex"))
}

/// Maps (endpoint, params) to request URLs and cache paths.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    base_url: String,
    /// Secret used to hash captured groups (crypto mode)
    hash_key: Option<String>,
}

impl KeyResolver {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            hash_key: None,
        }
    }

    /// Enable privacy-preserving filenames.
    pub fn with_hash_key(mut self, key: impl Into<String>) -> Self {
        self.hash_key = Some(key.into());
        self
    }

    /// Render the endpoint's URL template.
    pub fn to_url(&self, endpoint: Endpoint, params: &Params) -> Result<String> {
        let params = params.clone().with("base_url", &self.base_url);
        render(endpoint, endpoint.spec().url, &params)
    }

    /// Render the endpoint's request body, if it has one.
    pub fn to_body(&self, endpoint: Endpoint, params: &Params) -> Result<Option<String>> {
        endpoint
            .spec()
            .body
            .map(|template| render(endpoint, template, params))
            .transpose()
    }

    /// Map a canonical URL to a relative cache path.
    pub fn to_cache_key(&self, url: &str) -> Result<PathBuf> {
        for (re, template) in compiled_rules() {
            if let Some(caps) = re.captures(url) {
                let path = group_ref_regex().replace_all(template, |refs: &Captures| {
                    let value = refs[1]
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| caps.get(i))
                        .map(|m| m.as_str())
                        .unwrap_or_default();
                    self.obscure(value)
                });
                return Ok(PathBuf::from(path.into_owned()));
            }
        }
        Err(CacheError::NoMatchingRule(url.to_string()))
    }

    fn obscure(&self, value: &str) -> String {
        match &self.hash_key {
            Some(key) => short_digest(key, value),
            None => value.to_string(),
        }
    }
}

/// First four bytes of SHA-256(key + value), hex encoded.
pub fn short_digest(key: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(value.as_bytes());
    hasher.finalize()[..4]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// A value that cannot change the path or query it is rendered into.
fn is_plain_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '?', '#', '&', '%'])
}

/// Substitute `{name}` placeholders; `base_url` is the only value allowed to
/// carry path separators.
fn render(endpoint: Endpoint, template: &str, params: &Params) -> Result<String> {
    let template_error = |reason: String| CacheError::Template {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| template_error(format!("unclosed placeholder in {:?}", template)))?;
        let name = &after[..end];

        // JSON bodies contain literal braces; only identifiers are placeholders
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            out.push('{');
            rest = after;
            continue;
        }

        let value = params
            .get(name)
            .ok_or_else(|| template_error(format!("missing parameter '{}'", name)))?;
        if name != "base_url" && !is_plain_segment(value) {
            return Err(template_error(format!(
                "parameter '{}' is not a plain path segment: {:?}",
                name, value
            )));
        }
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cloud.example.com";

    fn resolver() -> KeyResolver {
        KeyResolver::new(BASE)
    }

    #[test]
    fn test_to_url_renders_params() {
        let url = resolver()
            .to_url(
                Endpoint::HostDetail,
                &Params::new()
                    .with("scan_id", 12)
                    .with("host_id", 3)
                    .with("history_id", 456),
            )
            .unwrap();
        assert_eq!(url, format!("{}/scans/12/hosts/3?history_id=456", BASE));
    }

    #[test]
    fn test_to_url_trims_trailing_slash() {
        let url = KeyResolver::new("http://127.0.0.1:8383/")
            .to_url(Endpoint::ScanList, &Params::new())
            .unwrap();
        assert_eq!(url, "http://127.0.0.1:8383/scans");
    }

    #[test]
    fn test_to_url_missing_param() {
        let err = resolver()
            .to_url(Endpoint::ScanDetail, &Params::new())
            .unwrap_err();
        match err {
            CacheError::Template { endpoint, reason } => {
                assert_eq!(endpoint, "ScanDetail");
                assert!(reason.contains("scan_id"));
            }
            other => panic!("Expected template error, got {:?}", other),
        }
    }

    #[test]
    fn test_to_url_rejects_path_traversal() {
        for bad in ["../../users", "..", "1/hosts", "1?x=2", "1#frag", "a%2Fb", "a&b=1", ""] {
            let err = resolver()
                .to_url(
                    Endpoint::VulnExportStatus,
                    &Params::new().with("export_id", bad),
                )
                .unwrap_err();
            assert!(
                matches!(err, CacheError::Template { .. }),
                "accepted {:?}",
                bad
            );
        }

        let url = resolver()
            .to_url(
                Endpoint::VulnExportStatus,
                &Params::new().with("export_id", "ab-12-cd"),
            )
            .unwrap();
        assert_eq!(url, format!("{}/vulns/export/ab-12-cd/status", BASE));
    }

    #[test]
    fn test_render_malformed_template() {
        let err = render(Endpoint::ScanList, "{base_url/scans", &Params::new()).unwrap_err();
        assert!(matches!(err, CacheError::Template { .. }));
    }

    #[test]
    fn test_to_body_keeps_json_braces() {
        let body = resolver()
            .to_body(
                Endpoint::VulnExportRequest,
                &Params::new().with("chunk_size", 500),
            )
            .unwrap();
        assert_eq!(body.as_deref(), Some(r#"{"num_assets": 500}"#));

        let none = resolver()
            .to_body(Endpoint::ScanList, &Params::new())
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_cache_key_most_specific_rule_wins() {
        let r = resolver();
        let cases = [
            ("/scans/12/hosts/3?history_id=456", "scan/12/456/host/3/host.json"),
            ("/scans/12?history_id=456", "scan/12/456/history.json"),
            ("/scans/12", "scan/12/scan.json"),
            ("/scans", "scans/scans.json"),
            ("/plugins/plugin/19506", "plugin/19506/plugin.json"),
            (
                "/workbenches/assets/0a1b-22/info",
                "asset/0a1b-22/asset.json",
            ),
            ("/assets", "assets/assets.json"),
            (
                "/vulns/export/ab-cd/chunks/7",
                "export/vulns/ab-cd/chunk/7.json",
            ),
        ];
        for (suffix, expected) in cases {
            let key = r.to_cache_key(&format!("{}{}", BASE, suffix)).unwrap();
            assert_eq!(key, PathBuf::from(expected), "url suffix {}", suffix);
        }
    }

    #[test]
    fn test_cache_key_deterministic() {
        let r = resolver();
        let params = Params::new().with("scan_id", 9).with("history_id", 1);
        let url = r.to_url(Endpoint::ScanHistory, &params).unwrap();

        let key1 = r.to_cache_key(&url).unwrap();
        let _ = r.to_cache_key(&format!("{}/scans", BASE)).unwrap();
        let key2 = r.to_cache_key(&url).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_every_cacheable_endpoint_has_rule() {
        let r = resolver();
        let params = Params::new()
            .with("scan_id", 1)
            .with("history_id", 2)
            .with("host_id", 3)
            .with("plugin_id", 4)
            .with("asset_id", "a-5")
            .with("export_id", "e-6")
            .with("chunk_id", 7);
        for endpoint in Endpoint::ALL {
            if !endpoint.spec().cacheable {
                continue;
            }
            let url = r.to_url(endpoint, &params).unwrap();
            assert!(
                r.to_cache_key(&url).is_ok(),
                "no cache rule for {}",
                endpoint
            );
        }
    }

    #[test]
    fn test_cache_key_no_rule() {
        let err = resolver()
            .to_cache_key(&format!("{}/vulns/export/abc/status", BASE))
            .unwrap_err();
        assert!(matches!(err, CacheError::NoMatchingRule(_)));
    }

    #[test]
    fn test_cache_key_crypto_hashes_groups() {
        let plain = resolver();
        let hashed = resolver().with_hash_key("s3cret");
        let url = format!("{}/scans/12/hosts/3?history_id=456", BASE);

        let key = hashed.to_cache_key(&url).unwrap();
        let expected = format!(
            "scan/{}/{}/host/{}/host.json",
            short_digest("s3cret", "12"),
            short_digest("s3cret", "456"),
            short_digest("s3cret", "3")
        );
        assert_eq!(key, PathBuf::from(expected));
        assert_ne!(key, plain.to_cache_key(&url).unwrap());
        assert!(!key.to_string_lossy().contains("456"));
    }

    #[test]
    fn test_short_digest_shape() {
        let d = short_digest("k", "v");
        assert_eq!(d.len(), 8);
        assert_eq!(d, short_digest("k", "v"));
        assert_ne!(d, short_digest("other", "v"));
    }
}
