//! Services and the response overrides attached to them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Result, StoreError};

pub const DEFAULT_OVERRIDE_STATUS: u16 = 404;
pub const DEFAULT_RESPONSE_STATUS: u16 = 200;

/// Stable service identifier; allocated from the snapshot counter, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub u64);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServiceId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(ServiceId)
            .map_err(|_| StoreError::validation(format!("bad service id '{s}'")))
    }
}

/// Absolute origin (scheme/host/path) a service stands for.
///
/// The normalized string form (`as_str`) is the key used to match profile
/// entries, so "http://a" and "http://a/" are the same service url.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceUrl(Url);

impl ServiceUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StoreError::validation("service url is empty"));
        }
        let url = Url::parse(raw)
            .map_err(|e| StoreError::validation(format!("malformed url '{raw}': {e}")))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(StoreError::validation(format!(
                "url '{raw}' must have a scheme and a host"
            )));
        }
        Ok(ServiceUrl(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized matching key for a raw url string.
pub fn url_key(raw: &str) -> Result<String> {
    ServiceUrl::parse(raw).map(|u| u.as_str().to_string())
}

/// Response substituted for a service's default behaviour.
///
/// With `hang` set the interception layer never answers; status/response are
/// still kept so the override can be re-enabled as it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Override {
    pub status: u16,
    pub response: Value,
    pub hang: bool,
}

impl Default for Override {
    fn default() -> Self {
        Self {
            status: DEFAULT_OVERRIDE_STATUS,
            response: Value::Object(Default::default()),
            hang: false,
        }
    }
}

/// Partially specified override; missing fields fall back to `Override::default()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverridePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hang: Option<bool>,
}

impl OverridePatch {
    pub fn status(code: u16) -> Self {
        Self {
            status: Some(code),
            ..Self::default()
        }
    }

    pub fn hang() -> Self {
        Self {
            hang: Some(true),
            ..Self::default()
        }
    }

    pub fn with_response(mut self, body: Value) -> Self {
        self.response = Some(body);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.response.is_none() && self.hang.is_none()
    }

    /// Merge over the defaults (not over a previous override).
    pub fn into_override(self) -> Override {
        let d = Override::default();
        Override {
            status: self.status.unwrap_or(d.status),
            response: self.response.unwrap_or(d.response),
            hang: self.hang.unwrap_or(d.hang),
        }
    }
}

impl From<OverridePatch> for Override {
    fn from(p: OverridePatch) -> Self {
        p.into_override()
    }
}

/// What a service answers absent any override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultResponse {
    pub status: u16,
    pub body: Value,
}

impl Default for DefaultResponse {
    fn default() -> Self {
        Self {
            status: DEFAULT_RESPONSE_STATUS,
            body: Value::Null,
        }
    }
}

/// Registration input. `override` is optional and merged over defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub url: String,
    #[serde(default)]
    pub default_response: DefaultResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#override: Option<OverridePatch>,
}

impl ServiceDescriptor {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            default_response: DefaultResponse::default(),
            r#override: None,
        }
    }

    pub fn with_default_response(mut self, status: u16, body: Value) -> Self {
        self.default_response = DefaultResponse { status, body };
        self
    }

    pub fn with_override(mut self, patch: OverridePatch) -> Self {
        self.r#override = Some(patch);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: ServiceId,
    pub url: ServiceUrl,
    pub default_response: DefaultResponse,
    pub r#override: Option<Override>,
}

impl Service {
    pub fn is_overridden(&self) -> bool {
        self.r#override.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_override_takes_defaults() {
        let o = OverridePatch::status(500).into_override();
        assert_eq!(o.status, 500);
        assert_eq!(o.response, json!({}));
        assert!(!o.hang);

        let o = OverridePatch::hang().into_override();
        assert_eq!(o.status, DEFAULT_OVERRIDE_STATUS);
        assert!(o.hang);
    }

    #[test]
    fn patch_from_json_body() {
        let p: OverridePatch = serde_json::from_value(json!({"status": 418})).unwrap();
        assert_eq!(p, OverridePatch::status(418));
        let empty: OverridePatch = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn url_key_is_normalized() {
        assert_eq!(url_key("http://a").unwrap(), "http://a/");
        assert_eq!(url_key("HTTP://A/x").unwrap(), "http://a/x");
        assert!(url_key("not a url").is_err());
        assert!(url_key("mailto:someone@example.com").is_err());
        assert!(url_key("").is_err());
    }

    #[test]
    fn descriptor_accepts_camel_case() {
        let d: ServiceDescriptor = serde_json::from_value(json!({
            "url": "http://x/api",
            "defaultResponse": {"status": 201, "body": {"ok": true}},
            "override": {"status": 503}
        }))
        .unwrap();
        assert_eq!(d.default_response.status, 201);
        assert_eq!(d.r#override, Some(OverridePatch::status(503)));
    }
}
