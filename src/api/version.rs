//! Server version info and compatibility parsing

use serde::{Deserialize, Serialize};
use std::fmt;

/// Response from `GET /api/app/about`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: String,
    #[serde(default)]
    pub production: Option<bool>,
    #[serde(default)]
    pub demo_status: Option<bool>,
    #[serde(default)]
    pub allow_signup: Option<bool>,
    #[serde(default)]
    pub allow_password_login: Option<bool>,
    #[serde(default)]
    pub enable_oidc: Option<bool>,
    #[serde(default)]
    pub oidc_redirect: Option<bool>,
    #[serde(default)]
    pub oidc_provider_name: Option<String>,
}

impl VersionResponse {
    /// Server only offers SSO by redirecting its own web login page
    pub fn uses_web_based_oidc(&self) -> bool {
        self.enable_oidc.unwrap_or(false) && self.oidc_redirect.unwrap_or(false)
    }
}

/// API version of the Mealie server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V2 { major: u32, minor: u32, patch: u32 },
    Unknown,
}

impl ApiVersion {
    /// Parse `v2.0.0` or `2.1.3`. Anything that is not three numeric segments
    /// with major >= 2 is `Unknown`.
    pub fn parse(version: &str) -> Self {
        let clean = version.strip_prefix('v').unwrap_or(version).trim();

        let parts: Vec<&str> = clean.split('.').collect();
        if parts.len() != 3 {
            return ApiVersion::Unknown;
        }

        let (Ok(major), Ok(minor), Ok(patch)) = (
            parts[0].parse::<u32>(),
            parts[1].parse::<u32>(),
            parts[2].parse::<u32>(),
        ) else {
            return ApiVersion::Unknown;
        };

        if major < 2 {
            return ApiVersion::Unknown;
        }

        ApiVersion::V2 {
            major,
            minor,
            patch,
        }
    }

    pub fn is_v2_or_later(version: &str) -> bool {
        matches!(Self::parse(version), ApiVersion::V2 { .. })
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::V2 {
                major,
                minor,
                patch,
            } => write!(f, "v{}.{}.{}", major, minor, patch),
            ApiVersion::Unknown => f.write_str("Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2(major: u32, minor: u32, patch: u32) -> ApiVersion {
        ApiVersion::V2 {
            major,
            minor,
            patch,
        }
    }

    #[test]
    fn test_parse_accepted_versions() {
        assert_eq!(ApiVersion::parse("v2.0.0"), v2(2, 0, 0));
        assert_eq!(ApiVersion::parse("2.3.1"), v2(2, 3, 1));
        assert_eq!(ApiVersion::parse("v3.10.2"), v2(3, 10, 2));
    }

    #[test]
    fn test_parse_rejected_versions() {
        assert_eq!(ApiVersion::parse("v1.9.9"), ApiVersion::Unknown);
        assert_eq!(ApiVersion::parse("garbage"), ApiVersion::Unknown);
        assert_eq!(ApiVersion::parse("v2.0"), ApiVersion::Unknown);
        assert_eq!(ApiVersion::parse("v2.0.0.1"), ApiVersion::Unknown);
        assert_eq!(ApiVersion::parse("v2.x.0"), ApiVersion::Unknown);
        assert_eq!(ApiVersion::parse(""), ApiVersion::Unknown);
    }

    #[test]
    fn test_is_v2_or_later() {
        assert!(ApiVersion::is_v2_or_later("v2.8.0"));
        assert!(!ApiVersion::is_v2_or_later("v1.0.0beta-5"));
    }

    #[test]
    fn test_display() {
        assert_eq!(v2(2, 1, 0).to_string(), "v2.1.0");
        assert_eq!(ApiVersion::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_version_response_web_based_oidc() {
        let json = r#"{"version":"v3.0.0","enableOidc":true,"oidcRedirect":true,"oidcProviderName":"Authelia"}"#;
        let info: VersionResponse = serde_json::from_str(json).unwrap();
        assert!(info.uses_web_based_oidc());
        assert_eq!(info.oidc_provider_name.as_deref(), Some("Authelia"));

        let info: VersionResponse =
            serde_json::from_str(r#"{"version":"v3.0.0","enableOidc":true}"#).unwrap();
        assert!(!info.uses_web_based_oidc());
    }
}
