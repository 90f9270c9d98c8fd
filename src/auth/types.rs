use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OAuth client id registered for the app on Mealie's identity provider
pub const DEFAULT_CLIENT_ID: &str = "mealient-mobile";

/// Redirect URI the provider sends the browser back to
pub const DEFAULT_REDIRECT_URI: &str = "mealient://oauth/callback";

/// How the current bearer token was obtained, and so how it can be refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthMethod {
    Password,
    Oidc,
    #[default]
    None,
}

impl AuthMethod {
    /// Marker string persisted next to the bearer token
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Password => "PASSWORD",
            AuthMethod::Oidc => "OIDC",
            AuthMethod::None => "NONE",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASSWORD" => Ok(AuthMethod::Password),
            "OIDC" => Ok(AuthMethod::Oidc),
            "NONE" | "" => Ok(AuthMethod::None),
            other => Err(format!("Unknown auth method: {}", other)),
        }
    }
}

/// The persisted credential set. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCredentials {
    pub bearer_token: Option<String>,
    pub oidc_refresh_token: Option<String>,
    pub oidc_id_token: Option<String>,
    pub auth_method: AuthMethod,
}

impl StoredCredentials {
    /// Effective method: without a bearer token nothing can be refreshed.
    pub fn effective_method(&self) -> AuthMethod {
        if self.bearer_token.is_some() {
            self.auth_method
        } else {
            AuthMethod::None
        }
    }
}

/// Provider endpoints discovered from `.well-known/openid-configuration`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcConfig {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub end_session_endpoint: Option<String>,
    pub issuer: String,
    pub client_id: String,
}

/// Discovery and flow status. One instance per [`super::OidcAuthRepo`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OidcAuthState {
    #[default]
    NotConfigured,
    Pending,
    Configured(OidcConfig),
    Failed(String),
    /// Only SSO through the server's own login page is available
    WebBased(String),
}

impl OidcAuthState {
    pub fn config(&self) -> Option<&OidcConfig> {
        match self {
            OidcAuthState::Configured(config) => Some(config),
            _ => None,
        }
    }
}

/// An authorization request ready to be opened in a browser
#[derive(Debug, Clone)]
pub struct OidcAuthorizationRequest {
    pub authorization_url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Tokens returned by the provider's token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OidcTokens {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_in: Option<i64>,
    ) -> Self {
        let expires_at = expires_in.map(|secs| Utc::now() + Duration::seconds(secs));
        Self {
            access_token,
            refresh_token,
            id_token,
            expires_in,
            expires_at,
        }
    }
}
