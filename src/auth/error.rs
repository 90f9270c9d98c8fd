use thiserror::Error;

/// Failures surfaced by the authentication core.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials were rejected, or a refreshed session was still rejected.
    #[error("Credentials incorrect")]
    Unauthorized,
    #[error("This app requires Mealie v2.0 or later. Server version: {version}")]
    UnsupportedServerVersion { version: String },
    #[error("OIDC not enabled on this server")]
    OidcNotEnabled,
    /// The server only offers browser-based SSO through its own login page.
    #[error("Server uses web-based OIDC at {base_url}")]
    WebBasedOidc { base_url: String },
    #[error("OIDC discovery failed: {0}")]
    DiscoveryFailed(String),
    #[error("OIDC not configured")]
    OidcNotConfigured,
    #[error("Invalid state parameter")]
    InvalidState,
    #[error("Missing {0} in authorization response")]
    MissingCallbackParameter(&'static str),
    #[error("Authorization denied: {error}{}", description.as_deref().map(|d| format!(" - {d}")).unwrap_or_default())]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("No token available")]
    NoToken,
    #[error("No server configured, run `mealient server <url>` first")]
    NoServer,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Parse(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::Parse(format!("Invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        assert_eq!(AuthError::Unauthorized.to_string(), "Credentials incorrect");
        assert_eq!(
            AuthError::UnsupportedServerVersion {
                version: "v1.9.9".to_string()
            }
            .to_string(),
            "This app requires Mealie v2.0 or later. Server version: v1.9.9"
        );
        assert_eq!(AuthError::InvalidState.to_string(), "Invalid state parameter");
        assert_eq!(
            AuthError::MissingCallbackParameter("code").to_string(),
            "Missing code in authorization response"
        );
    }

    #[test]
    fn test_authorization_denied_display() {
        let err = AuthError::AuthorizationDenied {
            error: "access_denied".to_string(),
            description: Some("user cancelled".to_string()),
        };
        assert_eq!(err.to_string(), "Authorization denied: access_denied - user cancelled");

        let err = AuthError::AuthorizationDenied {
            error: "access_denied".to_string(),
            description: None,
        };
        assert_eq!(err.to_string(), "Authorization denied: access_denied");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AuthError = json_err.into();
        assert!(matches!(err, AuthError::Parse(_)));
    }
}
