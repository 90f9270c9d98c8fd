use super::types::{OidcConfig, OidcTokens};
use super::AuthError;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

/// OAuth token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// RFC 6749 error body
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Performs authorization-code and refresh-token grants against the provider.
///
/// Each call is a single request; dropping the future abandons it without
/// touching any stored state. No retries.
#[derive(Clone)]
pub struct TokenExchange {
    http_client: Client,
    redirect_uri: String,
}

impl TokenExchange {
    pub fn new(http_client: Client, redirect_uri: impl Into<String>) -> Self {
        Self {
            http_client,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code_for_tokens(
        &self,
        config: &OidcConfig,
        code: &str,
        code_verifier: &str,
    ) -> Result<OidcTokens, AuthError> {
        debug!(token_endpoint = %config.token_endpoint, "exchanging authorization code");
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
            ("client_id", config.client_id.as_str()),
        ];

        let resp = self.token_request(config, &params, "Token exchange").await?;
        Ok(OidcTokens::new(
            resp.access_token,
            resp.refresh_token,
            resp.id_token,
            resp.expires_in,
        ))
    }

    /// Refresh an access token. Providers that do not rotate refresh tokens
    /// omit it from the response; the old one stays valid and is returned.
    pub async fn refresh_access_token(
        &self,
        config: &OidcConfig,
        refresh_token: &str,
    ) -> Result<OidcTokens, AuthError> {
        debug!(token_endpoint = %config.token_endpoint, "refreshing access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
        ];

        let resp = self.token_request(config, &params, "Token refresh").await?;
        let rotated = resp
            .refresh_token
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(OidcTokens::new(
            resp.access_token,
            Some(rotated),
            resp.id_token,
            resp.expires_in,
        ))
    }

    async fn token_request(
        &self,
        config: &OidcConfig,
        params: &[(&str, &str)],
        what: &str,
    ) -> Result<TokenResponse, AuthError> {
        let resp = self
            .http_client
            .post(&config.token_endpoint)
            .form(params)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "{} request failed", what);
                AuthError::TokenExchange(format!("{} request failed: {}", what, e))
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{} ({})", err.error, description),
                    None => err.error,
                },
                Err(_) => body,
            };
            error!(%status, "{} rejected", what);
            return Err(AuthError::TokenExchange(format!(
                "{} failed with status {}: {}",
                what, status, detail
            )));
        }

        let token_resp: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AuthError::TokenExchange(format!("Failed to decode {} response: {}", what, e))
        })?;

        if token_resp.access_token.is_empty() {
            return Err(AuthError::TokenExchange(format!(
                "{} returned an empty access token",
                what
            )));
        }

        debug!("{} successful", what);
        Ok(token_resp)
    }
}
