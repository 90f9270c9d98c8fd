//! Unauthenticated calls to the Mealie server plus the API token exchange

use super::version::VersionResponse;
use crate::auth::AuthError;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const VERSION_PATH: &str = "/api/app/about";
const TOKEN_PATH: &str = "/api/auth/token";
const API_TOKENS_PATH: &str = "/api/users/api-tokens";

/// Response from `POST /api/auth/token`
#[derive(Debug, Deserialize)]
struct GetTokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CreateApiTokenRequest<'a> {
    name: &'a str,
}

/// Response from `POST /api/users/api-tokens`
#[derive(Debug, Deserialize)]
struct CreateApiTokenResponse {
    token: String,
}

/// Strip trailing slashes so paths can be appended
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Client for the server endpoints used during login
#[derive(Clone)]
pub struct ServerApi {
    client: Client,
}

impl ServerApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Fetch version and feature flags
    pub async fn request_version(&self, base_url: &str) -> Result<VersionResponse, AuthError> {
        let url = format!("{}{}", normalize_base_url(base_url), VERSION_PATH);
        debug!(%url, "requesting server version");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Version request failed: {}", e)))?;

        let response = check_status(response, "Version request").await?;
        response
            .json()
            .await
            .map_err(|e| AuthError::Parse(format!("Failed to parse version response: {}", e)))
    }

    /// Password grant. A 401 is reported as [`AuthError::Unauthorized`].
    pub async fn get_token(
        &self,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        let url = format!("{}{}", normalize_base_url(base_url), TOKEN_PATH);
        debug!(%url, "requesting login token");

        let response = self
            .client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Login request failed: {}", e)))?;

        let response = check_status(response, "Login").await?;
        let body: GetTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Parse(format!("Failed to parse token response: {}", e)))?;
        Ok(body.access_token)
    }

    /// Create a named long-lived API token using a short-lived login token
    pub async fn create_api_token(
        &self,
        base_url: &str,
        bearer_token: &str,
        name: &str,
    ) -> Result<String, AuthError> {
        let url = format!("{}{}", normalize_base_url(base_url), API_TOKENS_PATH);
        debug!(%url, name, "creating API token");

        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer_token)
            .json(&CreateApiTokenRequest { name })
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("API token request failed: {}", e)))?;

        let response = check_status(response, "API token creation").await?;
        let body: CreateApiTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Parse(format!("Failed to parse API token response: {}", e)))?;
        Ok(body.token)
    }
}

/// Map 401 to `Unauthorized` and any other failure status to `Network`
pub(crate) async fn check_status(response: Response, what: &str) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        warn!(what, "request rejected as unauthorized");
        return Err(AuthError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AuthError::Network(format!(
        "{} failed with status {}: {}",
        what, status, body
    )))
}
