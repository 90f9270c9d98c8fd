//! Fetching `.well-known/openid-configuration` from a Mealie server

use super::types::OidcConfig;
use super::AuthError;
use crate::api::client::{check_status, normalize_base_url};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// OpenID Connect Discovery 1.0 metadata, only the fields the client uses
#[derive(Debug, Clone, Deserialize)]
pub struct OidcDiscoveryResponse {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
}

impl OidcDiscoveryResponse {
    pub fn into_config(self, client_id: &str) -> OidcConfig {
        OidcConfig {
            authorization_endpoint: self.authorization_endpoint,
            token_endpoint: self.token_endpoint,
            end_session_endpoint: self.end_session_endpoint,
            issuer: self.issuer,
            client_id: client_id.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct OidcDiscovery {
    client: Client,
}

impl OidcDiscovery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn discovery_url(base_url: &str) -> String {
        format!("{}{}", normalize_base_url(base_url), DISCOVERY_PATH)
    }

    /// Whether the discovery document answers at all
    pub async fn check_oidc_enabled(&self, base_url: &str) -> bool {
        match self.client.get(Self::discovery_url(base_url)).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!(base_url, status = %response.status(), "checked OIDC discovery endpoint");
                ok
            }
            Err(e) => {
                debug!(base_url, error = %e, "OIDC discovery endpoint unreachable");
                false
            }
        }
    }

    pub async fn discover_configuration(
        &self,
        base_url: &str,
    ) -> Result<OidcDiscoveryResponse, AuthError> {
        let response = self
            .client
            .get(Self::discovery_url(base_url))
            .send()
            .await
            .map_err(|e| AuthError::DiscoveryFailed(format!("Discovery request failed: {}", e)))?;

        let response = check_status(response, "OIDC discovery")
            .await
            .map_err(|e| AuthError::DiscoveryFailed(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| AuthError::DiscoveryFailed(format!("Invalid discovery document: {}", e)))
    }
}
