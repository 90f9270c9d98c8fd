//! HTTP client utilities
//!
//! Builds the shared reqwest client and wraps authenticated requests:
//! [`ApiClient`] attaches the bearer token and, when the server answers 401,
//! runs [`refresh_bearer`] once before retrying once.

use crate::api::client::check_status;
use crate::api::user::{UserProfile, USER_SELF_PATH};
use crate::api::normalize_base_url;
use crate::auth::{AuthError, AuthMethod};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Build a reqwest Client with the given timeout.
///
/// Proxies from `HTTP_PROXY` / `HTTPS_PROXY` / `NO_PROXY` are honored by
/// reqwest itself.
pub fn client_with_timeout(timeout: Duration) -> Result<Client, AuthError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("mealient/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AuthError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Credentials source for outgoing requests
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    async fn get_auth_token(&self) -> Result<Option<String>, AuthError>;

    async fn get_auth_method(&self) -> Result<AuthMethod, AuthError>;

    /// New access token from the stored refresh token, if possible.
    /// `failed_token` is the token that was just rejected; a provider may
    /// return a newer stored token instead of refreshing again.
    async fn refresh_oidc_token(&self, failed_token: Option<&str>) -> Option<String>;

    async fn logout(&self) -> Result<(), AuthError>;
}

/// Obtain a token to retry with after `failed_token` was used.
///
/// OIDC sessions are refreshed; a failed refresh logs out unless the session
/// was replaced while the refresh ran. Password sessions
/// have nothing to refresh: if the cached token is the one that was just
/// rejected with 401 the session is dead and is logged out, otherwise the
/// cached token is returned. `None` means the user must sign in again.
pub async fn refresh_bearer<P>(
    provider: &P,
    failed_token: Option<&str>,
    status: Option<StatusCode>,
) -> Result<Option<String>, AuthError>
where
    P: AuthenticationProvider + ?Sized,
{
    let method = provider.get_auth_method().await?;
    debug!(%method, "refreshing bearer token");

    match method {
        AuthMethod::Oidc => match provider.refresh_oidc_token(failed_token).await {
            Some(token) => Ok(Some(token)),
            None => {
                let current = provider.get_auth_token().await?;
                if failed_token.is_some() && current.is_some() && current.as_deref() != failed_token {
                    debug!("session replaced during refresh, retrying with the current token");
                    return Ok(current);
                }
                warn!("OIDC refresh failed, logging out");
                provider.logout().await?;
                Ok(None)
            }
        },
        AuthMethod::Password => {
            let current = provider.get_auth_token().await?;
            let rejected = status == Some(StatusCode::UNAUTHORIZED);
            if rejected && current.as_deref() == failed_token {
                warn!("API token rejected, logging out");
                provider.logout().await?;
                return Ok(None);
            }
            Ok(current)
        }
        AuthMethod::None => Ok(None),
    }
}

/// Authenticated access to one Mealie server
pub struct ApiClient<P: ?Sized> {
    client: Client,
    base_url: String,
    provider: Arc<P>,
}

impl<P> ApiClient<P>
where
    P: AuthenticationProvider + ?Sized,
{
    pub fn new(client: Client, base_url: &str, provider: Arc<P>) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
            provider,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send the request produced by `build`, with one refresh-and-retry on 401.
    ///
    /// A request that is still rejected after the retry fails with
    /// [`AuthError::Unauthorized`]; when no token can be obtained at all it
    /// fails with [`AuthError::NoToken`].
    pub async fn send<F>(&self, build: F) -> Result<Response, AuthError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.provider.get_auth_token().await?;
        let response = self.execute(&build, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(url = %response.url(), "request unauthorized, refreshing credentials");
        let refreshed =
            refresh_bearer(self.provider.as_ref(), token.as_deref(), Some(response.status()))
                .await?;
        let Some(token) = refreshed else {
            return Err(AuthError::NoToken);
        };

        let response = self.execute(&build, Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "request still unauthorized after refresh");
            return Err(AuthError::Unauthorized);
        }
        Ok(response)
    }

    async fn execute<F>(&self, build: &F, token: Option<&str>) -> Result<Response, AuthError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut request = build(&self.client);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let url = self.url(path);
        let response = self.send(|client| client.get(&url)).await?;
        let response = check_status(response, path).await?;
        Ok(response.json().await?)
    }

    pub async fn get_user_self(&self) -> Result<UserProfile, AuthError> {
        self.get_json(USER_SELF_PATH).await
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
