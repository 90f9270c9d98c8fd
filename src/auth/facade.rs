//! Entry point used by hosts and by the HTTP layer

use super::callback::CallbackResult;
use super::discovery::OidcDiscovery;
use super::exchange::TokenExchange;
use super::oidc::OidcAuthRepo;
use super::refresh::OidcTokenRefresh;
use super::store::CredentialStore;
use super::types::{AuthMethod, OidcAuthState, OidcAuthorizationRequest, OidcConfig};
use super::web_login::WebLoginRequest;
use super::AuthError;
use crate::api::{normalize_base_url, ServerApi};
use crate::config::Settings;
use crate::http::AuthenticationProvider;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct Authenticator {
    base_url: Option<String>,
    api_token_name: String,
    server_api: ServerApi,
    store: Arc<CredentialStore>,
    oidc: Arc<OidcAuthRepo>,
    exchange: TokenExchange,
    refresh: OidcTokenRefresh,
}

impl Authenticator {
    pub fn new(http_client: Client, store: Arc<CredentialStore>, settings: &Settings) -> Self {
        let server_api = ServerApi::new(http_client.clone());
        let oidc = Arc::new(OidcAuthRepo::new(
            OidcDiscovery::new(http_client.clone()),
            server_api.clone(),
            settings.client_id.clone(),
            settings.redirect_uri.clone(),
        ));
        let exchange = TokenExchange::new(http_client, settings.redirect_uri.clone());
        let refresh = OidcTokenRefresh::new(store.clone(), oidc.clone(), exchange.clone());

        Self {
            base_url: settings.base_url.as_deref().map(normalize_base_url),
            api_token_name: settings.api_token_name.clone(),
            server_api,
            store,
            oidc,
            exchange,
            refresh,
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn require_base_url(&self) -> Result<&str, AuthError> {
        self.base_url.as_deref().ok_or(AuthError::NoServer)
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn oidc(&self) -> &OidcAuthRepo {
        &self.oidc
    }

    /// Password login. The short-lived login token is swapped for a named API
    /// token before returning and is never written to the store, so a failed
    /// swap leaves the previous session untouched.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let base_url = self.require_base_url()?;
        info!(base_url, "authenticating with password");

        let login_token = self.server_api.get_token(base_url, email, password).await?;
        let api_token = self
            .server_api
            .create_api_token(base_url, &login_token, &self.api_token_name)
            .await?;
        self.store.set_password_token(api_token)?;

        info!("password authentication complete");
        Ok(())
    }

    pub fn get_auth_token(&self) -> Result<Option<String>, AuthError> {
        self.store.token()
    }

    pub fn get_auth_method(&self) -> Result<AuthMethod, AuthError> {
        self.store.auth_method()
    }

    /// New access token, or `None` if the refresh could not be performed.
    /// Pass the rejected token as `failed_token` so concurrent callers share
    /// one refresh; `None` forces a refresh.
    pub async fn refresh_oidc_token(&self, failed_token: Option<&str>) -> Option<String> {
        debug!("refreshing OIDC token");
        self.refresh
            .refresh_if_needed(failed_token)
            .await
            .map(|tokens| tokens.access_token)
    }

    /// Clear all credentials. Safe to call when already logged out.
    pub fn logout(&self) -> Result<(), AuthError> {
        info!("logging out");
        self.store.clear()
    }

    pub fn is_authorized(&self) -> watch::Receiver<bool> {
        self.store.subscribe_authorized()
    }

    /// Probe the configured server for OIDC support
    pub async fn discover_oidc(&self) -> Result<OidcConfig, AuthError> {
        let base_url = self.require_base_url()?;
        self.oidc.discover_oidc_config(base_url).await
    }

    pub fn oidc_state(&self) -> OidcAuthState {
        self.oidc.state()
    }

    pub fn start_oidc_flow(&self) -> Result<OidcAuthorizationRequest, AuthError> {
        self.oidc.start_oidc_flow()
    }

    /// Validate the callback against `request`, exchange the code and store
    /// the resulting tokens.
    pub async fn complete_oidc_login(
        &self,
        callback: &CallbackResult,
        request: &OidcAuthorizationRequest,
    ) -> Result<(), AuthError> {
        self.oidc.handle_authorization_response(
            &callback.code,
            &callback.state,
            &request.code_verifier,
        )?;

        let config = self.oidc.config().ok_or(AuthError::OidcNotConfigured)?;
        let tokens = self
            .exchange
            .exchange_code_for_tokens(&config, &callback.code, &request.code_verifier)
            .await?;

        if tokens.refresh_token.is_none() {
            warn!("provider returned no refresh token, session cannot be refreshed");
        }
        self.store
            .set_oidc_tokens(tokens.access_token, tokens.refresh_token, tokens.id_token)?;

        info!("OIDC login complete");
        Ok(())
    }

    pub fn web_login_request(&self) -> Result<WebLoginRequest, AuthError> {
        Ok(WebLoginRequest::new(self.require_base_url()?))
    }

    /// Store a token scraped from the server's web session. It carries no
    /// refresh token, so expiry means logging in again.
    pub fn complete_web_login(&self, token: &str) -> Result<(), AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::NoToken);
        }
        self.store.set_oidc_tokens(token.to_string(), None, None)?;
        info!("web login complete");
        Ok(())
    }
}

#[async_trait]
impl AuthenticationProvider for Authenticator {
    async fn get_auth_token(&self) -> Result<Option<String>, AuthError> {
        Authenticator::get_auth_token(self)
    }

    async fn get_auth_method(&self) -> Result<AuthMethod, AuthError> {
        Authenticator::get_auth_method(self)
    }

    async fn refresh_oidc_token(&self, failed_token: Option<&str>) -> Option<String> {
        Authenticator::refresh_oidc_token(self, failed_token).await
    }

    async fn logout(&self) -> Result<(), AuthError> {
        info!("logging out");
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.clear())
            .await
            .map_err(|e| AuthError::Storage(format!("Logout task failed: {}", e)))?
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
