use super::exchange::TokenExchange;
use super::oidc::OidcAuthRepo;
use super::store::CredentialStore;
use super::types::{AuthMethod, OidcTokens};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// Refreshes the OIDC access token with the stored refresh token.
///
/// Refreshes are serialized: a caller that waited behind another refresh
/// reuses its result instead of spending the refresh token a second time.
pub struct OidcTokenRefresh {
    store: Arc<CredentialStore>,
    repo: Arc<OidcAuthRepo>,
    exchange: TokenExchange,
    in_flight: Mutex<()>,
}

impl OidcTokenRefresh {
    pub fn new(store: Arc<CredentialStore>, repo: Arc<OidcAuthRepo>, exchange: TokenExchange) -> Self {
        Self {
            store,
            repo,
            exchange,
            in_flight: Mutex::new(()),
        }
    }

    /// Returns the new tokens, already persisted, or `None` when there is no
    /// refresh token, no discovered configuration, or the provider refused.
    ///
    /// `failed_token` is the access token a request was rejected with. If the
    /// stored OIDC token already differs from it, that token is returned
    /// without contacting the provider. `None` always refreshes.
    pub async fn refresh_if_needed(&self, failed_token: Option<&str>) -> Option<OidcTokens> {
        let _in_flight = self.in_flight.lock().await;

        let current = match self.store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "failed to read credentials");
                return None;
            }
        };

        let Some(access_token) = current.bearer_token.clone() else {
            warn!("no access token stored, nothing to refresh");
            return None;
        };
        if current.effective_method() == AuthMethod::Oidc
            && failed_token.is_some_and(|failed| failed != access_token)
        {
            debug!("access token already replaced, skipping refresh");
            return Some(OidcTokens::new(
                access_token,
                current.oidc_refresh_token,
                current.oidc_id_token,
                None,
            ));
        }

        let Some(refresh_token) = current.oidc_refresh_token else {
            warn!("no refresh token available");
            return None;
        };

        let Some(config) = self.repo.config() else {
            warn!("OIDC not configured, cannot refresh");
            return None;
        };

        let tokens = match self.exchange.refresh_access_token(&config, &refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!(error = %e, "token refresh failed");
                return None;
            }
        };

        // Backend I/O stays off the async workers
        let store = self.store.clone();
        let next = tokens.clone();
        let persisted = tokio::task::spawn_blocking(move || {
            store.replace_oidc_tokens(&access_token, next.access_token, next.refresh_token, next.id_token)
        })
        .await;

        match persisted {
            Ok(Ok(true)) => {
                debug!("token refresh successful");
                Some(tokens)
            }
            Ok(Ok(false)) => {
                warn!("session changed during refresh, discarding refreshed tokens");
                None
            }
            Ok(Err(e)) => {
                error!(error = %e, "failed to persist refreshed tokens");
                None
            }
            Err(e) => {
                error!(error = %e, "token persistence task failed");
                None
            }
        }
    }
}
