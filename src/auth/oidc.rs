//! OIDC discovery state machine and the single outstanding authorization request.
//!
//! `OidcAuthRepo` is the only writer of [`OidcAuthState`]. Observers get a
//! `watch::Receiver`; transitions are last-write-wins across concurrent
//! discovery calls.

use super::discovery::OidcDiscovery;
use super::pkce::{build_authorization_url, generate_state, PkceParams};
use super::types::{OidcAuthState, OidcAuthorizationRequest, OidcConfig};
use super::AuthError;
use crate::api::{normalize_base_url, ServerApi};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What a callback must match to be accepted
struct PendingAuthorization {
    state: String,
}

pub struct OidcAuthRepo {
    discovery: OidcDiscovery,
    server_api: ServerApi,
    client_id: String,
    redirect_uri: String,
    state_tx: watch::Sender<OidcAuthState>,
    current_request: Mutex<Option<PendingAuthorization>>,
}

impl OidcAuthRepo {
    pub fn new(
        discovery: OidcDiscovery,
        server_api: ServerApi,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let (state_tx, _) = watch::channel(OidcAuthState::NotConfigured);
        Self {
            discovery,
            server_api,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            state_tx,
            current_request: Mutex::new(None),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn state(&self) -> OidcAuthState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OidcAuthState> {
        self.state_tx.subscribe()
    }

    /// Last discovered configuration, if discovery succeeded
    pub fn config(&self) -> Option<OidcConfig> {
        self.state_tx.borrow().config().cloned()
    }

    /// Discover whether `base_url` offers standard OIDC, web-based SSO, or neither.
    ///
    /// Web-based SSO is reported as `Err(WebBasedOidc)` with the state set to
    /// `WebBased`; it wins over any discovery error.
    pub async fn discover_oidc_config(&self, base_url: &str) -> Result<OidcConfig, AuthError> {
        let base_url = normalize_base_url(base_url);
        debug!(%base_url, "discovering OIDC configuration");

        let transition = PendingTransition::begin(&self.state_tx);
        let (next_state, result) = self.run_discovery(&base_url).await;
        transition.finish(next_state);
        result
    }

    async fn run_discovery(
        &self,
        base_url: &str,
    ) -> (OidcAuthState, Result<OidcConfig, AuthError>) {
        if !self.discovery.check_oidc_enabled(base_url).await {
            debug!("standard OIDC discovery not available, checking server info");
            if self.check_web_based_oidc(base_url).await {
                info!(base_url, "server uses web-based OIDC");
                return self.web_based(base_url);
            }
            info!(base_url, "OIDC not enabled on server");
            return (OidcAuthState::NotConfigured, Err(AuthError::OidcNotEnabled));
        }

        match self.discovery.discover_configuration(base_url).await {
            Ok(document) => {
                let config = document.into_config(&self.client_id);
                info!(issuer = %config.issuer, "OIDC configuration discovered");
                (OidcAuthState::Configured(config.clone()), Ok(config))
            }
            Err(e) => {
                error!(error = %e, "failed to discover OIDC configuration");
                if self.check_web_based_oidc(base_url).await {
                    info!(base_url, "server uses web-based OIDC (detected after failure)");
                    return self.web_based(base_url);
                }
                (OidcAuthState::Failed(e.to_string()), Err(e))
            }
        }
    }

    fn web_based(&self, base_url: &str) -> (OidcAuthState, Result<OidcConfig, AuthError>) {
        (
            OidcAuthState::WebBased(base_url.to_string()),
            Err(AuthError::WebBasedOidc {
                base_url: base_url.to_string(),
            }),
        )
    }

    /// `enableOidc && oidcRedirect` from the server info endpoint
    async fn check_web_based_oidc(&self, base_url: &str) -> bool {
        match self.server_api.request_version(base_url).await {
            Ok(info) => {
                debug!(
                    enable_oidc = ?info.enable_oidc,
                    oidc_redirect = ?info.oidc_redirect,
                    "server info"
                );
                info.uses_web_based_oidc()
            }
            Err(e) => {
                warn!(error = %e, "failed to check server info for web-based OIDC");
                false
            }
        }
    }

    /// Build a PKCE authorization request. Replaces any outstanding request.
    pub fn start_oidc_flow(&self) -> Result<OidcAuthorizationRequest, AuthError> {
        let Some(config) = self.config() else {
            warn!("cannot start OIDC flow: not configured");
            return Err(AuthError::OidcNotConfigured);
        };

        let pkce = PkceParams::generate();
        let state = generate_state();
        let authorization_url = build_authorization_url(
            &config.authorization_endpoint,
            &config.client_id,
            &self.redirect_uri,
            &state,
            &pkce.code_challenge,
        );

        let previous = self.current_request().replace(PendingAuthorization {
            state: state.clone(),
        });
        if previous.is_some() {
            debug!("superseding outstanding authorization request");
        }
        debug!("authorization URL generated");

        Ok(OidcAuthorizationRequest {
            authorization_url,
            state,
            code_verifier: pkce.code_verifier,
        })
    }

    /// Validate a callback against the outstanding request. Does not exchange
    /// the code. A validated request is consumed.
    pub fn handle_authorization_response(
        &self,
        code: &str,
        state: &str,
        code_verifier: &str,
    ) -> Result<(), AuthError> {
        if code.is_empty() {
            return Err(AuthError::MissingCallbackParameter("code"));
        }
        if state.is_empty() {
            return Err(AuthError::MissingCallbackParameter("state"));
        }
        if code_verifier.is_empty() {
            return Err(AuthError::MissingCallbackParameter("code_verifier"));
        }

        let mut current = self.current_request();
        let state_matches = current.as_ref().map(|pending| pending.state == state);
        match state_matches {
            Some(true) => {
                *current = None;
                debug!("authorization response validated");
                Ok(())
            }
            Some(false) => {
                error!("state mismatch in authorization response");
                Err(AuthError::InvalidState)
            }
            None => {
                error!("authorization response without an outstanding request");
                Err(AuthError::InvalidState)
            }
        }
    }

    fn current_request(&self) -> MutexGuard<'_, Option<PendingAuthorization>> {
        self.current_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sets `Pending` for the duration of one discovery call. If the call is
/// dropped before `finish`, the replaced state comes back unless another call
/// has moved the state on in the meantime.
struct PendingTransition<'a> {
    tx: &'a watch::Sender<OidcAuthState>,
    previous: Option<OidcAuthState>,
}

impl<'a> PendingTransition<'a> {
    fn begin(tx: &'a watch::Sender<OidcAuthState>) -> Self {
        let previous = tx.send_replace(OidcAuthState::Pending);
        Self {
            tx,
            previous: Some(previous),
        }
    }

    fn finish(mut self, next: OidcAuthState) {
        self.previous = None;
        self.tx.send_replace(next);
    }
}

impl Drop for PendingTransition<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.tx.send_if_modified(|current| {
                if *current == OidcAuthState::Pending {
                    debug!("discovery abandoned, restoring previous state");
                    *current = previous;
                    true
                } else {
                    false
                }
            });
        }
    }
}

#[cfg(test)]
#[path = "oidc_tests.rs"]
mod tests;
