//! Process-wide credential store.
//!
//! Holds the bearer token, the method marker and the OIDC refresh/ID tokens.
//! Every write replaces the whole [`StoredCredentials`] set under one lock,
//! persists it, and only then publishes the new values to subscribers, so no
//! reader or observer sees a half-applied update.
//!
//! Writes block on backend I/O (keyring or file). Async request paths call
//! them through `tokio::task::spawn_blocking`.

use super::storage::{MemoryBackend, SecretStore, StorageBackend};
use super::types::{AuthMethod, StoredCredentials};
use super::AuthError;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

const TOKEN_KEY: &str = "auth_token";
const METHOD_KEY: &str = "auth_method";
const OIDC_REFRESH_TOKEN_KEY: &str = "oidc_refresh_token";
const OIDC_ID_TOKEN_KEY: &str = "oidc_id_token";

pub struct CredentialStore {
    backend: Box<dyn SecretStore>,
    state: RwLock<StoredCredentials>,
    token_tx: watch::Sender<Option<String>>,
    method_tx: watch::Sender<AuthMethod>,
    authorized_tx: watch::Sender<bool>,
}

impl CredentialStore {
    /// Load the persisted credential set from `backend`
    pub fn open(backend: Box<dyn SecretStore>) -> Result<Self, AuthError> {
        let auth_method = match backend.get(METHOD_KEY)? {
            Some(marker) => marker.parse().unwrap_or_else(|e| {
                warn!(error = %e, "ignoring unreadable auth method marker");
                AuthMethod::None
            }),
            None => AuthMethod::None,
        };

        let credentials = StoredCredentials {
            bearer_token: backend.get(TOKEN_KEY)?,
            oidc_refresh_token: backend.get(OIDC_REFRESH_TOKEN_KEY)?,
            oidc_id_token: backend.get(OIDC_ID_TOKEN_KEY)?,
            auth_method,
        };

        debug!(
            backend = backend.backend().describe(),
            method = %credentials.effective_method(),
            has_token = credentials.bearer_token.is_some(),
            "credential store opened"
        );

        let (token_tx, _) = watch::channel(credentials.bearer_token.clone());
        let (method_tx, _) = watch::channel(credentials.effective_method());
        let (authorized_tx, _) = watch::channel(credentials.bearer_token.is_some());

        Ok(Self {
            backend,
            state: RwLock::new(credentials),
            token_tx,
            method_tx,
            authorized_tx,
        })
    }

    /// A store that keeps everything in process memory
    pub fn in_memory() -> Self {
        let (token_tx, _) = watch::channel(None);
        let (method_tx, _) = watch::channel(AuthMethod::None);
        let (authorized_tx, _) = watch::channel(false);
        Self {
            backend: Box::new(MemoryBackend::new()),
            state: RwLock::new(StoredCredentials::default()),
            token_tx,
            method_tx,
            authorized_tx,
        }
    }

    pub fn backend(&self) -> StorageBackend {
        self.backend.backend()
    }

    /// Current bearer token
    pub fn token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.read()?.bearer_token.clone())
    }

    /// Current method; `None` whenever there is no bearer token
    pub fn auth_method(&self) -> Result<AuthMethod, AuthError> {
        Ok(self.read()?.effective_method())
    }

    pub fn oidc_refresh_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.read()?.oidc_refresh_token.clone())
    }

    pub fn oidc_id_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self.read()?.oidc_id_token.clone())
    }

    /// Consistent copy of the whole credential set
    pub fn snapshot(&self) -> Result<StoredCredentials, AuthError> {
        Ok(self.read()?.clone())
    }

    /// Replace the bearer token, keeping the method marker. `None` also resets
    /// the marker.
    pub fn set_token(&self, token: Option<String>) -> Result<(), AuthError> {
        self.update(|creds| {
            if token.is_none() {
                creds.auth_method = AuthMethod::None;
            }
            creds.bearer_token = token;
        })
    }

    /// Store a password-derived token. Password sessions carry no OIDC tokens.
    pub fn set_password_token(&self, token: String) -> Result<(), AuthError> {
        self.update(|creds| {
            creds.bearer_token = Some(token);
            creds.auth_method = AuthMethod::Password;
            creds.oidc_refresh_token = None;
            creds.oidc_id_token = None;
        })
    }

    /// Store tokens from an OIDC login or refresh. The access token becomes the
    /// bearer token.
    pub fn set_oidc_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
    ) -> Result<(), AuthError> {
        self.update(|creds| {
            creds.bearer_token = Some(access_token);
            creds.auth_method = AuthMethod::Oidc;
            creds.oidc_refresh_token = refresh_token;
            creds.oidc_id_token = id_token;
        })
    }

    /// Store refreshed OIDC tokens, but only while `expected_token` is still the
    /// OIDC bearer token. Returns `false` when the session changed meanwhile.
    pub fn replace_oidc_tokens(
        &self,
        expected_token: &str,
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
    ) -> Result<bool, AuthError> {
        let mut replaced = false;
        self.update(|creds| {
            if creds.effective_method() == AuthMethod::Oidc
                && creds.bearer_token.as_deref() == Some(expected_token)
            {
                creds.bearer_token = Some(access_token);
                creds.oidc_refresh_token = refresh_token;
                creds.oidc_id_token = id_token;
                replaced = true;
            }
        })?;
        Ok(replaced)
    }

    pub fn clear_oidc_tokens(&self) -> Result<(), AuthError> {
        self.update(|creds| {
            creds.oidc_refresh_token = None;
            creds.oidc_id_token = None;
        })
    }

    /// Drop the bearer token and the OIDC tokens in one write
    pub fn clear(&self) -> Result<(), AuthError> {
        self.update(|creds| *creds = StoredCredentials::default())
    }

    pub fn subscribe_token(&self) -> watch::Receiver<Option<String>> {
        self.token_tx.subscribe()
    }

    pub fn subscribe_method(&self) -> watch::Receiver<AuthMethod> {
        self.method_tx.subscribe()
    }

    /// Whether a bearer token is present
    pub fn subscribe_authorized(&self) -> watch::Receiver<bool> {
        self.authorized_tx.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut StoredCredentials)) -> Result<(), AuthError> {
        let mut guard = self.write()?;
        let mut next = guard.clone();
        apply(&mut next);
        if next == *guard {
            return Ok(());
        }

        let marker = next.auth_method.as_str();
        self.backend.apply(&[
            (TOKEN_KEY, next.bearer_token.as_deref()),
            (METHOD_KEY, Some(marker)),
            (OIDC_REFRESH_TOKEN_KEY, next.oidc_refresh_token.as_deref()),
            (OIDC_ID_TOKEN_KEY, next.oidc_id_token.as_deref()),
        ])?;

        let token = next.bearer_token.clone();
        let authorized = token.is_some();
        let method = next.effective_method();
        *guard = next;

        // Published while the write lock is held so observers see writes in order
        self.token_tx.send_if_modified(|current| {
            if *current != token {
                *current = token;
                true
            } else {
                false
            }
        });
        self.method_tx.send_if_modified(|current| {
            if *current != method {
                *current = method;
                true
            } else {
                false
            }
        });
        self.authorized_tx.send_if_modified(|current| {
            let changed = *current != authorized;
            *current = authorized;
            changed
        });

        debug!(method = %method, "credentials updated");
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoredCredentials>, AuthError> {
        self.state
            .read()
            .map_err(|e| AuthError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoredCredentials>, AuthError> {
        self.state
            .write()
            .map_err(|e| AuthError::Storage(format!("Failed to acquire write lock: {}", e)))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
