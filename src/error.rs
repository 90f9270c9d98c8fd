//! Error types for the command-line host

use crate::auth::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Stable identifier printed next to the message
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Auth(err) => match err {
                AuthError::Unauthorized => "unauthorized",
                AuthError::UnsupportedServerVersion { .. } => "unsupported_server",
                AuthError::OidcNotEnabled => "oidc_not_enabled",
                AuthError::WebBasedOidc { .. } => "web_based_oidc",
                AuthError::DiscoveryFailed(_) => "discovery_failed",
                AuthError::OidcNotConfigured => "oidc_not_configured",
                AuthError::InvalidState => "invalid_state",
                AuthError::MissingCallbackParameter(_) => "missing_callback_parameter",
                AuthError::AuthorizationDenied { .. } => "authorization_denied",
                AuthError::TokenExchange(_) => "token_exchange_failed",
                AuthError::NoToken => "no_token",
                AuthError::NoServer => "no_server",
                AuthError::Network(_) => "network_error",
                AuthError::Parse(_) => "parse_error",
                AuthError::Storage(_) => "storage_error",
            },
            AppError::Io(_) => "io_error",
            AppError::Other(_) => "internal_error",
        }
    }

    /// Process exit code: 1 usage, 2 network, 3 credentials, 4 server
    /// unsupported, 5 anything else
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidInput(_) => 1,
            AppError::Auth(err) => match err {
                AuthError::NoServer | AuthError::MissingCallbackParameter(_) => 1,
                AuthError::Network(_)
                | AuthError::DiscoveryFailed(_)
                | AuthError::TokenExchange(_) => 2,
                AuthError::Unauthorized
                | AuthError::NoToken
                | AuthError::InvalidState
                | AuthError::AuthorizationDenied { .. } => 3,
                AuthError::UnsupportedServerVersion { .. }
                | AuthError::OidcNotEnabled
                | AuthError::WebBasedOidc { .. }
                | AuthError::OidcNotConfigured => 4,
                AuthError::Parse(_) | AuthError::Storage(_) => 5,
            },
            AppError::Io(_) | AppError::Other(_) => 5,
        }
    }
}
