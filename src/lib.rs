//! mealient authentication core
//!
//! Coordinates the three ways a Mealie client can sign in:
//! - password login exchanged for a long-lived API token
//! - native OIDC authorization code flow with PKCE
//! - a token scraped from the server's own web login page
//!
//! Tokens live in a [`auth::CredentialStore`]; the HTTP layer ([`http::ApiClient`])
//! reads them from there and refreshes or invalidates them when a request is
//! rejected.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;

pub use auth::{AuthError, AuthMethod, Authenticator, CredentialStore};
pub use config::Settings;
pub use http::{ApiClient, AuthenticationProvider};
