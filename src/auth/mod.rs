pub mod callback;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod facade;
pub mod keyring;
pub mod oidc;
pub mod pkce;
pub mod refresh;
pub mod storage;
pub mod store;
pub mod types;
pub mod web_login;

pub use callback::CallbackResult;
pub use discovery::OidcDiscovery;
pub use error::AuthError;
pub use exchange::TokenExchange;
pub use facade::Authenticator;
pub use keyring::KeyringBackend;
pub use oidc::OidcAuthRepo;
pub use refresh::OidcTokenRefresh;
pub use storage::{open_backend, FileBackend, MemoryBackend, SecretStore, StorageBackend, StorageKind};
pub use store::CredentialStore;
pub use types::{
    AuthMethod, OidcAuthState, OidcAuthorizationRequest, OidcConfig, OidcTokens, StoredCredentials,
};
pub use web_login::WebLoginRequest;
