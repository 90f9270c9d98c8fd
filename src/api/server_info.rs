//! Server compatibility check

use super::client::{normalize_base_url, ServerApi};
use super::version::{ApiVersion, VersionResponse};
use crate::auth::AuthError;
use tracing::{info, warn};

/// Validates a candidate server before it is remembered
pub struct ServerInfoRepo {
    api: ServerApi,
}

impl ServerInfoRepo {
    pub fn new(api: ServerApi) -> Self {
        Self { api }
    }

    /// Ask the server for its version and reject anything older than v2.
    /// Returns the normalized base URL with the version info.
    pub async fn try_base_url(
        &self,
        base_url: &str,
    ) -> Result<(String, VersionResponse), AuthError> {
        let base_url = normalize_base_url(base_url);
        let info = self.api.request_version(&base_url).await?;

        if !ApiVersion::is_v2_or_later(&info.version) {
            warn!(version = %info.version, "server version not supported");
            return Err(AuthError::UnsupportedServerVersion {
                version: info.version,
            });
        }

        info!(version = %info.version, %base_url, "server version validated");
        Ok((base_url, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_version(version: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/app/about"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": version })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_accepts_v2_server() {
        let server = server_with_version("v2.4.1").await;
        let repo = ServerInfoRepo::new(ServerApi::new(reqwest::Client::new()));

        let (base_url, info) = repo.try_base_url(&format!("{}/", server.uri())).await.unwrap();
        assert_eq!(base_url, server.uri());
        assert_eq!(info.version, "v2.4.1");
    }

    #[tokio::test]
    async fn test_rejects_v1_server() {
        let server = server_with_version("v1.0.0").await;
        let repo = ServerInfoRepo::new(ServerApi::new(reqwest::Client::new()));

        let err = repo.try_base_url(&server.uri()).await.unwrap_err();
        match err {
            AuthError::UnsupportedServerVersion { version } => assert_eq!(version, "v1.0.0"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let server = MockServer::start().await;
        let repo = ServerInfoRepo::new(ServerApi::new(reqwest::Client::new()));

        let err = repo.try_base_url(&server.uri()).await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
    }
}
