use super::*;
use crate::auth::types::{DEFAULT_CLIENT_ID, DEFAULT_REDIRECT_URI};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn repo() -> OidcAuthRepo {
    OidcAuthRepo::new(
        OidcDiscovery::new(Client::new()),
        ServerApi::new(Client::new()),
        DEFAULT_CLIENT_ID,
        DEFAULT_REDIRECT_URI,
    )
}

fn discovery_document(server: &MockServer) -> serde_json::Value {
    json!({
        "issuer": server.uri(),
        "authorization_endpoint": format!("{}/authorize", server.uri()),
        "token_endpoint": format!("{}/token", server.uri()),
        "end_session_endpoint": format!("{}/logout", server.uri())
    })
}

async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(discovery_document(server)))
        .mount(server)
        .await;
}

async fn mount_server_info(server: &MockServer, enable_oidc: bool, oidc_redirect: bool) {
    Mock::given(method("GET"))
        .and(path("/api/app/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": "v3.1.0",
            "enableOidc": enable_oidc,
            "oidcRedirect": oidc_redirect
        })))
        .mount(server)
        .await;
}

async fn configured_repo(server: &MockServer) -> OidcAuthRepo {
    mount_discovery(server).await;
    let repo = repo();
    repo.discover_oidc_config(&server.uri()).await.unwrap();
    repo
}

#[tokio::test]
async fn test_discovery_success_configures() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let repo = repo();
    assert_eq!(repo.state(), OidcAuthState::NotConfigured);

    let config = repo.discover_oidc_config(&server.uri()).await.unwrap();
    assert_eq!(config.token_endpoint, format!("{}/token", server.uri()));
    assert_eq!(config.end_session_endpoint, Some(format!("{}/logout", server.uri())));
    assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
    assert_eq!(repo.state(), OidcAuthState::Configured(config));
}

#[tokio::test]
async fn test_discovery_unavailable_detects_web_based() {
    let server = MockServer::start().await;
    mount_server_info(&server, true, true).await;
    let repo = repo();

    let err = repo.discover_oidc_config(&server.uri()).await.unwrap_err();
    assert!(matches!(err, AuthError::WebBasedOidc { .. }));
    assert_eq!(repo.state(), OidcAuthState::WebBased(server.uri()));
}

#[tokio::test]
async fn test_discovery_unavailable_without_redirect_is_not_configured() {
    let server = MockServer::start().await;
    mount_server_info(&server, true, false).await;
    let repo = repo();

    let err = repo.discover_oidc_config(&server.uri()).await.unwrap_err();
    assert!(matches!(err, AuthError::OidcNotEnabled));
    assert_eq!(repo.state(), OidcAuthState::NotConfigured);
}

#[tokio::test]
async fn test_discovery_unavailable_and_info_unreachable() {
    let server = MockServer::start().await;
    let repo = repo();

    let err = repo.discover_oidc_config(&server.uri()).await.unwrap_err();
    assert!(matches!(err, AuthError::OidcNotEnabled));
    assert_eq!(repo.state(), OidcAuthState::NotConfigured);
}

#[tokio::test]
async fn test_invalid_document_prefers_web_based() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;
    mount_server_info(&server, true, true).await;
    let repo = repo();

    let err = repo.discover_oidc_config(&server.uri()).await.unwrap_err();
    assert!(matches!(err, AuthError::WebBasedOidc { .. }));
    assert_eq!(repo.state(), OidcAuthState::WebBased(server.uri()));
}

#[tokio::test]
async fn test_invalid_document_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;
    mount_server_info(&server, false, false).await;
    let repo = repo();

    let err = repo.discover_oidc_config(&server.uri()).await.unwrap_err();
    assert!(matches!(err, AuthError::DiscoveryFailed(_)));
    assert!(matches!(repo.state(), OidcAuthState::Failed(_)));
}

#[tokio::test]
async fn test_subscribers_observe_final_state() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let repo = repo();
    let mut rx = repo.subscribe();

    repo.discover_oidc_config(&server.uri()).await.unwrap();
    rx.changed().await.unwrap();
    assert!(matches!(*rx.borrow_and_update(), OidcAuthState::Configured(_)));
}

#[tokio::test]
async fn test_abandoned_discovery_restores_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(discovery_document(&server))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let repo = repo();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), repo.discover_oidc_config(&server.uri()))
            .await;
    assert!(abandoned.is_err());
    assert_eq!(repo.state(), OidcAuthState::NotConfigured);
}

#[test]
fn test_start_flow_requires_configuration() {
    let repo = repo();
    let err = repo.start_oidc_flow().unwrap_err();
    assert!(matches!(err, AuthError::OidcNotConfigured));
}

#[tokio::test]
async fn test_start_flow_builds_request() {
    let server = MockServer::start().await;
    let repo = configured_repo(&server).await;

    let request = repo.start_oidc_flow().unwrap();
    assert!(request
        .authorization_url
        .starts_with(&format!("{}/authorize?", server.uri())));
    assert!(request
        .authorization_url
        .contains(&format!("state={}", request.state)));
    assert!(request.authorization_url.contains("code_challenge_method=S256"));
    assert!(!request.authorization_url.contains(&request.code_verifier));
}

#[tokio::test]
async fn test_matching_state_is_accepted_once() {
    let server = MockServer::start().await;
    let repo = configured_repo(&server).await;
    let request = repo.start_oidc_flow().unwrap();

    repo.handle_authorization_response("code", &request.state, &request.code_verifier)
        .unwrap();

    // Replaying the same callback fails closed
    let err = repo
        .handle_authorization_response("code", &request.state, &request.code_verifier)
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidState));
}

#[tokio::test]
async fn test_mismatched_state_is_rejected() {
    let server = MockServer::start().await;
    let repo = configured_repo(&server).await;
    let request = repo.start_oidc_flow().unwrap();

    let forged = [
        "forged".to_string(),
        format!("{}x", request.state),
        request.state[1..].to_string(),
    ];
    for state in &forged {
        let err = repo
            .handle_authorization_response("code", state, &request.code_verifier)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidState));
    }

    // A forged callback does not cancel the genuine one
    repo.handle_authorization_response("code", &request.state, &request.code_verifier)
        .unwrap();
}

#[tokio::test]
async fn test_new_flow_supersedes_previous() {
    let server = MockServer::start().await;
    let repo = configured_repo(&server).await;

    let first = repo.start_oidc_flow().unwrap();
    let second = repo.start_oidc_flow().unwrap();
    assert_ne!(first.state, second.state);

    let err = repo
        .handle_authorization_response("code", &first.state, &first.code_verifier)
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidState));

    repo.handle_authorization_response("code", &second.state, &second.code_verifier)
        .unwrap();
}

#[test]
fn test_missing_parameters_rejected() {
    let repo = repo();
    assert!(matches!(
        repo.handle_authorization_response("", "s", "v"),
        Err(AuthError::MissingCallbackParameter("code"))
    ));
    assert!(matches!(
        repo.handle_authorization_response("c", "", "v"),
        Err(AuthError::MissingCallbackParameter("state"))
    ));
    assert!(matches!(
        repo.handle_authorization_response("c", "s", ""),
        Err(AuthError::MissingCallbackParameter("code_verifier"))
    ));
}

#[test]
fn test_callback_without_outstanding_request() {
    let repo = repo();
    let err = repo.handle_authorization_response("c", "s", "v").unwrap_err();
    assert!(matches!(err, AuthError::InvalidState));
}
