//! OAuth authorization code + PKCE (RFC 7636) helpers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Scopes requested from the identity provider
pub const OIDC_SCOPES: &str = "openid profile email";

/// PKCE parameters for OAuth flow
#[derive(Debug, Clone)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceParams {
    /// Generate PKCE code verifier and challenge
    pub fn generate() -> Self {
        let code_verifier = random_url_safe(32);
        let code_challenge = compute_code_challenge(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }
}

/// code_challenge = base64url_nopad(sha256(verifier))
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Random CSRF state value
pub fn generate_state() -> String {
    random_url_safe(16)
}

fn random_url_safe(len: usize) -> String {
    let bytes: Vec<u8> = (0..len).map(|_| rand::thread_rng().gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Build the authorization URL the browser is sent to
pub fn build_authorization_url(
    authorization_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
    code_challenge: &str,
) -> String {
    let params = [
        ("response_type", "code"),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("scope", OIDC_SCOPES),
        ("state", state),
        ("code_challenge", code_challenge),
        ("code_challenge_method", "S256"),
    ];

    let query_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    // Endpoints may already carry query parameters
    let separator = if authorization_endpoint.contains('?') { '&' } else { '?' };
    format!("{}{}{}", authorization_endpoint, separator, query_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_url_safe(s: &str) -> bool {
        s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_pkce_generation() {
        let pkce1 = PkceParams::generate();
        let pkce2 = PkceParams::generate();

        assert!(pkce1.code_verifier.len() >= 43 && pkce1.code_verifier.len() <= 128);
        assert!(is_url_safe(&pkce1.code_verifier));
        assert!(is_url_safe(&pkce1.code_challenge));
        assert_ne!(pkce1.code_verifier, pkce2.code_verifier);
        assert_eq!(pkce1.code_challenge, compute_code_challenge(&pkce1.code_verifier));
    }

    #[test]
    fn test_code_challenge_rfc7636_vector() {
        // Appendix B of RFC 7636
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            compute_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_state_is_unique() {
        let s1 = generate_state();
        let s2 = generate_state();
        assert_ne!(s1, s2);
        assert!(is_url_safe(&s1));
    }

    #[test]
    fn test_build_authorization_url() {
        let url = build_authorization_url(
            "https://idp.example.com/authorize",
            "mealient-mobile",
            "mealient://oauth/callback",
            "state-xyz",
            "challenge-abc",
        );

        assert!(url.starts_with("https://idp.example.com/authorize?response_type=code"));
        assert!(url.contains("client_id=mealient-mobile"));
        assert!(url.contains("redirect_uri=mealient%3A%2F%2Foauth%2Fcallback"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("state=state-xyz"));
        assert!(url.contains("code_challenge=challenge-abc"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn test_build_authorization_url_with_existing_query() {
        let url = build_authorization_url(
            "https://idp.example.com/authorize?tenant=a",
            "client",
            "mealient://oauth/callback",
            "s",
            "c",
        );
        assert!(url.starts_with("https://idp.example.com/authorize?tenant=a&response_type=code"));
    }
}
