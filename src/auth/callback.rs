//! Parsing the redirect the identity provider sends back to the app

use super::AuthError;
use tracing::{debug, warn};
use url::Url;

/// Successful authorization response: code plus the echoed CSRF state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub code: String,
    pub state: String,
}

impl CallbackResult {
    /// Parse `redirect` as delivered to `expected_redirect_uri`.
    ///
    /// Provider errors become [`AuthError::AuthorizationDenied`]; a missing or
    /// empty `code`/`state` is reported before any token exchange happens.
    pub fn from_redirect(redirect: &str, expected_redirect_uri: &str) -> Result<Self, AuthError> {
        let url = Url::parse(redirect.trim())?;
        let expected = Url::parse(expected_redirect_uri)?;

        if !same_endpoint(&url, &expected) {
            warn!(scheme = url.scheme(), "redirect does not target the registered URI");
            return Err(AuthError::Parse(format!(
                "Redirect does not match {}",
                expected_redirect_uri
            )));
        }

        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match &*key {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            warn!(%error, "authorization denied by provider");
            return Err(AuthError::AuthorizationDenied { error, description });
        }

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCallbackParameter("code"))?;
        let state = state
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingCallbackParameter("state"))?;

        debug!("authorization callback parsed");
        Ok(Self { code, state })
    }
}

fn same_endpoint(url: &Url, expected: &Url) -> bool {
    url.scheme() == expected.scheme()
        && url.host_str() == expected.host_str()
        && url.port_or_known_default() == expected.port_or_known_default()
        && url.path().trim_end_matches('/') == expected.path().trim_end_matches('/')
}
