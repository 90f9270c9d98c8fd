//! Fallback for servers whose SSO only works through their own login page.
//!
//! A host loads [`WebLoginRequest::login_url`] in a browser, lets the user sign
//! in, and once [`WebLoginRequest::should_extract`] says so runs
//! [`WEB_TOKEN_SCRIPT`] to read the token Mealie's frontend stored. That token
//! cannot be refreshed.

use crate::api::normalize_base_url;

/// Storage key used by the Mealie frontend for its access token
pub const WEB_TOKEN_KEY: &str = "mealie.access_token";

/// Evaluates to the token, or `null` when the page has not stored one yet.
/// Checks local storage first, then the cookie of the same name.
pub const WEB_TOKEN_SCRIPT: &str = r#"(function() {
    var key = 'mealie.access_token';
    try {
        var token = window.localStorage.getItem(key);
        if (token) {
            return token;
        }
    } catch (e) {}
    var cookies = document.cookie.split(';');
    for (var i = 0; i < cookies.length; i++) {
        var cookie = cookies[i].trim();
        if (cookie.indexOf(key + '=') === 0) {
            return decodeURIComponent(cookie.substring(key.length + 1));
        }
    }
    return null;
})();"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebLoginRequest {
    base_url: String,
    login_url: String,
}

impl WebLoginRequest {
    pub fn new(base_url: &str) -> Self {
        let base_url = normalize_base_url(base_url);
        let login_url = format!("{}/login", base_url);
        Self {
            base_url,
            login_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub fn script(&self) -> &'static str {
        WEB_TOKEN_SCRIPT
    }

    /// True once a loaded page belongs to the server and is past the login page
    pub fn should_extract(&self, url: &str) -> bool {
        let Some(rest) = url.strip_prefix(&self.base_url) else {
            return false;
        };
        if !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
            return false;
        }
        !rest.starts_with("/login")
    }
}
