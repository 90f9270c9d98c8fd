use crate::auth::storage::StorageKind;
use crate::auth::types::{DEFAULT_CLIENT_ID, DEFAULT_REDIRECT_URI};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "mealient";
const DEFAULT_API_TOKEN_NAME: &str = "Mealient";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Persisted client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server base URL accepted by the compatibility check
    pub base_url: Option<String>,
    pub server_version: Option<String>,
    pub storage: StorageKind,
    pub client_id: String,
    pub redirect_uri: String,
    /// Name given to the API token created after password login
    pub api_token_name: String,
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            server_version: None,
            storage: StorageKind::Auto,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            api_token_name: DEFAULT_API_TOKEN_NAME.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Directory holding settings and the file credential backend
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Cannot determine config directory")?;
    Ok(config_dir.join(APP_DIR))
}

/// Get the path to the settings file
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Credentials file used when the keyring is not available
pub fn credentials_path(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .map(|dir| dir.join("credentials.json"))
        .unwrap_or_else(|| PathBuf::from("credentials.json"))
}

/// Load settings from `path`; a missing file yields defaults
pub fn load_config(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let data = fs::read_to_string(path).context("Failed to read config file")?;

    let settings: Settings = serde_json::from_str(&data).context("Failed to parse config file")?;

    Ok(settings)
}

/// Save the settings to disk
pub fn save_config(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let data = serde_json::to_string_pretty(settings).context("Failed to serialize config")?;

    fs::write(path, data).context("Failed to write config file")?;

    // Write with user-only permissions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}
