use super::storage::{SecretStore, StorageBackend};
use super::AuthError;
use keyring::Entry;
use tracing::debug;

const SERVICE_NAME: &str = "mealient";

/// KeyringBackend keeps each credential key as a separate OS keyring entry.
/// Batches use the restoring default [`SecretStore::apply`].
pub struct KeyringBackend {
    service_name: String,
}

impl KeyringBackend {
    /// Create a new keyring backend
    pub fn new() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, AuthError> {
        Entry::new(&self.service_name, key)
            .map_err(|e| AuthError::Storage(format!("Failed to create keyring entry: {}", e)))
    }

    /// Check if the OS keyring is available
    pub fn is_available(&self) -> bool {
        let entry = match Entry::new(&self.service_name, "_test_availability") {
            Ok(e) => e,
            Err(_) => return false,
        };

        if entry.set_password("test").is_err() {
            return false;
        }

        let _ = entry.delete_password();
        true
    }
}

impl SecretStore for KeyringBackend {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!(
                "Failed to read {} from keyring: {}",
                key, e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| AuthError::Storage(format!("Failed to store {} in keyring: {}", key, e)))
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        match self.entry(key)?.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => {
                debug!(key, "keyring entry already absent");
                Ok(())
            }
            Err(e) => Err(AuthError::Storage(format!(
                "Failed to delete {} from keyring: {}",
                key, e
            ))),
        }
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Keyring
    }
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new()
    }
}
