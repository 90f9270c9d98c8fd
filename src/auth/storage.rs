//! Key-value persistence for credentials with keyring and file fallback

use super::keyring::KeyringBackend;
use super::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// OS native keyring
    Keyring,
    /// JSON file in user config directory
    File,
    /// Process memory only
    Memory,
}

impl StorageBackend {
    pub fn describe(&self) -> &'static str {
        match self {
            StorageBackend::Keyring => "OS keyring",
            StorageBackend::File => "file",
            StorageBackend::Memory => "memory",
        }
    }
}

/// Which backend the user asked for in settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Keyring when available, file otherwise
    #[default]
    Auto,
    Keyring,
    File,
}

/// A string key-value store for secrets.
///
/// `apply` writes a batch of changes; `None` removes the key. Backends that
/// can write the batch in one operation override it. The default writes key
/// by key and, if one write fails, restores the values it read beforehand.
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;

    fn remove(&self, key: &str) -> Result<(), AuthError>;

    fn backend(&self) -> StorageBackend;

    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<(), AuthError> {
        let previous = changes
            .iter()
            .map(|(key, _)| Ok((*key, self.get(key)?)))
            .collect::<Result<Vec<_>, AuthError>>()?;

        for (written, (key, value)) in changes.iter().enumerate() {
            if let Err(e) = write_entry(self, key, *value) {
                warn!(key, error = %e, "credential write failed, restoring previous values");
                for (key, value) in previous[..=written].iter().rev() {
                    if let Err(restore) = write_entry(self, key, value.as_deref()) {
                        warn!(key, error = %restore, "failed to restore credential");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

fn write_entry<S>(store: &S, key: &str, value: Option<&str>) -> Result<(), AuthError>
where
    S: SecretStore + ?Sized,
{
    match value {
        Some(v) => store.set(key, v),
        None => store.remove(key),
    }
}

/// Open the backend selected by `kind`. `file_path` is used for the file backend.
pub fn open_backend(kind: StorageKind, file_path: PathBuf) -> Box<dyn SecretStore> {
    match kind {
        StorageKind::Keyring => Box::new(KeyringBackend::new()),
        StorageKind::File => Box::new(FileBackend::new(file_path)),
        StorageKind::Auto => {
            let keyring = KeyringBackend::new();
            if keyring.is_available() {
                Box::new(keyring)
            } else {
                warn!(path = %file_path.display(), "keyring unavailable, falling back to file storage");
                Box::new(FileBackend::new(file_path))
            }
        }
    }
}

/// File-based credential storage format
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileStorage {
    #[serde(default)]
    entries: HashMap<String, String>,
}

/// Stores all keys in one JSON file with user-only permissions
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file_storage(&self) -> Result<FileStorage, AuthError> {
        if !self.path.exists() {
            return Ok(FileStorage::default());
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| AuthError::Storage(format!("Failed to read credentials file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| AuthError::Storage(format!("Failed to parse credentials file: {}", e)))
    }

    fn write_file_storage(&self, storage: &FileStorage) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AuthError::Storage(format!("Failed to create credentials directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(storage)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize credentials: {}", e)))?;

        // Write next to the target and rename so readers never see a partial file
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)
            .map_err(|e| AuthError::Storage(format!("Failed to write credentials file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&tmp_path)
                .map_err(|e| AuthError::Storage(format!("Failed to get file metadata: {}", e)))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&tmp_path, perms)
                .map_err(|e| AuthError::Storage(format!("Failed to set file permissions: {}", e)))?;
        }

        fs::rename(&tmp_path, &self.path)
            .map_err(|e| AuthError::Storage(format!("Failed to replace credentials file: {}", e)))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, AuthError> {
        self.lock
            .lock()
            .map_err(|e| AuthError::Storage(format!("Failed to acquire file lock: {}", e)))
    }
}

impl SecretStore for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let _guard = self.lock()?;
        Ok(self.read_file_storage()?.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.apply(&[(key, Some(value))])
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.apply(&[(key, None)])
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::File
    }

    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<(), AuthError> {
        let _guard = self.lock()?;
        let mut storage = self.read_file_storage()?;
        for (key, value) in changes {
            match value {
                Some(v) => {
                    storage.entries.insert(key.to_string(), v.to_string());
                }
                None => {
                    storage.entries.remove(*key);
                }
            }
        }
        debug!(path = %self.path.display(), changes = changes.len(), "writing credentials file");
        self.write_file_storage(&storage)
    }
}

/// In-memory backend; nothing survives the process
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AuthError> {
        self.entries
            .lock()
            .map_err(|e| AuthError::Storage(format!("Failed to acquire memory lock: {}", e)))
    }
}

impl SecretStore for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        self.entries()?.remove(key);
        Ok(())
    }

    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<(), AuthError> {
        let mut entries = self.entries()?;
        for (key, value) in changes {
            match value {
                Some(v) => {
                    entries.insert(key.to_string(), v.to_string());
                }
                None => {
                    entries.remove(*key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("credentials.json"));

        assert_eq!(backend.get("auth_token").unwrap(), None);
        backend.set("auth_token", "abc").unwrap();
        assert_eq!(backend.get("auth_token").unwrap().as_deref(), Some("abc"));

        backend.remove("auth_token").unwrap();
        assert_eq!(backend.get("auth_token").unwrap(), None);
        // Removing a missing key is not an error
        backend.remove("auth_token").unwrap();
    }

    #[test]
    fn test_file_backend_apply_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");
        let backend = FileBackend::new(&path);

        backend.set("stale", "x").unwrap();
        backend
            .apply(&[("a", Some("1")), ("b", Some("2")), ("stale", None)])
            .unwrap();

        let reopened = FileBackend::new(&path);
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(reopened.get("stale").unwrap(), None);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_backend_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        FileBackend::new(&path).set("k", "v").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_backend_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "not json").unwrap();

        let err = FileBackend::new(&path).get("k").unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
    }

    #[test]
    fn test_memory_backend() {
        let backend = MemoryBackend::new();
        backend.apply(&[("a", Some("1")), ("b", None)]).unwrap();
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(backend.backend(), StorageBackend::Memory);
    }

    /// Delegates to memory but fails the `fail_at`-th mutating call
    struct FailingBackend {
        inner: MemoryBackend,
        writes: std::sync::atomic::AtomicUsize,
        fail_at: usize,
    }

    impl FailingBackend {
        fn new(inner: MemoryBackend, fail_at: usize) -> Self {
            Self {
                inner,
                writes: std::sync::atomic::AtomicUsize::new(0),
                fail_at,
            }
        }

        fn check(&self) -> Result<(), AuthError> {
            let n = self.writes.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if n == self.fail_at {
                return Err(AuthError::Storage("keyring locked".to_string()));
            }
            Ok(())
        }
    }

    impl SecretStore for FailingBackend {
        fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
            self.check()?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), AuthError> {
            self.check()?;
            self.inner.remove(key)
        }

        fn backend(&self) -> StorageBackend {
            StorageBackend::Keyring
        }
    }

    #[test]
    fn test_failed_batch_restores_previous_values() {
        let inner = MemoryBackend::new();
        inner
            .apply(&[("token", Some("old")), ("method", Some("oidc")), ("refresh", Some("r1"))])
            .unwrap();
        let backend = FailingBackend::new(inner, 3);

        let err = backend
            .apply(&[
                ("token", Some("new")),
                ("method", Some("password")),
                ("refresh", None),
                ("id", None),
            ])
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));

        assert_eq!(backend.get("token").unwrap().as_deref(), Some("old"));
        assert_eq!(backend.get("method").unwrap().as_deref(), Some("oidc"));
        assert_eq!(backend.get("refresh").unwrap().as_deref(), Some("r1"));
        assert_eq!(backend.get("id").unwrap(), None);
    }

    #[test]
    fn test_storage_kind_serde() {
        let kind: StorageKind = serde_json::from_str("\"file\"").unwrap();
        assert_eq!(kind, StorageKind::File);
        assert_eq!(serde_json::to_string(&StorageKind::Auto).unwrap(), "\"auto\"");
    }
}
