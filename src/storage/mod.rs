//! Small key-value persistence used to remember the wallet between runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::errors::WalletError;

pub mod descriptor;

pub use descriptor::WalletDescriptor;

/// Key of the generated wallet descriptor's file name.
pub const KEY_FILENAME: &str = "filename";
/// Key of the stored recovery phrase.
pub const KEY_MNEMONIC: &str = "mnemonic";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, WalletError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), WalletError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), WalletError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A flat JSON object on disk. Every `put` rewrites the whole file through
/// a temporary sibling and a rename, so readers never see a partial file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, WalletError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                WalletError::Storage(format!("{} is not a JSON object: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(WalletError::Storage(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), WalletError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        write_private(&tmp, &serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, WalletError> {
        Ok(self.load().await?.remove(key))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), WalletError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await?;
        debug!(key, path = %self.path.display(), "Stored value");
        Ok(())
    }
}

/// Write `contents` readable by the owner only. The store holds the recovery
/// phrase in plain text.
#[cfg(unix)]
async fn write_private(path: &Path, contents: &[u8]) -> Result<(), WalletError> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    // mode() only applies on creation; a leftover temp file keeps its old bits
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn write_private(path: &Path, contents: &[u8]) -> Result<(), WalletError> {
    tokio::fs::write(path, contents).await?;
    Ok(())
}

/// Open the store configured at `path`.
pub fn open_store(path: &Path) -> JsonFileStore {
    info!("Using key-value store at {}", path.display());
    JsonFileStore::new(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get(KEY_MNEMONIC).await.unwrap(), None);
        store.put(KEY_MNEMONIC, "one two").await.unwrap();
        store.put(KEY_MNEMONIC, "three four").await.unwrap();
        assert_eq!(store.get(KEY_MNEMONIC).await.unwrap().as_deref(), Some("three four"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let store = JsonFileStore::new(&path);
        assert_eq!(store.get(KEY_FILENAME).await.unwrap(), None);
        store.put(KEY_FILENAME, "UTC--x.json").await.unwrap();
        store.put(KEY_MNEMONIC, "words").await.unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get(KEY_FILENAME).await.unwrap().as_deref(), Some("UTC--x.json"));
        assert_eq!(reopened.get(KEY_MNEMONIC).await.unwrap().as_deref(), Some("words"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        // stale world-readable temp file from an interrupted write
        std::fs::write(path.with_extension("json.tmp"), b"{}").unwrap();
        std::fs::set_permissions(
            path.with_extension("json.tmp"),
            std::fs::Permissions::from_mode(0o644),
        )
        .unwrap();

        let store = JsonFileStore::new(&path);
        store.put(KEY_MNEMONIC, "secret words").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "mode is {:o}", mode);

        store.put(KEY_FILENAME, "UTC--x.json").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "mode is {:o}", mode);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get(KEY_MNEMONIC).await, Err(WalletError::Storage(_))));
    }
}
