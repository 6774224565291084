//! Public wallet descriptor written next to the key-value store.
//!
//! The file only carries public data. The recovery phrase stays in the
//! key-value store and keys are always re-derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::core::address::Address;
use crate::core::errors::WalletError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDescriptor {
    pub address: Address,
    pub derivation_path: String,
    pub created_at: DateTime<Utc>,
    pub word_count: usize,
}

impl WalletDescriptor {
    pub fn new(address: Address, derivation_path: String, word_count: usize) -> Self {
        Self { address, derivation_path, created_at: Utc::now(), word_count }
    }

    /// `UTC--<timestamp>--<lowercase address>.json`
    pub fn file_name(&self) -> String {
        format!(
            "UTC--{}--{:x}.json",
            self.created_at.format("%Y-%m-%dT%H-%M-%S%.9fZ"),
            self.address
        )
    }

    /// Write into `dir`, creating it if needed. Never overwrites an existing
    /// file. Returns the file name that was created.
    pub async fn write_to(&self, dir: &Path) -> Result<String, WalletError> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            WalletError::Storage(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let file_name = self.file_name();
        let path = dir.join(&file_name);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| WalletError::Storage(format!("cannot create {}: {}", path.display(), e)))?;
        file.write_all(&serde_json::to_vec_pretty(self)?).await?;
        file.flush().await?;

        if !tokio::fs::try_exists(&path).await? {
            return Err(WalletError::Storage(format!(
                "wallet file {} was not created",
                path.display()
            )));
        }

        info!(file = %file_name, address = %self.address, "Wrote wallet descriptor");
        Ok(file_name)
    }

    pub async fn read_from(path: &Path) -> Result<Self, WalletError> {
        let content = tokio::fs::read(path)
            .await
            .map_err(|e| WalletError::Storage(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_slice(&content)?)
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}
