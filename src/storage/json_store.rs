use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::BlobStore;

/// File-based blob store. Each key is stored as `<base_dir>/<key>.json`.
pub struct JsonBlobStore {
    base_dir: PathBuf,
    lock: RwLock<()>,
}

impl JsonBlobStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            lock: RwLock::new(()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl BlobStore for JsonBlobStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let _lock = self.lock.read().await;
        let path = self.blob_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let data = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read blob file: {}", path.display()))?;
        Ok(Some(data))
    }

    async fn write(&self, key: &str, blob: &str) -> Result<()> {
        let _lock = self.lock.write().await;

        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .with_context(|| format!("Failed to create store dir: {}", self.base_dir.display()))?;

        let path = self.blob_path(key);
        let tmp_path = path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, blob).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _lock = self.lock.write().await;
        let path = self.blob_path(key);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }
}
