use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::storage::BlobStore;

/// In-memory blob store. Contents live only as long as the instance.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let blobs = self.blobs.lock().map_err(|_| anyhow!("blob store lock poisoned"))?;
        Ok(blobs.get(key).cloned())
    }

    async fn write(&self, key: &str, blob: &str) -> Result<()> {
        self.blobs
            .lock()
            .map_err(|_| anyhow!("blob store lock poisoned"))?
            .insert(key.to_string(), blob.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.blobs
            .lock()
            .map_err(|_| anyhow!("blob store lock poisoned"))?
            .remove(key);
        Ok(())
    }
}
