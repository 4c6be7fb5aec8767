pub mod json_store;
pub mod memory_store;
pub mod repository;

use anyhow::Result;
use async_trait::async_trait;

/// Key holding the ordered array of scenario documents.
pub const SCENARIOS_KEY: &str = "call-scenarios";
/// Key holding the append-only array of call results.
pub const RESULTS_KEY: &str = "call-results";
/// Key holding the scenario id → counters map.
pub const STATS_KEY: &str = "scenario-stats";

/// Keyed blob persistence. Blobs are read and overwritten whole; there are
/// no partial updates and no transactions.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob, `None` if the key was never written.
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite a blob.
    async fn write(&self, key: &str, blob: &str) -> Result<()>;

    /// Delete a blob. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
