use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::engine::types::{CallResult, Scenario, ScenarioStats};
use crate::storage::{BlobStore, RESULTS_KEY, SCENARIOS_KEY, STATS_KEY};

/// Typed access to the three persisted documents. Every mutation is an
/// independent read-modify-write of one whole blob.
#[derive(Clone)]
pub struct ScenarioRepository {
    store: Arc<dyn BlobStore>,
}

impl ScenarioRepository {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.store.read(key).await? {
            Some(data) => serde_json::from_str(&data)
                .with_context(|| format!("Corrupt JSON stored under '{}'", key)),
            None => Ok(T::default()),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string_pretty(value)?;
        self.store.write(key, &data).await
    }

    // --- Scenarios ---

    /// Whether the scenario document was ever written (an empty list counts).
    pub async fn has_scenarios(&self) -> Result<bool> {
        Ok(self.store.read(SCENARIOS_KEY).await?.is_some())
    }

    pub async fn scenarios(&self) -> Result<Vec<Scenario>> {
        self.read_json(SCENARIOS_KEY).await
    }

    pub async fn save_scenarios(&self, scenarios: &[Scenario]) -> Result<()> {
        self.write_json(SCENARIOS_KEY, scenarios).await
    }

    pub async fn find_scenario(&self, id: &str) -> Result<Option<Scenario>> {
        Ok(self.scenarios().await?.into_iter().find(|s| s.id == id))
    }

    /// Overwrite the stored scenario with the same id. Returns `false` when
    /// no such scenario exists.
    pub async fn replace_scenario(&self, scenario: &Scenario) -> Result<bool> {
        let mut scenarios = self.scenarios().await?;
        match scenarios.iter_mut().find(|s| s.id == scenario.id) {
            Some(slot) => {
                *slot = scenario.clone();
                self.save_scenarios(&scenarios).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- Call results ---

    pub async fn results(&self) -> Result<Vec<CallResult>> {
        self.read_json(RESULTS_KEY).await
    }

    pub async fn results_for(&self, scenario_id: &str) -> Result<Vec<CallResult>> {
        Ok(self
            .results()
            .await?
            .into_iter()
            .filter(|r| r.scenario_id == scenario_id)
            .collect())
    }

    pub async fn append_result(&self, result: &CallResult) -> Result<()> {
        let mut results = self.results().await?;
        results.push(result.clone());
        self.write_json(RESULTS_KEY, &results).await
    }

    // --- Stats ---

    pub async fn all_stats(&self) -> Result<BTreeMap<String, ScenarioStats>> {
        self.read_json(STATS_KEY).await
    }

    pub async fn stats_for(&self, scenario_id: &str) -> Result<Option<ScenarioStats>> {
        Ok(self.all_stats().await?.get(scenario_id).copied())
    }

    pub async fn save_all_stats(&self, stats: &BTreeMap<String, ScenarioStats>) -> Result<()> {
        self.write_json(STATS_KEY, stats).await
    }
}
