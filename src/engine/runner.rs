use tracing::{info, warn};

use crate::engine::error::EngineError;
use crate::engine::outcome::OutcomeRecorder;
use crate::engine::stats::{StatsExport, StatsReport, build_report, export_stats};
use crate::engine::traversal::TraversalEngine;
use crate::engine::types::*;
use crate::engine::webhook::{VariableSource, WebhookFetcher};
use crate::storage::repository::ScenarioRepository;

/// Everything needed to render the first prompt of a new call.
#[derive(Debug, Clone)]
pub struct CallStart {
    pub scenario: Scenario,
    pub state: RunState,
    /// Placeholder data for this run, if any could be obtained.
    pub variables: Option<WebhookData>,
}

/// Ties the store, the webhook lookup, traversal and outcome recording
/// together for one operator.
#[derive(Clone)]
pub struct CallRunner {
    repo: ScenarioRepository,
    fetcher: WebhookFetcher,
    recorder: OutcomeRecorder,
}

impl CallRunner {
    pub fn new(repo: ScenarioRepository, fetcher: WebhookFetcher) -> Self {
        Self {
            recorder: OutcomeRecorder::new(repo.clone()),
            repo,
            fetcher,
        }
    }

    pub fn repository(&self) -> &ScenarioRepository {
        &self.repo
    }

    async fn load(&self, scenario_id: &str) -> Result<Scenario, EngineError> {
        self.repo
            .find_scenario(scenario_id)
            .await?
            .ok_or_else(|| EngineError::ScenarioNotFound(scenario_id.to_string()))
    }

    /// Start a call. The webhook is consulted at most once here; freshly
    /// fetched data is cached on the stored scenario for later runs.
    pub async fn begin(&self, scenario_id: &str) -> Result<CallStart, EngineError> {
        let mut scenario = self.load(scenario_id).await?;
        let state = TraversalEngine::new(&scenario).start()?;

        let source = self.fetcher.load_variables(&scenario).await;
        if let VariableSource::Fetched(ref data) = source {
            scenario.webhook_data = Some(data.clone());
            if let Err(e) = self.repo.replace_scenario(&scenario).await {
                warn!(
                    scenario = %scenario_id,
                    error = %format!("{:#}", e),
                    "Failed to cache webhook data"
                );
            }
        }

        info!(
            scenario = %scenario_id,
            steps = scenario.steps.len(),
            variables = source.data().map(|d| d.len()).unwrap_or(0),
            "Call started"
        );

        Ok(CallStart {
            scenario,
            state,
            variables: source.into_data(),
        })
    }

    /// Record the outcome of a call on a stored scenario.
    pub async fn finish(
        &self,
        scenario_id: &str,
        run: &RunState,
        classification: Option<CallOutcome>,
        outcome_notes: &str,
    ) -> Result<CallResult, EngineError> {
        let scenario = self.load(scenario_id).await?;
        self.recorder
            .record(&scenario, run, classification, outcome_notes)
            .await
    }

    pub async fn report(
        &self,
        scenario_id: &str,
        recent_limit: usize,
    ) -> Result<StatsReport, EngineError> {
        let scenario = self.load(scenario_id).await?;
        let stats = self.repo.stats_for(scenario_id).await?;
        let results = self.repo.results_for(scenario_id).await?;
        Ok(build_report(&scenario, stats, &results, recent_limit))
    }

    pub async fn export_stats(&self, scenario_id: &str) -> Result<StatsExport, EngineError> {
        let scenario = self.load(scenario_id).await?;
        let stats = self.repo.stats_for(scenario_id).await?;
        let results = self.repo.results_for(scenario_id).await?;
        Ok(export_stats(&scenario, stats, &results))
    }
}
