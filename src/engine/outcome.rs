use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::error::EngineError;
use crate::engine::types::*;
use crate::storage::repository::ScenarioRepository;

/// Join the free-form call notes and the outcome notes into one text.
pub fn compose_notes(call_notes: &str, outcome_notes: &str) -> String {
    format!("{}\n\nOutcome: {}", call_notes, outcome_notes)
        .trim()
        .to_string()
}

/// Build the immutable record for a finished call.
pub fn build_call_result(
    scenario: &Scenario,
    run: &RunState,
    outcome: CallOutcome,
    outcome_notes: &str,
    now: DateTime<Utc>,
) -> CallResult {
    CallResult {
        id: format!("call-{}", Uuid::new_v4()),
        scenario_id: scenario.id.clone(),
        result: outcome,
        notes: compose_notes(&run.notes, outcome_notes),
        step_history: run.step_history.clone(),
        duration: (now - run.started_at).num_milliseconds().max(0),
        timestamp: now,
    }
}

/// Persists finished calls and keeps per-scenario counters current.
///
/// The results log, the counters and the scenario's `lastUsed` are three
/// separate whole-blob writes; an interruption between them leaves the
/// documents out of step with each other and nothing repairs that.
#[derive(Clone)]
pub struct OutcomeRecorder {
    repo: ScenarioRepository,
}

impl OutcomeRecorder {
    pub fn new(repo: ScenarioRepository) -> Self {
        Self { repo }
    }

    pub async fn record(
        &self,
        scenario: &Scenario,
        run: &RunState,
        classification: Option<CallOutcome>,
        outcome_notes: &str,
    ) -> Result<CallResult, EngineError> {
        self.record_at(scenario, run, classification, outcome_notes, Utc::now())
            .await
    }

    /// Same as [`record`](Self::record) with an explicit clock.
    pub async fn record_at(
        &self,
        scenario: &Scenario,
        run: &RunState,
        classification: Option<CallOutcome>,
        outcome_notes: &str,
        now: DateTime<Utc>,
    ) -> Result<CallResult, EngineError> {
        let outcome = classification.ok_or(EngineError::MissingClassification)?;
        let result = build_call_result(scenario, run, outcome, outcome_notes, now);

        self.repo.append_result(&result).await?;

        let mut stats = self.repo.all_stats().await?;
        stats.entry(scenario.id.clone()).or_default().record(outcome);
        self.repo.save_all_stats(&stats).await?;

        let mut scenarios = self.repo.scenarios().await?;
        match scenarios.iter_mut().find(|s| s.id == scenario.id) {
            Some(stored) => {
                stored.last_used = Some(now);
                self.repo.save_scenarios(&scenarios).await?;
            }
            None => warn!(
                scenario = %scenario.id,
                "Recorded outcome for a scenario that is not stored"
            ),
        }

        info!(
            scenario = %scenario.id,
            outcome = %outcome,
            duration_ms = result.duration,
            steps = result.step_history.len(),
            "Call outcome recorded"
        );

        Ok(result)
    }
}
