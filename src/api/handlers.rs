use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::engine::ScenarioDraft;
use crate::engine::editor::{self, Connections};
use crate::engine::stats::{StatsExport, StatsReport};
use crate::engine::traversal::{Prompt, RunStatus, StepMark, Transition, TraversalEngine};
use crate::engine::types::*;

use super::AppState;
use super::errors::AppError;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct ListScenariosQuery {
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct StatsQuery {
    pub recent: Option<usize>,
}

#[derive(Deserialize)]
pub struct MoveStepRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunRequest {
    pub scenario_id: String,
}

/// One operator action against a run held by the client.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunAction {
    #[serde(rename_all = "camelCase")]
    SelectOption { next_step: String },
    #[serde(rename_all = "camelCase")]
    JumpToStep { step_id: String },
    GoBack,
    Reset,
    AddNote { text: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunActionRequest {
    pub state: RunState,
    pub action: RunAction,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcomeRequest {
    pub state: RunState,
    /// Left out until the operator picks one.
    #[serde(default)]
    pub result: Option<CallOutcome>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub step_id: String,
    pub title: String,
    pub mark: StepMark,
}

/// Everything a client needs to render a run after each action.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub state: RunState,
    pub status: RunStatus,
    pub prompt: Prompt,
    pub progress: u32,
    pub map: Vec<MapEntry>,
    pub outcome_required: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

fn run_view(
    scenario: &Scenario,
    state: RunState,
    variables: Option<&WebhookData>,
    outcome_required: bool,
) -> RunView {
    let engine = TraversalEngine::new(scenario);
    let map = engine
        .step_marks(&state)
        .into_iter()
        .map(|(step_id, mark)| MapEntry {
            step_id: step_id.to_string(),
            title: scenario
                .step(step_id)
                .map(|s| s.title.clone())
                .unwrap_or_default(),
            mark,
        })
        .collect();

    RunView {
        status: engine.status(&state),
        prompt: engine.current_prompt(&state, variables),
        progress: engine.progress(&state),
        map,
        outcome_required,
        state,
    }
}

// --- Scenario handlers ---

/// GET /scenarios
pub async fn list_scenarios(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListScenariosQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let scenarios = state.catalog.list(params.search.as_deref()).await?;
    let total = scenarios.len();

    Ok(Json(serde_json::json!({
        "scenarios": scenarios,
        "total": total,
    })))
}

/// POST /scenarios
pub async fn create_scenario(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<ScenarioDraft>,
) -> Result<Json<Scenario>, AppError> {
    Ok(Json(state.catalog.create(draft).await?))
}

/// GET /scenarios/:id
pub async fn get_scenario(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Scenario>, AppError> {
    Ok(Json(state.catalog.get(&id).await?))
}

/// PUT /scenarios/:id
pub async fn update_scenario(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(draft): Json<ScenarioDraft>,
) -> Result<Json<Scenario>, AppError> {
    Ok(Json(state.catalog.update(&id, draft).await?))
}

/// DELETE /scenarios/:id
pub async fn delete_scenario(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.catalog.delete(&id).await? {
        return Err(AppError::NotFound(format!("Scenario '{}' not found", id)));
    }

    Ok(Json(serde_json::json!({
        "deleted": id,
    })))
}

/// GET /scenarios/export
pub async fn export_scenarios(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Scenario>>, AppError> {
    Ok(Json(state.catalog.list(None).await?))
}

/// POST /scenarios/import (body is the exported JSON array)
pub async fn import_scenarios(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let imported = state.catalog.import(&body).await?;
    let ids: Vec<&str> = imported.iter().map(|s| s.id.as_str()).collect();
    let total = ids.len();

    Ok(Json(serde_json::json!({
        "imported": ids,
        "total": total,
    })))
}

/// GET /scenarios/:id/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsReport>, AppError> {
    let recent = params.recent.unwrap_or(state.recent_limit);
    Ok(Json(state.runner.report(&id, recent).await?))
}

/// GET /scenarios/:id/stats/export
pub async fn export_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatsExport>, AppError> {
    Ok(Json(state.runner.export_stats(&id).await?))
}

// --- Step editor handlers ---

/// POST /scenarios/:id/steps
pub async fn add_step(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (scenario, step_id) = state
        .catalog
        .edit(&id, |s| Ok(editor::add_step(s).id.clone()))
        .await?;

    Ok(Json(serde_json::json!({
        "scenario": scenario,
        "stepId": step_id,
    })))
}

/// POST /scenarios/:id/steps/move
pub async fn move_step(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MoveStepRequest>,
) -> Result<Json<Scenario>, AppError> {
    let (scenario, ()) = state
        .catalog
        .edit(&id, |s| editor::move_step(s, req.from, req.to))
        .await?;
    Ok(Json(scenario))
}

/// POST /scenarios/:id/steps/:step_id/duplicate
pub async fn duplicate_step(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (scenario, copy_id) = state
        .catalog
        .edit(&id, |s| editor::duplicate_step(s, &step_id))
        .await?;

    Ok(Json(serde_json::json!({
        "scenario": scenario,
        "stepId": copy_id,
    })))
}

/// DELETE /scenarios/:id/steps/:step_id
pub async fn remove_step(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (scenario, removed) = state
        .catalog
        .edit(&id, |s| editor::remove_step(s, &step_id))
        .await?;

    // Options that pointed at the removed step are reported, not rewired.
    let dangling = editor::dangling_references(&scenario);
    Ok(Json(serde_json::json!({
        "scenario": scenario,
        "removed": removed,
        "dangling": dangling,
    })))
}

/// POST /scenarios/:id/steps/:step_id/options
pub async fn add_option(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (scenario, index) = state
        .catalog
        .edit(&id, |s| editor::add_option(s, &step_id))
        .await?;

    Ok(Json(serde_json::json!({
        "scenario": scenario,
        "optionIndex": index,
    })))
}

/// DELETE /scenarios/:id/steps/:step_id/options/:index
pub async fn remove_option(
    State(state): State<Arc<AppState>>,
    Path((id, step_id, index)): Path<(String, String, usize)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (scenario, removed) = state
        .catalog
        .edit(&id, |s| editor::remove_option(s, &step_id, index))
        .await?;

    Ok(Json(serde_json::json!({
        "scenario": scenario,
        "removed": removed,
    })))
}

/// GET /scenarios/:id/steps/:step_id/connections
pub async fn step_connections(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(String, String)>,
) -> Result<Json<Connections>, AppError> {
    let scenario = state.catalog.get(&id).await?;
    if !scenario.has_step(&step_id) {
        return Err(AppError::NotFound(format!(
            "Step '{}' not found in scenario '{}'",
            step_id, id
        )));
    }
    Ok(Json(editor::connections(&scenario, &step_id)))
}

/// GET /scenarios/:id/check
pub async fn check_scenario(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let scenario = state.catalog.get(&id).await?;
    let dangling = editor::dangling_references(&scenario);

    Ok(Json(serde_json::json!({
        "ok": dangling.is_empty(),
        "dangling": dangling,
    })))
}

// --- Run handlers ---

/// POST /runs/start
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRunRequest>,
) -> Result<Json<RunView>, AppError> {
    let start = state.runner.begin(&req.scenario_id).await?;
    Ok(Json(run_view(
        &start.scenario,
        start.state,
        start.variables.as_ref(),
        false,
    )))
}

/// POST /runs/action
pub async fn run_action(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunActionRequest>,
) -> Result<Json<RunView>, AppError> {
    let scenario = state.catalog.get(&req.state.scenario_id).await?;
    let engine = TraversalEngine::new(&scenario);

    let transition = match req.action {
        RunAction::SelectOption { next_step } => engine.select_option(req.state, &next_step),
        RunAction::JumpToStep { step_id } => engine.jump_to_step(req.state, &step_id),
        RunAction::GoBack => Transition::Moved(engine.go_back(req.state)),
        RunAction::Reset => Transition::Moved(engine.reset(req.state)?),
        RunAction::AddNote { text } => {
            let mut run = req.state;
            run.add_note(&text);
            Transition::Moved(run)
        }
    };

    let outcome_required = transition.needs_outcome();
    Ok(Json(run_view(
        &scenario,
        transition.into_state(),
        scenario.webhook_data.as_ref(),
        outcome_required,
    )))
}

/// POST /runs/outcome
pub async fn record_outcome(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordOutcomeRequest>,
) -> Result<Json<CallResult>, AppError> {
    let result = state
        .runner
        .finish(&req.state.scenario_id, &req.state, req.result, &req.notes)
        .await?;
    Ok(Json(result))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
